//! Admin authentication service.
//!
//! Email and password login with Argon2id hashes, plus the account
//! management rules: passwords of at least 12 characters, no self-deletion,
//! and at least one super admin at all times.

mod error;

pub use error::AdminAuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use riptide_core::{AdminRole, AdminUserId, Email};
use riptide_db::{AdminUser, AdminUserRepository, RepositoryError};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Longest accepted password, to bound hashing cost.
const MAX_PASSWORD_LENGTH: usize = 256;

const MAX_NAME_LENGTH: usize = 100;

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    users: AdminUserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: AdminUserRepository::new(pool),
        }
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` if the email is unknown or
    /// the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminUser, AdminAuthError> {
        let email = Email::parse(email).map_err(|_| AdminAuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = self.users.get_by_email_with_hash(&email).await? else {
            // Spend the same hashing time as a real check
            let _ = hash_password(password);
            return Err(AdminAuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;
        tracing::info!(admin_user_id = %user.id, "Admin logged in");
        Ok(user)
    }

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidEmail`, `InvalidName`, or `WeakPassword`
    /// for bad input, and `UserAlreadyExists` if the email is taken.
    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        role: AdminRole,
        password: &str,
    ) -> Result<AdminUser, AdminAuthError> {
        let email = Email::parse(email)?;
        validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&email, name, role, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AdminAuthError::UserAlreadyExists,
                other => AdminAuthError::Repository(other),
            })?;

        tracing::info!(admin_user_id = %user.id, role = %role, "Admin user created");
        Ok(user)
    }

    /// Change an admin's role.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::UserNotFound` if the user doesn't exist and
    /// `LastSuperAdmin` if this would demote the only super admin.
    pub async fn change_role(
        &self,
        id: AdminUserId,
        role: AdminRole,
    ) -> Result<AdminUser, AdminAuthError> {
        let user = self.get_user(id).await?;
        if user.role == AdminRole::SuperAdmin && role != AdminRole::SuperAdmin {
            self.ensure_other_super_admin().await?;
        }

        Ok(self.users.update_role(id, role).await?)
    }

    /// Replace an admin's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` if `current` is wrong and
    /// `WeakPassword` if `new` is too short.
    pub async fn change_password(
        &self,
        user: &AdminUser,
        current: &str,
        new: &str,
    ) -> Result<(), AdminAuthError> {
        let (_, password_hash) = self
            .users
            .get_by_email_with_hash(&user.email)
            .await?
            .ok_or(AdminAuthError::UserNotFound)?;
        verify_password(current, &password_hash)?;

        validate_password(new)?;
        let new_hash = hash_password(new)?;
        self.users.update_password(user.id, &new_hash).await?;

        tracing::info!(admin_user_id = %user.id, "Admin password changed");
        Ok(())
    }

    /// Delete an admin account.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::CannotDeleteSelf` when `actor == id`,
    /// `UserNotFound` if the user doesn't exist, and `LastSuperAdmin` if it
    /// is the only super admin.
    pub async fn delete_admin(
        &self,
        actor: AdminUserId,
        id: AdminUserId,
    ) -> Result<(), AdminAuthError> {
        if actor == id {
            return Err(AdminAuthError::CannotDeleteSelf);
        }

        let user = self.get_user(id).await?;
        if user.role == AdminRole::SuperAdmin {
            self.ensure_other_super_admin().await?;
        }

        self.users.delete(id).await?;
        tracing::info!(admin_user_id = %id, deleted_by = %actor, "Admin user deleted");
        Ok(())
    }

    /// Get an admin user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, id: AdminUserId) -> Result<AdminUser, AdminAuthError> {
        self.users
            .get(id)
            .await?
            .ok_or(AdminAuthError::UserNotFound)
    }

    async fn ensure_other_super_admin(&self) -> Result<(), AdminAuthError> {
        if self.users.count_super_admins().await? <= 1 {
            return Err(AdminAuthError::LastSuperAdmin);
        }
        Ok(())
    }
}

/// Check password length rules.
///
/// # Errors
///
/// Returns `AdminAuthError::WeakPassword` if the password is too short or
/// too long.
pub fn validate_password(password: &str) -> Result<(), AdminAuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AdminAuthError> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(AdminAuthError::InvalidName("name is required".to_string()));
    }
    if len > MAX_NAME_LENGTH {
        return Err(AdminAuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminAuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AdminAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminAuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("tidepool-2026!").unwrap();
        let b = hash_password("tidepool-2026!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything at all", "not-a-phc-string"),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("elevenchars").is_err());
        assert!(validate_password("twelve chars").is_ok());
        assert!(validate_password(&"x".repeat(257)).is_err());
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Dana Okafor").is_ok());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }
}
