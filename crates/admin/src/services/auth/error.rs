//! Admin authentication error types.

use thiserror::Error;

use riptide_db::RepositoryError;

/// Errors that can occur during admin authentication and account management.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] riptide_core::EmailError),

    /// Wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Admin user not found.
    #[error("admin user not found")]
    UserNotFound,

    /// Admin user already exists.
    #[error("admin user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Display name missing or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// An admin tried to delete their own account.
    #[error("you cannot delete your own account")]
    CannotDeleteSelf,

    /// The change would leave no super admin.
    #[error("at least one super admin must remain")]
    LastSuperAdmin,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
