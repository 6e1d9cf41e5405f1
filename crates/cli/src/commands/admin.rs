//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! RIPTIDE_ADMIN_PASSWORD='…' riptide admin create -e ops@riptideswim.com -n "Ops" -r super_admin
//! ```
//!
//! The password is read from the environment so it never lands in shell
//! history.

use riptide_admin::services::AdminAuthService;
use riptide_core::AdminRole;

use super::{CommandError, connect};

/// Environment variable holding the new admin's password.
const PASSWORD_ENV: &str = "RIPTIDE_ADMIN_PASSWORD";

fn parse_role(role: &str) -> Result<AdminRole, CommandError> {
    role.trim()
        .parse()
        .map_err(|_| CommandError::InvalidRole(role.to_owned()))
}

/// Create a new admin user.
///
/// # Errors
///
/// Returns an error if the role is unknown, the password variable is unset,
/// the input fails validation, or the email is already registered.
pub async fn create_user(email: &str, name: &str, role: &str) -> Result<(), CommandError> {
    let role = parse_role(role)?;
    dotenvy::dotenv().ok();
    let password =
        std::env::var(PASSWORD_ENV).map_err(|_| CommandError::MissingEnvVar(PASSWORD_ENV))?;

    let pool = connect().await?;
    let user = AdminAuthService::new(&pool)
        .create_admin(email, name, role, &password)
        .await?;

    tracing::info!("Admin user created successfully!");
    tracing::info!("  ID: {}", user.id);
    tracing::info!("  Email: {}", user.email);
    tracing::info!("  Name: {}", user.name);
    tracing::info!("  Role: {}", user.role);
    Ok(())
}
