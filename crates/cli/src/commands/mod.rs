//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod reconcile;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use riptide_admin::services::AdminAuthError;
use riptide_db::RepositoryError;
use riptide_storefront::config::ConfigError;
use riptide_storefront::services::CheckoutError;
use riptide_storefront::square::SquareError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    #[error("Admin error: {0}")]
    Auth(#[from] AdminAuthError),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A seed entry failed validation.
    #[error("Invalid product {title:?}: {reason}")]
    InvalidProduct { title: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Square error: {0}")]
    Square(#[from] SquareError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

/// Connect to the shop database named by `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    let pool = riptide_db::create_pool(&database_url).await?;
    tracing::info!("Connected to database");
    Ok(pool)
}
