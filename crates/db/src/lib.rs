//! Database access for Riptide.
//!
//! # Schema: `shop`
//!
//! One `PostgreSQL` database is shared by the storefront and the admin API.
//!
//! ## Tables
//!
//! - `product` - Catalog entries with per-size stock (JSONB)
//! - `order` - Checkout orders with snapshotted line items
//! - `customer` - Purchase aggregates keyed by normalized email
//! - `review` - Product reviews, likes, and admin replies
//! - `store_settings` - Singleton configuration row
//! - `admin_user` - Back-office accounts
//!
//! Sessions live in the `tower_sessions` schema managed by
//! `tower-sessions-sqlx-store`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/db/migrations/` and run via:
//! ```bash
//! riptide migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin_users;
pub mod customers;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use riptide_core::{OrderStatus, ProductId, Size};

pub use admin_users::{AdminUser, AdminUserRepository};
pub use customers::{Customer, CustomerRepository};
pub use orders::{NewOrder, Order, OrderFilter, OrderRepository, RevenueSummary};
pub use products::{
    Product, ProductFilter, ProductInput, ProductPatch, ProductRepository, ProductSort,
    validate_inventory,
};
pub use reviews::{NewReview, Review, ReviewListing, ReviewRepository, ReviewSummary};
pub use settings::{SettingsInput, SettingsRepository, StoreSettings};

/// Embedded migrations for the `shop` schema.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Order status change not allowed by the lifecycle.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Not enough stock to reserve.
    #[error("only {available} of product {product_id} in size {size} left (requested {requested})")]
    InsufficientInventory {
        product_id: ProductId,
        size: Size,
        requested: u32,
        available: u32,
    },
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, everything else into `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Clamp a caller-supplied page size.
pub(crate) fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

/// `ILIKE` pattern matching `search` anywhere, or `None` for a blank search.
pub(crate) fn contains_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)))
}

/// Escape `%`, `_`, and `\` for use inside an `ILIKE` pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
