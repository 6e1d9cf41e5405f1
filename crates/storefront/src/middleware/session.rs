//! Session layer for shopper state.
//!
//! Carts, wishlists, and visitor tokens are stored server-side in
//! `PostgreSQL` via tower-sessions; the browser only holds the cookie.

use sqlx::PgPool;
use tower_sessions::{
    Expiry, SessionManagerLayer,
    cookie::{SameSite, time::Duration},
};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "riptide_session";

/// Inactivity before a cart is forgotten.
const SESSION_INACTIVITY: Duration = Duration::days(7);

/// Build the session layer.
///
/// The `tower_sessions` table is created by `riptide migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    // Lax so the cart survives the redirect back from Square checkout
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(SESSION_INACTIVITY))
        .with_secure(config.is_https())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
