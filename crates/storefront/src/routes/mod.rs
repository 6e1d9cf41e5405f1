//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products                  - Active products (filter, search, sort)
//! GET    /api/products/{id}             - Product detail with review summary
//! GET    /api/products/{id}/reviews     - Reviews, newest first
//! POST   /api/products/{id}/reviews     - Post a review (strict limit)
//! POST   /api/reviews/{id}/like         - Toggle like for this visitor
//! GET    /api/categories                - Categories with active products
//! GET    /api/store                     - Public store settings
//!
//! # Cart and wishlist (session)
//! GET    /api/cart                      - Priced cart
//! DELETE /api/cart                      - Empty cart
//! POST   /api/cart/items                - Add item
//! PATCH  /api/cart/items                - Set quantity
//! DELETE /api/cart/items                - Remove item
//! GET    /api/wishlist                  - Saved products
//! POST   /api/wishlist/{product_id}     - Toggle saved
//!
//! # Checkout (strict limit)
//! POST   /api/checkout                  - Create order and Square payment link
//! POST   /api/checkout/confirm          - Verify payment and process order
//! GET    /api/orders/{order_id}         - Order confirmation
//!
//! # Assistant (strict limit)
//! POST   /api/assistant                 - Streamed chat reply (SSE)
//!
//! # Webhooks
//! POST   /webhooks/square               - Square payment notifications
//! ```

pub mod assistant;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod store;
pub mod webhooks;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{relaxed_rate_limiter, strict_rate_limiter};
use crate::state::AppState;

/// Catalog, cart, and wishlist routes.
pub fn browse_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/products/{id}/reviews", get(reviews::index))
        .route("/reviews/{id}/like", post(reviews::toggle_like))
        .route("/categories", get(products::categories))
        .route("/store", get(store::show))
        .route("/cart", get(cart::show).delete(cart::clear))
        .route(
            "/cart/items",
            post(cart::add).patch(cart::update).delete(cart::remove),
        )
        .route("/wishlist", get(wishlist::show))
        .route("/wishlist/{product_id}", post(wishlist::toggle))
        .route("/orders/{order_id}", get(orders::show))
}

/// Routes that write orders, reviews, or call paid APIs.
pub fn guarded_routes() -> Router<AppState> {
    Router::new()
        .route("/products/{id}/reviews", post(reviews::create))
        .route("/checkout", post(checkout::start))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/assistant", post(assistant::chat))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(browse_routes().layer(relaxed_rate_limiter()))
        .merge(guarded_routes().layer(strict_rate_limiter()));

    Router::new()
        .nest("/api", api)
        // Square signs webhooks; no IP limit
        .route("/webhooks/square", post(webhooks::square))
}
