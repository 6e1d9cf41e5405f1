//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/login                - Email and password login
//! POST   /api/auth/logout               - End session
//! GET    /api/auth/me                   - Logged-in admin
//! PUT    /api/auth/password             - Change own password
//!
//! # Dashboard
//! GET    /api/dashboard                 - Revenue, counts, low stock, recent orders
//!
//! # Products
//! GET    /api/products                  - Any status, filtered
//! POST   /api/products                  - Create
//! GET    /api/products/{id}             - Detail
//! PATCH  /api/products/{id}             - Change the given fields
//! DELETE /api/products/{id}             - Archive
//! PUT    /api/products/{id}/inventory   - Replace per-size stock
//!
//! # Orders
//! GET    /api/orders                    - List and filter
//! GET    /api/orders/{id}               - Detail
//! PATCH  /api/orders/{id}/status        - Cancel or mark delivered
//! POST   /api/orders/{id}/ship          - Ship with tracking number
//!
//! # Customers
//! GET    /api/customers                 - List and search
//! GET    /api/customers/{id}            - Detail with orders
//! PATCH  /api/customers/{id}            - Rename
//!
//! # Reviews
//! GET    /api/reviews                   - Moderation list (?unreplied=true)
//! PUT    /api/reviews/{id}/reply        - Set reply
//! DELETE /api/reviews/{id}/reply        - Remove reply
//! DELETE /api/reviews/{id}              - Delete review
//!
//! # Settings
//! GET    /api/settings                  - Store settings
//! PUT    /api/settings                  - Replace settings
//!
//! # Admin users (super admin only)
//! GET    /api/admin-users               - List
//! POST   /api/admin-users               - Create
//! PATCH  /api/admin-users/{id}          - Change role
//! DELETE /api/admin-users/{id}          - Delete (not self)
//! ```
//!
//! Read routes take any logged-in admin. Writes need `admin` or
//! `super_admin`; viewers get 403.

pub mod admin_users;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::state::AppState;

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        // Dashboard
        .route("/dashboard", get(dashboard::index))
        // Products
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::archive),
        )
        .route("/products/{id}/inventory", put(products::set_inventory))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/ship", post(orders::ship))
        // Customers
        .route("/customers", get(customers::index))
        .route(
            "/customers/{id}",
            get(customers::show).patch(customers::rename),
        )
        // Reviews
        .route("/reviews", get(reviews::index))
        .route(
            "/reviews/{id}/reply",
            put(reviews::reply).delete(reviews::clear_reply),
        )
        .route("/reviews/{id}", delete(reviews::delete))
        // Settings
        .route("/settings", get(settings::show).put(settings::update))
        // Admin users
        .route(
            "/admin-users",
            get(admin_users::index).post(admin_users::create),
        )
        .route(
            "/admin-users/{id}",
            patch(admin_users::update_role).delete(admin_users::delete),
        );

    Router::new().nest("/api", api)
}
