//! Integration tests for Riptide Swim.
//!
//! These talk to running servers over HTTP and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! riptide migrate
//! riptide seed products catalog.yaml
//! cargo run -p riptide-storefront &
//! cargo run -p riptide-admin &
//!
//! RIPTIDE_TEST_ADMIN_EMAIL=… RIPTIDE_TEST_ADMIN_PASSWORD=… \
//!     cargo test -p riptide-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` (default `http://localhost:3000`)
//! - `ADMIN_URL` (default `http://localhost:3001`)
//! - `RIPTIDE_TEST_ADMIN_EMAIL` / `RIPTIDE_TEST_ADMIN_PASSWORD` - a
//!   `super_admin` account for admin tests

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL for the storefront API.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL for the admin API.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Client that keeps session cookies between requests, like a browser.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Client logged in to admin with the test account.
pub async fn admin_client() -> Client {
    let email = std::env::var("RIPTIDE_TEST_ADMIN_EMAIL")
        .expect("RIPTIDE_TEST_ADMIN_EMAIL must be set for admin tests");
    let password = std::env::var("RIPTIDE_TEST_ADMIN_PASSWORD")
        .expect("RIPTIDE_TEST_ADMIN_PASSWORD must be set for admin tests");

    let client = session_client();
    let resp = client
        .post(format!("{}/api/auth/login", admin_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK, "admin login failed");
    client
}

/// First active product that has a size in stock, as `(id, size)`.
pub async fn purchasable_product(client: &Client) -> Option<(i64, String)> {
    let body: Value = client
        .get(format!("{}/api/products", storefront_url()))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Product list is not JSON");

    body.get("products")?.as_array()?.iter().find_map(|product| {
        let id = product.get("id")?.as_i64()?;
        let size = product
            .get("size_inventory")?
            .as_object()?
            .iter()
            .find(|(_, qty)| qty.as_u64().is_some_and(|q| q > 0))?
            .0
            .clone();
        Some((id, size))
    })
}
