//! Black-box tests for the admin API.
//!
//! Requires the admin server running (`cargo run -p riptide-admin`) and a
//! `super_admin` test account in `RIPTIDE_TEST_ADMIN_EMAIL` /
//! `RIPTIDE_TEST_ADMIN_PASSWORD`.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use riptide_core::OrderStatus;
use riptide_integration_tests::{admin_client, admin_url, session_client};
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_requires_login() {
    let resp = session_client()
        .get(format!("{}/api/dashboard", admin_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_bad_password_is_401() {
    let resp = session_client()
        .post(format!("{}/api/auth/login", admin_url()))
        .json(&json!({ "email": "nobody@riptideswim.com", "password": "not the password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_login_me_logout() {
    let client = admin_client().await;
    let base_url = admin_url();

    let me: Value = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["role"], "super_admin");

    let resp = client
        .post(format!("{base_url}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_dashboard_lists_every_order_status() {
    let client = admin_client().await;
    let dashboard: Value = client
        .get(format!("{}/api/dashboard", admin_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let counts = dashboard["orders_by_status"].as_array().unwrap();
    assert_eq!(counts.len(), OrderStatus::ALL.len());
    assert!(dashboard["revenue"]["paid_orders"].is_i64());
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_product_lifecycle() {
    let client = admin_client().await;
    let base_url = admin_url();
    let title = format!("Integration Suit {}", Uuid::new_v4());

    let resp = client
        .post(format!("{base_url}/api/products"))
        .json(&json!({
            "title": title,
            "price": "72.00",
            "size_inventory": { "S": 2, "M": 3 },
            "status": "draft"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.unwrap();
    let id = product["id"].as_i64().unwrap();
    assert_eq!(product["inventory"], 5);

    let product: Value = client
        .put(format!("{base_url}/api/products/{id}/inventory"))
        .json(&json!({ "S": 0, "M": 1, "L": 4 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["inventory"], 5);

    let product: Value = client
        .patch(format!("{base_url}/api/products/{id}"))
        .json(&json!({ "price": "64.00" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["price"], "64.00");
    assert_eq!(product["inventory"], 5);
    assert_eq!(product["size_inventory"]["L"], 4);
    assert_eq!(product["status"], "draft");

    let resp = client
        .delete(format!("{base_url}/api/products/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let product: Value = client
        .get(format!("{base_url}/api/products/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["status"], "archived");
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_invalid_product_is_400() {
    let client = admin_client().await;
    let resp = client
        .post(format!("{}/api/products", admin_url()))
        .json(&json!({ "title": "  ", "price": "10.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_customers_sorted_by_spend() {
    let client = admin_client().await;
    let customers: Vec<Value> = client
        .get(format!("{}/api/customers?limit=200", admin_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let spend: Vec<f64> = customers
        .iter()
        .map(|c| c["total_spent"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(spend.windows(2).all(|pair| pair.first() >= pair.last()));
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_settings_validation() {
    let client = admin_client().await;
    let base_url = admin_url();

    let settings: Value = client
        .get(format!("{base_url}/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut invalid = settings.clone();
    invalid["tax_rate"] = json!("1.5");
    let resp = client
        .put(format!("{base_url}/api/settings"))
        .json(&invalid)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_viewer_cannot_write() {
    let client = admin_client().await;
    let base_url = admin_url();
    let email = format!("viewer-{}@riptideswim.com", Uuid::new_v4());
    let password = "viewer password 123";

    let resp = client
        .post(format!("{base_url}/api/admin-users"))
        .json(&json!({ "email": email, "name": "Viewer", "role": "viewer", "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let viewer: Value = resp.json().await.unwrap();

    let viewer_client = session_client();
    let resp = viewer_client
        .post(format!("{base_url}/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = viewer_client
        .get(format!("{base_url}/api/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = viewer_client
        .post(format!("{base_url}/api/products"))
        .json(&json!({ "title": "Nope", "price": "1.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Deleting the account ends the viewer's session on the next request
    let resp = client
        .delete(format!("{base_url}/api/admin-users/{}", viewer["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = viewer_client
        .get(format!("{base_url}/api/products"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server and test admin account"]
async fn test_cannot_delete_self() {
    let client = admin_client().await;
    let base_url = admin_url();

    let me: Value = client
        .get(format!("{base_url}/api/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .delete(format!("{base_url}/api/admin-users/{}", me["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
