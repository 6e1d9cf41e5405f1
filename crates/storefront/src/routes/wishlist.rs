//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use riptide_core::ProductId;
use riptide_db::{Product, ProductRepository};

use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub product_id: ProductId,
    pub saved: bool,
}

/// Saved products that are still active, in the order they were saved.
pub async fn show(State(state): State<AppState>, shopper: Shopper) -> Result<Json<WishlistView>> {
    let wishlist = shopper.wishlist().await?;
    if wishlist.product_ids.is_empty() {
        return Ok(Json(WishlistView {
            products: Vec::new(),
        }));
    }

    let mut found = ProductRepository::new(state.pool())
        .get_many(&wishlist.product_ids)
        .await?;
    found.retain(Product::is_purchasable);

    let mut products = Vec::with_capacity(found.len());
    for id in &wishlist.product_ids {
        if let Some(idx) = found.iter().position(|p| p.id == *id) {
            products.push(found.swap_remove(idx));
        }
    }

    Ok(Json(WishlistView { products }))
}

/// Save or unsave a product.
pub async fn toggle(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ToggleResponse>> {
    let mut wishlist = shopper.wishlist().await?;

    // Saving requires an active product; unsaving always works
    if !wishlist.contains(product_id) && state.catalog().product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let saved = wishlist.toggle(product_id);
    shopper.save_wishlist(&wishlist).await?;

    Ok(Json(ToggleResponse { product_id, saved }))
}
