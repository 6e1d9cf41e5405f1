//! Product management routes.
//!
//! Storefront catalog caches expire on their own, so edits made here show up
//! in the shop within a minute.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use riptide_core::{ProductId, SizeInventory};
use riptide_db::{
    Product, ProductFilter, ProductInput, ProductPatch, ProductRepository, validate_inventory,
};

use crate::{
    error::{AppError, Result},
    middleware::{RequireAdminAuth, RequireWriteAccess},
    state::AppState,
};

/// Products in any status, filtered.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(products))
}

/// One product.
#[instrument(skip(_admin, state))]
pub async fn show(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(product_id = %product.id, admin_user_id = %admin.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Change the fields present in the body; everything else is left alone.
#[instrument(skip(admin, state, patch))]
pub async fn update(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    check_patch(&patch)?;

    let product = ProductRepository::new(state.pool()).update(id, patch).await?;
    tracing::info!(product_id = %id, admin_user_id = %admin.id, "Product updated");
    Ok(Json(product))
}

/// Archive a product. Orders and reviews keep pointing at it.
#[instrument(skip(admin, state))]
pub async fn archive(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).archive(id).await?;
    tracing::info!(product_id = %id, admin_user_id = %admin.id, "Product archived");
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the per-size stock map.
#[instrument(skip(admin, state, inventory))]
pub async fn set_inventory(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(inventory): Json<SizeInventory>,
) -> Result<Json<Product>> {
    validate_inventory(&inventory).map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool())
        .set_size_inventory(id, &inventory)
        .await?;
    tracing::info!(product_id = %id, admin_user_id = %admin.id, "Inventory replaced");
    Ok(Json(product))
}

fn check_patch(patch: &ProductPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    patch.validate().map_err(AppError::BadRequest)
}
