//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header::CACHE_CONTROL,
    response::IntoResponse,
};
use serde::Serialize;

use riptide_core::ProductId;
use riptide_db::{Product, ProductFilter, ReviewSummary};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Browsers and the CDN may reuse catalog responses this long.
pub(crate) const CATALOG_CACHE_CONTROL: &str = "public, max-age=60";

/// Product listing response.
#[derive(Debug, Serialize)]
pub struct ProductList<'a> {
    pub products: &'a [Product],
    pub count: usize,
}

/// Product detail response.
#[derive(Debug, Serialize)]
pub struct ProductDetail<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub on_sale: bool,
    pub reviews: ReviewSummary,
}

/// List active products.
#[tracing::instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price cannot exceed max_price".to_string(),
        ));
    }

    let products = state.catalog().products(&filter).await?;
    let body = Json(ProductList {
        products: &products,
        count: products.len(),
    })
    .into_response();

    Ok(([(CACHE_CONTROL, CATALOG_CACHE_CONTROL)], body))
}

/// Show an active product with its rating summary.
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let entry = state
        .catalog()
        .product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let (product, reviews) = &*entry;

    let body = Json(ProductDetail {
        product,
        on_sale: product.on_sale(),
        reviews: *reviews,
    })
    .into_response();

    Ok(([(CACHE_CONTROL, CATALOG_CACHE_CONTROL)], body))
}

/// Categories with at least one active product.
pub async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = state.catalog().categories().await?;
    let body = Json(serde_json::json!({ "categories": &*categories })).into_response();
    Ok(([(CACHE_CONTROL, CATALOG_CACHE_CONTROL)], body))
}
