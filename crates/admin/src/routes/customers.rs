//! Customer routes.
//!
//! Customers are created by checkout; admin can only rename them.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use riptide_core::CustomerId;
use riptide_db::{Customer, CustomerRepository, Order, OrderRepository};

use crate::{
    error::{AppError, Result},
    middleware::{RequireAdminAuth, RequireWriteAccess},
    state::AppState,
};

const MAX_NAME_LENGTH: usize = 100;

/// Customer list query.
#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    /// Matches name or email.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Customer with order history.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<Order>,
}

/// Rename request body.
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Name must be 1-{MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Customers, biggest spenders first.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Customer>>> {
    let customers = CustomerRepository::new(state.pool())
        .list(query.search.as_deref(), query.limit, query.offset)
        .await?;
    Ok(Json(customers))
}

/// One customer and every order placed with their email.
#[instrument(skip(_admin, state))]
pub async fn show(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CustomerDetail>> {
    let customer = CustomerRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;
    let orders = OrderRepository::new(state.pool())
        .for_customer(&customer.email)
        .await?;

    Ok(Json(CustomerDetail { customer, orders }))
}

/// Rename a customer.
#[instrument(skip(admin, state))]
pub async fn rename(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Customer>> {
    let name = validate_name(&request.name)?;
    let customer = CustomerRepository::new(state.pool())
        .update_name(id, name)
        .await?;
    tracing::info!(customer_id = %id, admin_user_id = %admin.id, "Customer renamed");
    Ok(Json(customer))
}
