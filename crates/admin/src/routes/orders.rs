//! Order management routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use riptide_core::{OrderId, OrderStatus};
use riptide_db::{Order, OrderFilter, OrderRepository};

use crate::{
    error::{AppError, Result},
    middleware::{RequireAdminAuth, RequireWriteAccess},
    state::AppState,
};

/// Longest accepted carrier tracking number.
const MAX_TRACKING_LENGTH: usize = 64;

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Ship request body.
#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub tracking_number: String,
}

/// Only cancel and deliver go through the generic status route. Payment moves
/// orders to processing, and shipping needs a tracking number.
fn check_manual_status(status: OrderStatus) -> Result<()> {
    match status {
        OrderStatus::Cancelled | OrderStatus::Delivered => Ok(()),
        OrderStatus::Shipped => Err(AppError::BadRequest(
            "Use the ship action to add a tracking number".to_string(),
        )),
        OrderStatus::Pending | OrderStatus::Processing => Err(AppError::BadRequest(format!(
            "Orders cannot be moved to {status} manually"
        ))),
    }
}

fn parse_tracking_number(raw: &str) -> Result<&str> {
    let tracking = raw.trim();
    if tracking.is_empty() {
        return Err(AppError::BadRequest("Tracking number is required".to_string()));
    }
    if tracking.chars().count() > MAX_TRACKING_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Tracking number must be at most {MAX_TRACKING_LENGTH} characters"
        )));
    }
    Ok(tracking)
}

/// Orders, newest first.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(orders))
}

/// One order.
#[instrument(skip(_admin, state))]
pub async fn show(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Cancel or mark delivered. Cancelling does not restock.
#[instrument(skip(admin, state))]
pub async fn update_status(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    check_manual_status(update.status)?;

    let order = OrderRepository::new(state.pool())
        .update_status(id, update.status)
        .await?;
    tracing::info!(order_id = %id, admin_user_id = %admin.id, status = %order.status, "Order updated by admin");
    Ok(Json(order))
}

/// Mark a processing order as shipped.
#[instrument(skip(admin, state))]
pub async fn ship(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<ShipRequest>,
) -> Result<Json<Order>> {
    let tracking = parse_tracking_number(&request.tracking_number)?;

    let order = OrderRepository::new(state.pool()).ship(id, tracking).await?;
    tracing::info!(order_id = %id, admin_user_id = %admin.id, "Order shipped by admin");
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_status_allowlist() {
        assert!(check_manual_status(OrderStatus::Cancelled).is_ok());
        assert!(check_manual_status(OrderStatus::Delivered).is_ok());
        assert!(check_manual_status(OrderStatus::Shipped).is_err());
        assert!(check_manual_status(OrderStatus::Processing).is_err());
        assert!(check_manual_status(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_tracking_number_bounds() {
        assert_eq!(parse_tracking_number("  1Z999AA10123456784 ").unwrap(), "1Z999AA10123456784");
        assert!(parse_tracking_number("   ").is_err());
        assert!(parse_tracking_number(&"9".repeat(64)).is_ok());
        assert!(parse_tracking_number(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_status_update_body() {
        let body: StatusUpdate = serde_json::from_str(r#"{"status":"cancelled"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Cancelled);
        assert!(serde_json::from_str::<StatusUpdate>(r#"{"status":"lost"}"#).is_err());
    }
}
