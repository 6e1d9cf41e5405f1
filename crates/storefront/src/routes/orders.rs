//! Order confirmation view.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use riptide_core::{OrderId, OrderItem, OrderStatus};
use riptide_db::{Order, OrderRepository};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// What the confirmation page shows. Contact and address details are left
/// out since the order ID is the only credential.
#[derive(Debug, Serialize)]
pub struct OrderConfirmation {
    pub id: OrderId,
    pub status: OrderStatus,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderConfirmation {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            customer_name: order.customer_name,
            items: order.items,
            subtotal: order.subtotal,
            shipping: order.shipping,
            tax: order.tax,
            total: order.total,
            currency: order.currency,
            tracking_number: order.tracking_number,
            created_at: order.created_at,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
        }
    }
}

/// Look up an order by its UUID.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderConfirmation>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    Ok(Json(order.into()))
}
