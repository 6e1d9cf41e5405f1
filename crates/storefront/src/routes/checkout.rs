//! Checkout route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use riptide_core::{Email, OrderId, ShippingAddress};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Shopper;
use crate::services::{CheckoutCustomer, CheckoutStarted, Confirmation};
use crate::state::AppState;

/// Checkout form.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub shipping_address: ShippingAddress,
}

impl CheckoutForm {
    fn into_customer(self) -> Result<CheckoutCustomer> {
        let email = Email::parse(&self.email)
            .map_err(|e| AppError::BadRequest(format!("Invalid email: {e}")))?;
        Ok(CheckoutCustomer {
            name: self.name,
            email,
            shipping_address: self.shipping_address,
        })
    }
}

/// Confirmation request.
#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    pub order_id: OrderId,
}

/// Start checkout for the session cart.
///
/// Returns the Square payment URL the browser should be sent to.
#[tracing::instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(form): Json<CheckoutForm>,
) -> Result<(StatusCode, Json<CheckoutStarted>)> {
    let customer = form.into_customer()?;
    let cart = shopper.cart().await?;

    let started = state
        .checkout()
        .start_checkout(&cart, &customer, &state.config().base_url)
        .await
        .inspect_err(|e| {
            if e.is_client_error() {
                tracing::info!(error = %e, "Checkout rejected");
            }
        })?;

    shopper.set_pending_order(started.order_id).await?;
    add_breadcrumb(
        "checkout",
        "Checkout started",
        &[("order_id", &started.order_id.to_string())],
    );

    Ok((StatusCode::CREATED, Json(started)))
}

/// Confirm payment after the shopper returns from Square.
///
/// Safe to call repeatedly; the cart is cleared once this session's order
/// is paid.
#[tracing::instrument(skip(state, shopper))]
pub async fn confirm(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(form): Json<ConfirmForm>,
) -> Result<Json<Confirmation>> {
    let confirmation = state.checkout().confirm_payment(form.order_id).await?;

    if confirmation.newly_processed {
        state.catalog().invalidate_all().await;
    }

    if confirmation.status.is_paid() && shopper.pending_order().await? == Some(form.order_id) {
        shopper.clear_cart().await?;
        shopper.clear_pending_order().await?;
    }

    Ok(Json(confirmation))
}
