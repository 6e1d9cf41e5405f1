//! Square webhook receiver.
//!
//! A completed payment notification runs the same confirmation as the
//! shopper's return redirect, so an order is processed even if the shopper
//! never comes back. Square retries anything that isn't 2xx.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use riptide_db::OrderRepository;

use crate::error::{AppError, Result};
use crate::services::CheckoutError;
use crate::square::WebhookEvent;
use crate::square::webhook::{SIGNATURE_HEADER, verify_signature};
use crate::state::AppState;

/// Handle a Square notification.
#[tracing::instrument(skip_all)]
pub async fn square(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let config = &state.config().square;
    let Some(key) = config.webhook_signature_key.as_ref() else {
        return Err(AppError::ServiceUnavailable(
            "Webhooks are not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_signature(key, &config.webhook_notification_url, &body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Square webhook");
        AppError::Unauthorized(e.to_string())
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    let Some(square_order_id) = event.completed_payment_order_id() else {
        tracing::debug!(event_type = %event.event_type, "Ignoring Square event");
        return Ok(StatusCode::OK);
    };

    let Some(order) = OrderRepository::new(state.pool())
        .find_by_provider_order_id(&square_order_id)
        .await?
    else {
        tracing::info!(square_order_id = %square_order_id, "Payment for unknown order");
        return Ok(StatusCode::OK);
    };

    match state.checkout().confirm_payment(order.id).await {
        Ok(confirmation) => {
            if confirmation.newly_processed {
                state.catalog().invalidate_all().await;
                tracing::info!(order_id = %order.id, "Order confirmed by webhook");
            }
            Ok(StatusCode::OK)
        }
        // Square sends another update once the payment settles
        Err(CheckoutError::PaymentNotCompleted) => Ok(StatusCode::OK),
        Err(e) => Err(e.into()),
    }
}
