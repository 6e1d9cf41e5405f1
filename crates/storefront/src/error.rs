//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON: `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use riptide_db::RepositoryError;

use crate::assistant::AssistantError;
use crate::models::CartError;
use crate::services::CheckoutError;
use crate::square::SquareError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Square API operation failed.
    #[error("Square error: {0}")]
    Square(#[from] SquareError),

    /// Checkout could not proceed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Assistant request was rejected.
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Cart edit was rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request could not be authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Feature is not configured on this deployment.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Square(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => checkout_status(err),
            Self::Assistant(err) => match err {
                AssistantError::InvalidHistory(_) => StatusCode::BAD_REQUEST,
                AssistantError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Cart(CartError::LineNotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Square(_) => "Payment provider error".to_string(),
            Self::Checkout(err) => match err {
                CheckoutError::Square(_) => "Payment provider error".to_string(),
                CheckoutError::Repository(RepositoryError::NotFound)
                | CheckoutError::OrderNotFound => "Order not found".to_string(),
                CheckoutError::Repository(_)
                | CheckoutError::Money(_)
                | CheckoutError::InvalidCurrency(_) => "Internal server error".to_string(),
                CheckoutError::AmountMismatch { .. } => {
                    "Payment does not match the order total".to_string()
                }
                other => capitalize(&other.to_string()),
            },
            Self::Assistant(err) => match err {
                AssistantError::InvalidHistory(msg) => msg.clone(),
                AssistantError::RateLimited(_) => {
                    "The assistant is busy, please try again shortly".to_string()
                }
                _ => "Assistant service error".to_string(),
            },
            Self::Cart(err) => capitalize(&err.to_string()),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::ServiceUnavailable(msg) => msg.clone(),
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

const fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::EmptyCart
        | CheckoutError::SizeUnavailable { .. }
        | CheckoutError::InvalidCustomer(_) => StatusCode::BAD_REQUEST,
        CheckoutError::ProductUnavailable(_)
        | CheckoutError::UnpricedProduct(_)
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::NoPaymentLink
        | CheckoutError::AmountMismatch { .. } => StatusCode::CONFLICT,
        CheckoutError::PaymentNotCompleted => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::OrderNotFound | CheckoutError::Repository(RepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        CheckoutError::Square(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::Repository(_)
        | CheckoutError::Money(_)
        | CheckoutError::InvalidCurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors, and payment mismatches, to Sentry
        let mismatch = matches!(self, Self::Checkout(CheckoutError::AmountMismatch { .. }));
        if status.is_server_error() || mismatch {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use riptide_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product".to_string());
        assert_eq!(err.to_string(), "Not found: Product");
        assert_eq!(err.public_message(), "Product not found");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::ServiceUnavailable("x".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::ProductUnavailable(ProductId::new(3)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::PaymentNotCompleted.into()),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(CheckoutError::Square(SquareError::Timeout).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_unpriced_product_is_conflict() {
        let err = AppError::from(CheckoutError::UnpricedProduct("Marina One-Piece".to_string()));
        assert_eq!(get_status(err), StatusCode::CONFLICT);

        let err = AppError::from(CheckoutError::UnpricedProduct("Marina One-Piece".to_string()));
        assert_eq!(
            err.public_message(),
            "Marina One-Piece has no price and can't be bought yet"
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection refused at 10.0.0.4".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Square(SquareError::Unauthorized("token rejected".to_string()));
        assert_eq!(err.public_message(), "Payment provider error");
    }

    #[test]
    fn test_cart_errors_are_client_errors() {
        assert_eq!(
            get_status(CartError::LineNotFound.into()),
            StatusCode::NOT_FOUND
        );
        let err = AppError::from(CartError::InvalidQuantity { max: 10 });
        assert_eq!(err.public_message(), "Quantity must be between 1 and 10");
    }
}
