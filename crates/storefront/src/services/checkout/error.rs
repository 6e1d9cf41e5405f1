//! Checkout error types.

use thiserror::Error;

use riptide_core::{MoneyError, ProductId, Size};
use riptide_db::RepositoryError;

use crate::square::SquareError;

/// Errors from starting or confirming a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    #[error("{0} has no price and can't be bought yet")]
    UnpricedProduct(String),

    #[error("{title} is not offered in size {size}")]
    SizeUnavailable { title: String, size: Size },

    #[error("only {available} of {title} in size {size} left")]
    InsufficientStock {
        title: String,
        size: Size,
        available: u32,
    },

    #[error("invalid customer details: {0}")]
    InvalidCustomer(String),

    #[error("order not found")]
    OrderNotFound,

    #[error("order has no payment link")]
    NoPaymentLink,

    #[error("payment has not completed")]
    PaymentNotCompleted,

    #[error("paid amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("unsupported currency: {0}")]
    InvalidCurrency(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("payment provider error: {0}")]
    Square(#[from] SquareError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl CheckoutError {
    /// Whether the shopper can fix this by changing their cart or details.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::ProductUnavailable(_)
                | Self::UnpricedProduct(_)
                | Self::SizeUnavailable { .. }
                | Self::InsufficientStock { .. }
                | Self::InvalidCustomer(_)
        )
    }
}
