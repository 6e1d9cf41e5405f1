//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `checkout` - Pending orders, Square payment links, and payment confirmation

pub mod checkout;

pub use checkout::{
    CheckoutCustomer, CheckoutError, CheckoutService, CheckoutStarted, Confirmation,
    ReconcileReport,
};
