//! Core types for Riptide.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod rating;
pub mod size;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, MoneyError, round_cents};
pub use order::{AddressError, OrderItem, OrderTotals, ShippingAddress, ShippingRules};
pub use rating::{Rating, RatingError};
pub use size::{Shortfall, Size, SizeError, SizeInventory};
pub use status::*;
