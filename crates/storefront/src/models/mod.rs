//! Session-backed models for the storefront.

pub mod session;

pub use session::{CartError, CartLine, PendingOrder, SessionCart, Wishlist, keys as session_keys};
