//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Password login and admin account management

pub mod auth;

pub use auth::{AdminAuthError, AdminAuthService};
