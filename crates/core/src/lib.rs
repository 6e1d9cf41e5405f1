//! Riptide Core - Shared types library.
//!
//! This crate provides common types used across all Riptide components:
//! - `storefront` - Public catalog, cart, and checkout API
//! - `admin` - Back-office API for products, orders, customers, and settings
//! - `db` - `PostgreSQL` repositories
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and the pure rules attached to them
//! (inventory arithmetic, order totals, status transitions). No I/O, no
//! database access, no HTTP clients.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, sizes, ratings, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
