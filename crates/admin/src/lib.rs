//! Riptide Swim admin library.
//!
//! This crate provides the back-office API as a library, allowing it to be
//! tested and reused. The CLI uses [`services::AdminAuthService`] to create
//! the first admin account.
//!
//! # Security
//!
//! This crate can change prices, stock, orders, and admin accounts. Deploy
//! it on private infrastructure only; it binds to localhost by default.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
