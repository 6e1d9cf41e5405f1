//! Riptide Swim storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused. The CLI reuses the checkout
//! service for its reconcile job.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assistant;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod square;
pub mod state;
