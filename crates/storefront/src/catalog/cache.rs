//! Cache types for catalog reads.

use std::sync::Arc;

use riptide_core::ProductId;
use riptide_db::{Product, ProductFilter, ReviewSummary, StoreSettings};

/// Cache key for catalog entries.
#[derive(Debug, Clone, Copy)]
pub enum CacheKey<'a> {
    Products(&'a ProductFilter),
    Product(ProductId),
    Categories,
    Settings,
}

impl CacheKey<'_> {
    /// String form used as the moka key.
    pub fn render(&self) -> String {
        match self {
            Self::Products(filter) => format!("products:{filter:?}"),
            Self::Product(id) => format!("product:{id}"),
            Self::Categories => "categories".to_string(),
            Self::Settings => "settings".to_string(),
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Arc<(Product, ReviewSummary)>),
    Categories(Arc<Vec<String>>),
    Settings(Arc<StoreSettings>),
}
