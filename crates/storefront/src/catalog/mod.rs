//! Cached read access to the public catalog.
//!
//! Listings, product detail, categories, and store settings are cached with
//! `moka` for 60 seconds. Searches are not cached. Anything the shopper can
//! buy is re-read from the database at checkout, so a stale entry can only
//! make a listing briefly out of date.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use riptide_core::{ProductId, ProductStatus};
use riptide_db::{
    Product, ProductFilter, ProductRepository, RepositoryError, ReviewRepository, ReviewSummary,
    SettingsRepository, StoreSettings,
};

use cache::{CacheKey, CacheValue};

const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 1000;

/// Active catalog backed by the database, with a short-lived cache.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    pool: PgPool,
    cache: Cache<String, CacheValue>,
}

impl Catalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogInner { pool, cache }),
        }
    }

    /// Active products matching `filter`. Any status in the filter is ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn products(&self, filter: &ProductFilter) -> Result<Arc<Vec<Product>>, RepositoryError> {
        let mut filter = filter.clone();
        filter.status = Some(ProductStatus::Active);
        filter.search = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if filter.search.is_some() {
            let products = ProductRepository::new(&self.inner.pool).list(&filter).await?;
            return Ok(Arc::new(products));
        }

        let key = CacheKey::Products(&filter).render();
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let products = Arc::new(ProductRepository::new(&self.inner.pool).list(&filter).await?);
        self.inner
            .cache
            .insert(key, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// An active product with its review summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn product(
        &self,
        id: ProductId,
    ) -> Result<Option<Arc<(Product, ReviewSummary)>>, RepositoryError> {
        let key = CacheKey::Product(id).render();
        if let Some(CacheValue::Product(entry)) = self.inner.cache.get(&key).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(entry));
        }

        let Some(product) = ProductRepository::new(&self.inner.pool).get(id).await? else {
            return Ok(None);
        };
        if !product.is_purchasable() {
            return Ok(None);
        }
        let summary = ReviewRepository::new(&self.inner.pool)
            .summary_for_product(id)
            .await?;

        let entry = Arc::new((product, summary));
        self.inner
            .cache
            .insert(key, CacheValue::Product(Arc::clone(&entry)))
            .await;
        Ok(Some(entry))
    }

    /// Categories that have at least one active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn categories(&self) -> Result<Arc<Vec<String>>, RepositoryError> {
        let key = CacheKey::Categories.render();
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&key).await {
            return Ok(categories);
        }

        let categories = Arc::new(ProductRepository::new(&self.inner.pool).categories().await?);
        self.inner
            .cache
            .insert(key, CacheValue::Categories(Arc::clone(&categories)))
            .await;
        Ok(categories)
    }

    /// Store settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the settings row can't be read.
    pub async fn settings(&self) -> Result<Arc<StoreSettings>, RepositoryError> {
        let key = CacheKey::Settings.render();
        if let Some(CacheValue::Settings(settings)) = self.inner.cache.get(&key).await {
            return Ok(settings);
        }

        let settings = Arc::new(SettingsRepository::new(&self.inner.pool).get().await?);
        self.inner
            .cache
            .insert(key, CacheValue::Settings(Arc::clone(&settings)))
            .await;
        Ok(settings)
    }

    /// Drop a product's cached detail.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(id).render())
            .await;
    }

    /// Drop everything, e.g. after a paid order changes stock.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use riptide_db::ProductSort;

    use super::*;

    #[test]
    fn test_cache_keys_distinguish_filters() {
        let newest = ProductFilter::default();
        let by_price = ProductFilter {
            sort: ProductSort::PriceAsc,
            ..ProductFilter::default()
        };
        assert_ne!(
            CacheKey::Products(&newest).render(),
            CacheKey::Products(&by_price).render()
        );
        assert_eq!(CacheKey::Product(ProductId::new(9)).render(), "product:9");
    }

    #[test]
    fn test_catalog_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<Catalog>();
    }
}
