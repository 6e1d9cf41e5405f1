//! Product catalog repository.
//!
//! Stock is stored per size in `size_inventory` (JSONB). The `inventory`
//! column always holds the sum across sizes and is rewritten whenever the
//! per-size map changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use riptide_core::{ProductId, ProductStatus, Shortfall, Size, SizeInventory};

use super::{RepositoryError, contains_pattern, page_limit};

const PRODUCT_COLUMNS: &str = "id, title, description, category, price, compare_at_price, \
     images, size_inventory, inventory, status, is_featured, created_at, updated_at";

// =============================================================================
// Types
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub images: Vec<String>,
    pub size_inventory: SizeInventory,
    /// Sum of `size_inventory`.
    pub inventory: u32,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Whether the product is on sale (compare-at price above price).
    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|c| c > self.price)
    }
}

/// Fields accepted when creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub size_inventory: SizeInventory,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub is_featured: bool,
}

impl ProductInput {
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        validate_price("price", self.price)?;
        if let Some(compare_at) = self.compare_at_price {
            validate_price("compare_at_price", compare_at)?;
        }
        validate_images(&self.images)?;
        validate_inventory(&self.size_inventory)
    }
}

/// Partial product edit. Absent fields keep their stored value.
///
/// Stock is not part of a patch; it changes through
/// [`ProductRepository::set_size_inventory`] and paid orders only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `null` clears the category.
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
    pub price: Option<Decimal>,
    /// `null` clears the compare-at price.
    #[serde(default, deserialize_with = "present")]
    pub compare_at_price: Option<Option<Decimal>>,
    pub images: Option<Vec<String>>,
    pub status: Option<ProductStatus>,
    pub is_featured: Option<bool>,
}

impl ProductPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.compare_at_price.is_none()
            && self.images.is_none()
            && self.status.is_none()
            && self.is_featured.is_none()
    }

    /// Check only the fields being changed.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(price) = self.price {
            validate_price("price", price)?;
        }
        if let Some(Some(compare_at)) = self.compare_at_price {
            validate_price("compare_at_price", compare_at)?;
        }
        if let Some(images) = &self.images {
            validate_images(images)?;
        }
        Ok(())
    }

    /// Apply the patch to a stored product.
    pub fn apply(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(compare_at) = self.compare_at_price {
            product.compare_at_price = compare_at;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(is_featured) = self.is_featured {
            product.is_featured = is_featured;
        }
    }
}

/// Distinguish an explicit `null` (`Some(None)`) from a missing field (`None`).
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title is required".to_string());
    }
    if title.chars().count() > 200 {
        return Err("title must be at most 200 characters".to_string());
    }
    Ok(())
}

fn validate_price(field: &str, price: Decimal) -> Result<(), String> {
    if price.is_sign_negative() {
        return Err(format!("{field} cannot be negative"));
    }
    Ok(())
}

fn validate_images(images: &[String]) -> Result<(), String> {
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err("image URLs cannot be blank".to_string());
    }
    Ok(())
}

/// Stock must fit the `INTEGER` columns it is stored in.
///
/// # Errors
///
/// Returns a message when the total stock is too large to store.
pub fn validate_inventory(inventory: &SizeInventory) -> Result<(), String> {
    if i32::try_from(inventory.total()).is_err() {
        return Err(format!("total inventory must be at most {}", i32::MAX));
    }
    Ok(())
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC, id DESC",
            Self::PriceAsc => " ORDER BY price ASC, id ASC",
            Self::PriceDesc => " ORDER BY price DESC, id ASC",
            Self::Title => " ORDER BY lower(title) ASC, id ASC",
        }
    }
}

/// Filters for [`ProductRepository::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    pub category: Option<String>,
    /// Only products with this size in stock.
    pub size: Option<Size>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    description: String,
    category: Option<String>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    images: Vec<String>,
    size_inventory: Json<SizeInventory>,
    inventory: i32,
    status: ProductStatus,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let inventory = u32::try_from(row.inventory).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative inventory {} on product {}",
                row.inventory, row.id
            ))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            title: row.title,
            description: row.description,
            category: row.category,
            price: row.price,
            compare_at_price: row.compare_at_price,
            images: row.images,
            size_inventory: row.size_inventory.0,
            inventory,
            status: row.status,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Stored total. Writers validate with [`validate_inventory`] first, and
/// sales only lower the total, so the clamp is never reached in practice.
fn total_as_i32(inventory: &SizeInventory) -> i32 {
    i32::try_from(inventory.total()).unwrap_or(i32::MAX)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE TRUE"));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            qb.push(" AND lower(category) = lower(")
                .push_bind(category.to_string())
                .push(")");
        }
        if let Some(size) = &filter.size {
            qb.push(" AND COALESCE((size_inventory ->> ")
                .push_bind(size.as_str().to_string())
                .push(")::int, 0) > 0");
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }
        if let Some(featured) = filter.featured {
            qb.push(" AND is_featured = ").push_bind(featured);
        }

        qb.push(filter.sort.order_by());
        qb.push(" LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Distinct categories of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT DISTINCT category
            FROM shop.product
            WHERE status = 'active' AND category IS NOT NULL
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get several products at once. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Oldest product whose title matches, ignoring case and surrounding space.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<ProductId>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT id FROM shop.product WHERE lower(title) = lower($1) ORDER BY id LIMIT 1",
        )
        .bind(title.trim())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id,)| ProductId::new(id)))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO shop.product
                (title, description, category, price, compare_at_price, images,
                 size_inventory, inventory, status, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.images)
        .bind(Json(&input.size_inventory))
        .bind(total_as_i32(&input.size_inventory))
        .bind(input.status)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await?;

        tracing::info!(product_id = row.id, title = %row.title, "Product created");
        row.try_into()
    }

    /// Replace all editable fields of a product, stock included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn replace(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE shop.product
            SET title = $2, description = $3, category = $4, price = $5,
                compare_at_price = $6, images = $7, size_inventory = $8,
                inventory = $9, status = $10, is_featured = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(&input.images)
        .bind(Json(&input.size_inventory))
        .bind(total_as_i32(&input.size_inventory))
        .bind(input.status)
        .bind(input.is_featured)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Change only the fields present in `patch`.
    ///
    /// The row is locked while the patch is applied, so concurrent stock
    /// changes are neither lost nor overwritten.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut product: Product = current.ok_or(RepositoryError::NotFound)?.try_into()?;

        patch.apply(&mut product);

        let row: ProductRow = sqlx::query_as(&format!(
            r"
            UPDATE shop.product
            SET title = $2, description = $3, category = $4, price = $5,
                compare_at_price = $6, images = $7, status = $8, is_featured = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.category.as_deref())
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(&product.images)
        .bind(product.status)
        .bind(product.is_featured)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace the per-size stock of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_size_inventory(
        &self,
        id: ProductId,
        inventory: &SizeInventory,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE shop.product
            SET size_inventory = $2, inventory = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(Json(inventory))
        .bind(total_as_i32(inventory))
        .fetch_optional(self.pool)
        .await?;

        let product: Product = row.ok_or(RepositoryError::NotFound)?.try_into()?;
        tracing::info!(product_id = %id, total = product.inventory, "Inventory updated");
        Ok(product)
    }

    /// Soft-delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn archive(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET status = 'archived', is_featured = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Active products whose total stock is at or below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product
            WHERE status = 'active' AND inventory <= $1
            ORDER BY inventory ASC, id ASC
            "
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Count products by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(ProductStatus, i64)>, RepositoryError> {
        let rows: Vec<(ProductStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM shop.product GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Take sold units out of stock inside a payment transaction.
    ///
    /// The row is locked for the rest of the transaction. Stock stops at zero;
    /// whatever could not be taken is returned as a [`Shortfall`]. A product
    /// that no longer exists is reported as a full shortfall.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn decrement_inventory(
        conn: &mut PgConnection,
        id: ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<Shortfall, RepositoryError> {
        let current: Option<(Json<SizeInventory>,)> =
            sqlx::query_as("SELECT size_inventory FROM shop.product WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some((Json(mut stock),)) = current else {
            return Ok(Shortfall(quantity));
        };

        let shortfall = stock.decrement(size, quantity);

        sqlx::query(
            r"
            UPDATE shop.product
            SET size_inventory = $2, inventory = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(&stock))
        .bind(total_as_i32(&stock))
        .execute(&mut *conn)
        .await?;

        Ok(shortfall)
    }
}
