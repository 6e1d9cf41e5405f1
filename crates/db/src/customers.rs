//! Customer aggregate repository.
//!
//! Customers are not accounts. A row is created or updated when a paid order
//! is confirmed, keyed by normalized email.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use riptide_core::{CustomerId, Email};

use super::{RepositoryError, contains_pattern, page_limit};

const CUSTOMER_COLUMNS: &str =
    "id, name, email, total_spent, order_count, last_order_at, created_at, updated_at";

/// Biggest spenders first; ties keep signup order.
const BY_SPEND: &str = "ORDER BY total_spent DESC, id ASC";

/// Purchase history rolled up per email address.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Email,
    pub total_spent: Decimal,
    pub order_count: i32,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    name: String,
    email: String,
    total_spent: Decimal,
    order_count: i32,
    last_order_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            name: row.name,
            email,
            total_spent: row.total_spent,
            order_count: row.order_count,
            last_order_at: row.last_order_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add a paid order to a customer's totals, creating the customer if needed.
    ///
    /// The latest name given at checkout wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn record_purchase(
        conn: &mut PgConnection,
        name: &str,
        email: &Email,
        amount: Decimal,
    ) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            r"
            INSERT INTO shop.customer (name, email, total_spent, order_count, last_order_at)
            VALUES ($1, $2, $3, 1, NOW())
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                total_spent = shop.customer.total_spent + EXCLUDED.total_spent,
                order_count = shop.customer.order_count + 1,
                last_order_at = NOW(),
                updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(name.trim())
        .bind(email.normalized())
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;

        row.try_into()
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a customer by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer WHERE email = $1"
        ))
        .bind(email.normalized())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List customers, highest lifetime spend first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let pattern = contains_pattern(search);

        let rows: Vec<CustomerRow> = sqlx::query_as(&list_query())
            .bind(pattern)
            .bind(page_limit(limit))
            .bind(offset.unwrap_or(0).max(0))
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Customers with the highest lifetime spend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_spenders(&self, limit: i64) -> Result<Vec<Customer>, RepositoryError> {
        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM shop.customer
            {BY_SPEND}
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Total number of customers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shop.customer")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Rename a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist.
    pub async fn update_name(&self, id: CustomerId, name: &str) -> Result<Customer, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            r"
            UPDATE shop.customer
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(name.trim())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }
}

fn list_query() -> String {
    format!(
        r"
        SELECT {CUSTOMER_COLUMNS}
        FROM shop.customer
        WHERE $1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1
        {BY_SPEND}
        LIMIT $2 OFFSET $3
        "
    )
}
