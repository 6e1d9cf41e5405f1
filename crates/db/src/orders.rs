//! Order repository.
//!
//! Orders are inserted as `pending` at checkout and move to `processing`
//! exactly once, when payment is verified. [`OrderRepository::mark_processing`]
//! is the guard that makes that step idempotent across the webhook, the
//! redirect confirmation, and the reconcile job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use riptide_core::{Email, OrderId, OrderItem, OrderStatus, OrderTotals, ShippingAddress};

use super::{RepositoryError, contains_pattern, page_limit};

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, items, subtotal, shipping, tax, \
     total, currency, status, tracking_number, shipping_address, payment_link_id, \
     provider_order_id, payment_url, paid_at, shipped_at, created_at, updated_at";

// =============================================================================
// Types
// =============================================================================

/// A customer order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: Email,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_link_id: Option<String>,
    /// Square order ID created with the payment link.
    pub provider_order_id: Option<String>,
    pub payment_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// A new pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: Email,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub currency: String,
    pub shipping_address: ShippingAddress,
}

/// Filters for [`OrderRepository::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Case-insensitive match on customer name or email.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Revenue over paid orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    pub revenue: Decimal,
    pub paid_orders: i64,
    pub average_order_value: Decimal,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_name: String,
    customer_email: String,
    items: Json<Vec<OrderItem>>,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    currency: String,
    status: OrderStatus,
    tracking_number: Option<String>,
    shipping_address: Json<ShippingAddress>,
    payment_link_id: Option<String>,
    provider_order_id: Option<String>,
    payment_url: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            customer_name: row.customer_name,
            customer_email,
            items: row.items.0,
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            currency: row.currency,
            status: row.status,
            tracking_number: row.tracking_number,
            shipping_address: row.shipping_address.0,
            payment_link_id: row.payment_link_id,
            provider_order_id: row.provider_order_id,
            payment_url: row.payment_url,
            paid_at: row.paid_at,
            shipped_at: row.shipped_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn average(revenue: Decimal, count: i64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    riptide_core::round_cents(revenue / Decimal::from(count))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the ID is already taken.
    pub async fn create_pending(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row: OrderRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO shop."order"
                (id, customer_name, customer_email, items, subtotal, shipping, tax,
                 total, currency, status, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(order.customer_name.trim())
        .bind(order.customer_email.normalized())
        .bind(Json(&order.items))
        .bind(order.totals.subtotal)
        .bind(order.totals.shipping)
        .bind(order.totals.tax)
        .bind(order.totals.total)
        .bind(&order.currency)
        .bind(Json(&order.shipping_address))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "order"))?;

        row.try_into()
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM shop."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find an order by the payment provider's order ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM shop."order" WHERE provider_order_id = $1"#
        ))
        .bind(provider_order_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            r#"SELECT {ORDER_COLUMNS} FROM shop."order" WHERE TRUE"#
        ));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (customer_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR customer_email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        let rows: Vec<OrderRow> = qb.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Most recent orders regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        self.list(&OrderFilter {
            limit: Some(limit),
            ..OrderFilter::default()
        })
        .await
    }

    /// All orders placed with an email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_customer(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM shop."order"
            WHERE lower(customer_email) = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(email.normalized())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Number of orders in each status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(OrderStatus, i64)>, RepositoryError> {
        let rows: Vec<(OrderStatus, i64)> = sqlx::query_as(
            r#"SELECT status, COUNT(*) FROM shop."order" GROUP BY status ORDER BY status"#,
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Revenue across orders that have been paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_summary(&self) -> Result<RevenueSummary, RepositoryError> {
        let (revenue, paid_orders): (Decimal, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total), 0), COUNT(*)
            FROM shop."order"
            WHERE status IN ('processing', 'shipped', 'delivered')
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(RevenueSummary {
            revenue,
            paid_orders,
            average_order_value: average(revenue, paid_orders),
        })
    }

    /// Pending orders created before `cutoff`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM shop."order"
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Store the payment link created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn attach_payment_link(
        &self,
        id: OrderId,
        payment_link_id: &str,
        provider_order_id: &str,
        payment_url: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shop."order"
            SET payment_link_id = $2, provider_order_id = $3, payment_url = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payment_link_id)
        .bind(provider_order_id)
        .bind(payment_url)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "provider order"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Move a pending order to processing inside a payment transaction.
    ///
    /// Returns `false` when the order was not pending, meaning another
    /// confirmation already handled it (or it was cancelled).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_processing(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shop."order"
            SET status = 'processing', paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel an order only if it is still pending.
    ///
    /// Returns `false` when the order had already left pending, for example
    /// because a payment confirmation won the race.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel_if_pending(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shop."order"
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        let cancelled = result.rows_affected() == 1;
        if cancelled {
            tracing::info!(order_id = %id, "Pending order cancelled");
        }
        Ok(cancelled)
    }

    /// Move an order to a new status, enforcing the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::InvalidTransition` if the move isn't allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(OrderStatus,)> =
            sqlx::query_as(r#"SELECT status FROM shop."order" WHERE id = $1 FOR UPDATE"#)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (current,) = current.ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let row: OrderRow = sqlx::query_as(&format!(
            r#"
            UPDATE shop."order"
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %id, from = %current, to = %next, "Order status changed");
        row.try_into()
    }

    /// Mark a processing order as shipped with a tracking number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::InvalidTransition` if the order isn't processing.
    pub async fn ship(&self, id: OrderId, tracking_number: &str) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE shop."order"
            SET status = 'shipped', tracking_number = $2, shipped_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tracking_number)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            tracing::info!(order_id = %id, tracking_number, "Order shipped");
            return row.try_into();
        }

        // Distinguish "missing" from "wrong state"
        let order = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        Err(RepositoryError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Shipped,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use riptide_core::{ProductId, Size};

    use super::*;

    #[test]
    fn test_average_order_value() {
        assert_eq!(average(Decimal::ZERO, 0), Decimal::ZERO);
        assert_eq!(
            average(Decimal::from_str("100.00").unwrap(), 3),
            Decimal::from_str("33.33").unwrap()
        );
    }

    #[test]
    fn test_order_filter_parses_status() {
        let filter: OrderFilter =
            serde_json::from_str(r#"{"status": "processing", "search": "ana"}"#).unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Processing));
        assert_eq!(filter.search.as_deref(), Some("ana"));
    }

    #[test]
    fn test_items_json_shape() {
        let items = vec![OrderItem {
            product_id: ProductId::new(3),
            title: "Swell Rash Guard".to_string(),
            size: Size::parse("L").unwrap(),
            unit_price: Decimal::from_str("62.00").unwrap(),
            quantity: 2,
        }];
        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(json[0]["product_id"], 3);
        assert_eq!(json[0]["size"], "L");
        assert_eq!(json[0]["quantity"], 2);
    }
}
