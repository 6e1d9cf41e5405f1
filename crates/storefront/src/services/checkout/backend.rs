//! What checkout needs from the database and the payment provider.
//!
//! [`PgCheckoutStore`] and [`SquareClient`] are the production
//! implementations.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use riptide_core::{OrderId, ProductId, Shortfall};
use riptide_db::{
    CustomerRepository, NewOrder, Order, OrderRepository, Product, ProductRepository,
    RepositoryError, SettingsRepository, StoreSettings,
};

use crate::square::{CreatePaymentLinkRequest, PaymentLink, SquareClient, SquareError, SquareOrder};

/// Hosted payment pages and order lookups.
pub trait PaymentProvider: Sync {
    fn location_id(&self) -> &str;

    fn create_payment_link(
        &self,
        request: &CreatePaymentLinkRequest,
    ) -> impl Future<Output = Result<PaymentLink, SquareError>> + Send;

    fn retrieve_order(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<SquareOrder, SquareError>> + Send;
}

impl PaymentProvider for SquareClient {
    fn location_id(&self) -> &str {
        Self::location_id(self)
    }

    async fn create_payment_link(
        &self,
        request: &CreatePaymentLinkRequest,
    ) -> Result<PaymentLink, SquareError> {
        Self::create_payment_link(self, request).await
    }

    async fn retrieve_order(&self, order_id: &str) -> Result<SquareOrder, SquareError> {
        Self::retrieve_order(self, order_id).await
    }
}

/// Order, stock, and customer persistence used by checkout.
pub trait CheckoutStore: Sync {
    fn products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn settings(&self) -> impl Future<Output = Result<StoreSettings, RepositoryError>> + Send;

    fn create_pending(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn attach_payment_link(
        &self,
        id: OrderId,
        link: &PaymentLink,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn order(&self, id: OrderId)
    -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Atomically move a pending order to processing, take its items out of
    /// stock, and add it to the customer's totals.
    ///
    /// Returns `None` without changing anything when the order is no longer
    /// pending. Otherwise returns one [`Shortfall`] per order item.
    fn settle(
        &self,
        order: &Order,
    ) -> impl Future<Output = Result<Option<Vec<Shortfall>>, RepositoryError>> + Send;

    /// Cancel the order if, and only if, it is still pending.
    fn cancel_if_pending(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// [`CheckoutStore`] backed by the shop database.
#[derive(Clone, Copy)]
pub struct PgCheckoutStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCheckoutStore<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl CheckoutStore for PgCheckoutStore<'_> {
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(self.pool).get_many(ids).await
    }

    async fn settings(&self) -> Result<StoreSettings, RepositoryError> {
        SettingsRepository::new(self.pool).get().await
    }

    async fn create_pending(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(self.pool).create_pending(order).await
    }

    async fn attach_payment_link(
        &self,
        id: OrderId,
        link: &PaymentLink,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(self.pool)
            .attach_payment_link(id, &link.id, &link.order_id, &link.url)
            .await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(self.pool).get(id).await
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(self.pool)
            .stale_pending(cutoff, limit)
            .await
    }

    async fn settle(&self, order: &Order) -> Result<Option<Vec<Shortfall>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !OrderRepository::mark_processing(&mut tx, order.id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut shortfalls = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let shortfall = ProductRepository::decrement_inventory(
                &mut tx,
                item.product_id,
                &item.size,
                item.quantity,
            )
            .await?;
            shortfalls.push(shortfall);
        }

        CustomerRepository::record_purchase(
            &mut tx,
            &order.customer_name,
            &order.customer_email,
            order.total,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(shortfalls))
    }

    async fn cancel_if_pending(&self, id: OrderId) -> Result<bool, RepositoryError> {
        OrderRepository::new(self.pool).cancel_if_pending(id).await
    }
}
