//! Dashboard route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use riptide_core::{OrderStatus, ProductStatus};
use riptide_db::{
    Customer, CustomerRepository, Order, OrderRepository, Product, ProductRepository,
    RevenueSummary, ReviewRepository, SettingsRepository,
};

use crate::{error::Result, middleware::RequireAdminAuth, state::AppState};

const RECENT_ORDERS: i64 = 10;
const TOP_CUSTOMERS: i64 = 5;

/// Number of records in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount<S> {
    pub status: S,
    pub count: i64,
}

/// Back-office overview.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub revenue: RevenueSummary,
    pub orders_by_status: Vec<StatusCount<OrderStatus>>,
    pub products_by_status: Vec<StatusCount<ProductStatus>>,
    pub low_stock_threshold: i32,
    pub low_stock: Vec<Product>,
    pub recent_orders: Vec<Order>,
    pub top_customers: Vec<Customer>,
    pub customer_count: i64,
    pub unreplied_reviews: i64,
}

/// Every order status, with zero for those that have no orders.
fn order_counts(rows: &[(OrderStatus, i64)]) -> Vec<StatusCount<OrderStatus>> {
    OrderStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: rows
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, count)| *count),
        })
        .collect()
}

/// Dashboard overview.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>> {
    let pool = state.pool();
    let orders = OrderRepository::new(pool);
    let products = ProductRepository::new(pool);
    let customers = CustomerRepository::new(pool);
    let reviews = ReviewRepository::new(pool);

    let settings = SettingsRepository::new(pool).get().await?;

    let (revenue, order_rows, product_rows, low_stock, recent_orders, top_customers) = tokio::try_join!(
        orders.revenue_summary(),
        orders.count_by_status(),
        products.count_by_status(),
        products.low_stock(settings.low_stock_threshold),
        orders.recent(RECENT_ORDERS),
        customers.top_spenders(TOP_CUSTOMERS),
    )?;
    let (customer_count, unreplied_reviews) = tokio::try_join!(
        customers.count(),
        reviews.count_unreplied(),
    )?;

    Ok(Json(Dashboard {
        revenue,
        orders_by_status: order_counts(&order_rows),
        products_by_status: product_rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        low_stock_threshold: settings.low_stock_threshold,
        low_stock,
        recent_orders,
        top_customers,
        customer_count,
        unreplied_reviews,
    }))
}
