//! Checkout and payment confirmation.
//!
//! # Flow
//!
//! 1. [`CheckoutService::start_checkout`] prices the session cart from the
//!    database, stores a pending order, and asks Square for a hosted payment
//!    page.
//! 2. The shopper pays on Square and is redirected back.
//! 3. [`CheckoutService::confirm_payment`] (from the redirect, the webhook, or
//!    the reconcile job) checks the Square order server-side and, in one
//!    transaction, moves the order to processing, takes inventory, and
//!    updates the customer's totals.
//!
//! Confirmation is idempotent: only the request that flips the order from
//! pending to processing touches inventory.

mod backend;
mod error;

pub use backend::{CheckoutStore, PaymentProvider, PgCheckoutStore};
pub use error::CheckoutError;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use riptide_core::{
    CurrencyCode, Email, Money, OrderId, OrderItem, OrderStatus, OrderTotals, ShippingAddress,
};
use riptide_db::{NewOrder, Order, Product};

use crate::models::SessionCart;
use crate::square::{
    CheckoutOptions, CreatePaymentLinkRequest, NewLineItem, NewSquareOrder, PrePopulatedData,
    SquareClient, SquareMoney, SquareOrder,
};

/// Longest customer name accepted at checkout.
const MAX_NAME_LENGTH: usize = 100;

/// Who is buying and where it ships.
#[derive(Debug, Clone)]
pub struct CheckoutCustomer {
    pub name: String,
    pub email: Email,
    pub shipping_address: ShippingAddress,
}

impl CheckoutCustomer {
    fn validate(&self) -> Result<(), CheckoutError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CheckoutError::InvalidCustomer("name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(CheckoutError::InvalidCustomer(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        self.shipping_address
            .validate()
            .map_err(|e| CheckoutError::InvalidCustomer(e.to_string()))
    }
}

/// A pending order waiting on the shopper to pay.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub order_id: OrderId,
    pub payment_url: String,
    pub totals: OrderTotals,
}

/// Outcome of a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub status: OrderStatus,
    /// `true` only for the call that moved the order out of pending.
    pub newly_processed: bool,
}

/// Counts from a reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub still_pending: usize,
    /// Confirmed or cancelled by the webhook or redirect during the run.
    pub settled_elsewhere: usize,
    pub failed: usize,
}

/// Checkout service.
pub struct CheckoutService<'a, S = PgCheckoutStore<'a>, P = SquareClient> {
    store: S,
    payments: &'a P,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, square: &'a SquareClient) -> Self {
        Self::with_backend(PgCheckoutStore::new(pool), square)
    }
}

impl<'a, S: CheckoutStore, P: PaymentProvider> CheckoutService<'a, S, P> {
    #[must_use]
    pub const fn with_backend(store: S, payments: &'a P) -> Self {
        Self { store, payments }
    }

    /// Create a pending order from the cart and a Square payment link for it.
    ///
    /// # Errors
    ///
    /// Returns a client error (`EmptyCart`, `ProductUnavailable`,
    /// `SizeUnavailable`, `InsufficientStock`, `InvalidCustomer`) when the
    /// cart can't be bought as-is, `CheckoutError::Square` if the payment
    /// link can't be created (the order is cancelled), or
    /// `CheckoutError::Repository` on database failure.
    #[tracing::instrument(skip_all, fields(lines = cart.lines.len()))]
    pub async fn start_checkout(
        &self,
        cart: &SessionCart,
        customer: &CheckoutCustomer,
        base_url: &str,
    ) -> Result<CheckoutStarted, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        customer.validate()?;

        let products = self.store.products(&cart.product_ids()).await?;
        let items = build_order_items(cart, &products)?;

        let settings = self.store.settings().await?;
        let currency = settings.currency_code()?;
        let totals = OrderTotals::compute(&items, &settings.shipping_rules(), settings.tax_rate);

        let order = self
            .store
            .create_pending(&NewOrder {
                id: OrderId::generate(),
                customer_name: customer.name.trim().to_string(),
                customer_email: customer.email.clone(),
                items,
                totals,
                currency: currency.code().to_string(),
                shipping_address: customer.shipping_address.clone(),
            })
            .await?;

        let request =
            payment_link_request(&order, currency, self.payments.location_id(), base_url)?;

        let link = match self.payments.create_payment_link(&request).await {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Payment link creation failed");
                if let Err(cancel_err) = self.store.cancel_if_pending(order.id).await {
                    tracing::error!(
                        order_id = %order.id,
                        error = %cancel_err,
                        "Failed to cancel order after payment link failure"
                    );
                }
                return Err(e.into());
            }
        };

        self.store.attach_payment_link(order.id, &link).await?;

        tracing::info!(
            order_id = %order.id,
            total = %totals.total,
            "Checkout started"
        );

        Ok(CheckoutStarted {
            order_id: order.id,
            payment_url: link.url,
            totals,
        })
    }

    /// Verify payment with Square and fulfil the order's bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for an unknown order,
    /// `NoPaymentLink` if checkout never reached Square,
    /// `PaymentNotCompleted` or `AmountMismatch` if Square does not report a
    /// full payment of the order total, and `Square`/`Repository` errors on
    /// upstream failure.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: OrderId) -> Result<Confirmation, CheckoutError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.status != OrderStatus::Pending {
            return Ok(Confirmation {
                status: order.status,
                newly_processed: false,
            });
        }

        let provider_order_id = order
            .provider_order_id
            .as_deref()
            .ok_or(CheckoutError::NoPaymentLink)?;
        let square_order = self.payments.retrieve_order(provider_order_id).await?;
        verify_paid(&order, &square_order)?;

        let Some(shortfalls) = self.store.settle(&order).await? else {
            let status = self
                .store
                .order(order_id)
                .await?
                .map_or(OrderStatus::Pending, |o| o.status);
            tracing::debug!(%order_id, %status, "Order already confirmed elsewhere");
            return Ok(Confirmation {
                status,
                newly_processed: false,
            });
        };

        for (item, shortfall) in order.items.iter().zip(shortfalls) {
            if !shortfall.is_none() {
                tracing::warn!(
                    %order_id,
                    product_id = %item.product_id,
                    size = %item.size,
                    ordered = item.quantity,
                    missing = shortfall.0,
                    "Inventory shortfall on paid order"
                );
            }
        }

        tracing::info!(%order_id, total = %order.total, "Payment confirmed");
        Ok(Confirmation {
            status: OrderStatus::Processing,
            newly_processed: true,
        })
    }

    /// Re-check pending orders created before `older_than`.
    ///
    /// Paid orders are confirmed. Unpaid orders created before
    /// `abandon_before` are cancelled; newer ones are left pending.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the stale orders can't be
    /// listed. Failures on individual orders are logged and counted.
    pub async fn reconcile(
        &self,
        older_than: DateTime<Utc>,
        abandon_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<ReconcileReport, CheckoutError> {
        let stale = self.store.stale_pending(older_than, limit).await?;
        let mut report = ReconcileReport {
            checked: stale.len(),
            ..ReconcileReport::default()
        };

        for order in stale {
            let abandoned = order.created_at < abandon_before;
            match self.confirm_payment(order.id).await {
                Ok(confirmation) if confirmation.newly_processed => report.confirmed += 1,
                Ok(_) => report.settled_elsewhere += 1,
                Err(CheckoutError::PaymentNotCompleted | CheckoutError::NoPaymentLink)
                    if abandoned =>
                {
                    match self.store.cancel_if_pending(order.id).await {
                        Ok(true) => {
                            tracing::info!(order_id = %order.id, "Cancelled abandoned order");
                            report.cancelled += 1;
                        }
                        Ok(false) => {
                            tracing::info!(order_id = %order.id, "Order settled before it could be cancelled");
                            report.settled_elsewhere += 1;
                        }
                        Err(e) => {
                            tracing::warn!(order_id = %order.id, error = %e, "Failed to cancel order");
                            report.failed += 1;
                        }
                    }
                }
                Err(CheckoutError::PaymentNotCompleted | CheckoutError::NoPaymentLink) => {
                    report.still_pending += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Reconcile failed for order");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            confirmed = report.confirmed,
            cancelled = report.cancelled,
            still_pending = report.still_pending,
            settled_elsewhere = report.settled_elsewhere,
            failed = report.failed,
            "Reconcile finished"
        );
        Ok(report)
    }
}

/// Snapshot cart lines against current product data.
///
/// # Errors
///
/// Returns an error for inactive, missing, or unpriced products, sizes the
/// product doesn't offer, or quantities beyond current stock.
pub fn build_order_items(
    cart: &SessionCart,
    products: &[Product],
) -> Result<Vec<OrderItem>, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    cart.lines
        .iter()
        .map(|line| {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id && p.is_purchasable())
                .ok_or(CheckoutError::ProductUnavailable(line.product_id))?;

            if product.price <= Decimal::ZERO {
                return Err(CheckoutError::UnpricedProduct(product.title.clone()));
            }
            if !product.size_inventory.offers(&line.size) {
                return Err(CheckoutError::SizeUnavailable {
                    title: product.title.clone(),
                    size: line.size.clone(),
                });
            }
            if !product.size_inventory.can_fulfill(&line.size, line.quantity) {
                return Err(CheckoutError::InsufficientStock {
                    title: product.title.clone(),
                    size: line.size.clone(),
                    available: product.size_inventory.available(&line.size),
                });
            }

            Ok(OrderItem {
                product_id: product.id,
                title: product.title.clone(),
                size: line.size.clone(),
                unit_price: product.price,
                quantity: line.quantity,
            })
        })
        .collect()
}

/// Build the Square request for an order.
///
/// Shipping and tax go in as their own line items so the Square total equals
/// the order total.
///
/// # Errors
///
/// Returns `CheckoutError::Money` if an amount can't be expressed in cents.
pub fn payment_link_request(
    order: &Order,
    currency: CurrencyCode,
    location_id: &str,
    base_url: &str,
) -> Result<CreatePaymentLinkRequest, CheckoutError> {
    let money = |amount: Decimal| -> Result<SquareMoney, CheckoutError> {
        Ok(SquareMoney {
            amount: Money::new(amount, currency).to_minor_units()?,
            currency: currency.code().to_string(),
        })
    };

    let mut line_items = order
        .items
        .iter()
        .map(|item| {
            Ok(NewLineItem {
                name: item.title.clone(),
                quantity: item.quantity.to_string(),
                base_price_money: money(item.unit_price)?,
                note: Some(format!("Size {}", item.size)),
            })
        })
        .collect::<Result<Vec<_>, CheckoutError>>()?;

    for (name, amount) in [("Shipping", order.shipping), ("Tax", order.tax)] {
        if amount > Decimal::ZERO {
            line_items.push(NewLineItem {
                name: name.to_string(),
                quantity: "1".to_string(),
                base_price_money: money(amount)?,
                note: None,
            });
        }
    }

    Ok(CreatePaymentLinkRequest {
        idempotency_key: order.id.to_string(),
        order: NewSquareOrder {
            location_id: location_id.to_string(),
            reference_id: order.id.to_string(),
            line_items,
        },
        checkout_options: CheckoutOptions {
            redirect_url: format!("{base_url}/checkout/complete?order_id={}", order.id),
            ask_for_shipping_address: false,
        },
        pre_populated_data: Some(PrePopulatedData {
            buyer_email: order.customer_email.as_str().to_string(),
        }),
    })
}

/// Check that Square reports full payment of the order total.
///
/// # Errors
///
/// Returns `PaymentNotCompleted` if unpaid, `AmountMismatch` if the paid
/// total differs from ours, or `InvalidCurrency` for an unknown currency.
pub fn verify_paid(order: &Order, square_order: &SquareOrder) -> Result<(), CheckoutError> {
    if !square_order.is_paid() {
        return Err(CheckoutError::PaymentNotCompleted);
    }

    let currency: CurrencyCode = order
        .currency
        .parse()
        .map_err(|_| CheckoutError::InvalidCurrency(order.currency.clone()))?;
    let expected = Money::new(order.total, currency).to_minor_units()?;
    let paid = &square_order.total_money;

    if paid.currency != currency.code() {
        return Err(CheckoutError::InvalidCurrency(paid.currency.clone()));
    }
    if paid.amount != expected {
        tracing::error!(
            order_id = %order.id,
            expected,
            actual = paid.amount,
            "Square total does not match order total"
        );
        return Err(CheckoutError::AmountMismatch {
            expected,
            actual: paid.amount,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    use chrono::Duration;
    use riptide_core::{ProductId, ProductStatus, Shortfall, Size, SizeInventory};
    use riptide_db::{RepositoryError, StoreSettings};

    use super::*;
    use crate::square::{PaymentLink, SquareError, SquareOrderState};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    fn product(id: i32, price: &str, stock: &[(&str, u32)]) -> Product {
        let size_inventory: SizeInventory = stock.iter().map(|(s, q)| (size(s), *q)).collect();
        Product {
            id: ProductId::new(id),
            title: format!("Suit {id}"),
            description: String::new(),
            category: Some("one-pieces".to_string()),
            price: dec(price),
            compare_at_price: None,
            images: Vec::new(),
            inventory: stock.iter().map(|(_, q)| *q).sum(),
            size_inventory,
            status: ProductStatus::Active,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Maya Lin".to_string(),
            line1: "12 Shore Rd".to_string(),
            line2: None,
            city: "Santa Cruz".to_string(),
            region: "CA".to_string(),
            postal_code: "95060".to_string(),
            country: "US".to_string(),
        }
    }

    fn order(items: Vec<OrderItem>, shipping: &str, tax: &str) -> Order {
        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
        Order {
            id: OrderId::generate(),
            customer_name: "Maya Lin".to_string(),
            customer_email: Email::parse("maya@example.com").unwrap(),
            items,
            subtotal,
            shipping: dec(shipping),
            tax: dec(tax),
            total: subtotal + dec(shipping) + dec(tax),
            currency: "USD".to_string(),
            status: OrderStatus::Pending,
            tracking_number: None,
            shipping_address: address(),
            payment_link_id: None,
            provider_order_id: None,
            payment_url: None,
            paid_at: None,
            shipped_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(price: &str, qty: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(1),
            title: "Marina One-Piece".to_string(),
            size: size("M"),
            unit_price: dec(price),
            quantity: qty,
        }
    }

    fn square_order(state: &str, total: i64, due: i64, tendered: bool) -> SquareOrder {
        let tenders = if tendered {
            r#"[{"id": "t-1", "type": "CARD"}]"#
        } else {
            "[]"
        };
        serde_json::from_str(&format!(
            r#"{{
                "id": "sq-1",
                "state": "{state}",
                "total_money": {{"amount": {total}, "currency": "USD"}},
                "net_amount_due_money": {{"amount": {due}, "currency": "USD"}},
                "tenders": {tenders}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_build_order_items_prices_from_products() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 2).unwrap();
        let products = vec![product(1, "88.00", &[("M", 5)])];

        let items = build_order_items(&cart, &products).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, dec("88.00"));
        assert_eq!(items[0].title, "Suit 1");
        assert_eq!(items[0].line_total(), dec("176.00"));
    }

    #[test]
    fn test_build_order_items_rejects_inactive_and_missing() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 1).unwrap();

        let mut draft = product(1, "10.00", &[("M", 5)]);
        draft.status = ProductStatus::Draft;
        assert!(matches!(
            build_order_items(&cart, &[draft]),
            Err(CheckoutError::ProductUnavailable(id)) if id == ProductId::new(1)
        ));
        assert!(matches!(
            build_order_items(&cart, &[]),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_build_order_items_checks_size_and_stock() {
        let products = vec![product(1, "10.00", &[("S", 1), ("M", 0)])];

        let mut wrong_size = SessionCart::default();
        wrong_size.add(ProductId::new(1), size("XL"), 1).unwrap();
        assert!(matches!(
            build_order_items(&wrong_size, &products),
            Err(CheckoutError::SizeUnavailable { .. })
        ));

        let mut too_many = SessionCart::default();
        too_many.add(ProductId::new(1), size("S"), 2).unwrap();
        assert!(matches!(
            build_order_items(&too_many, &products),
            Err(CheckoutError::InsufficientStock { available: 1, .. })
        ));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            build_order_items(&SessionCart::default(), &[]),
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[test]
    fn test_payment_link_request_adds_shipping_and_tax_lines() {
        let order = order(vec![item("48.00", 2)], "7.95", "7.92");
        let request =
            payment_link_request(&order, CurrencyCode::Usd, "L1", "https://riptideswim.com")
                .unwrap();

        let lines = &request.order.line_items;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].base_price_money.amount, 4800);
        assert_eq!(lines[0].quantity, "2");
        assert_eq!(lines[0].note.as_deref(), Some("Size M"));
        assert_eq!(lines[1].name, "Shipping");
        assert_eq!(lines[1].base_price_money.amount, 795);
        assert_eq!(lines[2].name, "Tax");
        assert_eq!(lines[2].base_price_money.amount, 792);

        let line_sum: i64 = lines
            .iter()
            .map(|l| l.base_price_money.amount * l.quantity.parse::<i64>().unwrap())
            .sum();
        assert_eq!(line_sum, 11_187);

        assert_eq!(request.idempotency_key, order.id.to_string());
        assert_eq!(
            request.checkout_options.redirect_url,
            format!("https://riptideswim.com/checkout/complete?order_id={}", order.id)
        );
        assert_eq!(
            request.pre_populated_data.unwrap().buyer_email,
            "maya@example.com"
        );
    }

    #[test]
    fn test_payment_link_request_skips_zero_shipping() {
        let order = order(vec![item("120.00", 1)], "0", "0");
        let request =
            payment_link_request(&order, CurrencyCode::Usd, "L1", "http://localhost:3000").unwrap();
        assert_eq!(request.order.line_items.len(), 1);
    }

    #[test]
    fn test_verify_paid() {
        let order = order(vec![item("48.00", 1)], "7.95", "0");
        assert!(verify_paid(&order, &square_order("OPEN", 5595, 0, true)).is_ok());
        assert!(verify_paid(&order, &square_order("COMPLETED", 5595, 0, false)).is_ok());
    }

    #[test]
    fn test_verify_paid_rejects_unpaid_and_mismatch() {
        let order = order(vec![item("48.00", 1)], "7.95", "0");
        assert!(matches!(
            verify_paid(&order, &square_order("OPEN", 5595, 5595, false)),
            Err(CheckoutError::PaymentNotCompleted)
        ));
        assert!(matches!(
            verify_paid(&order, &square_order("COMPLETED", 100, 0, true)),
            Err(CheckoutError::AmountMismatch {
                expected: 5595,
                actual: 100
            })
        ));
    }

    #[test]
    fn test_unknown_square_state_is_unpaid() {
        let order = order(vec![item("10.00", 1)], "0", "0");
        let mut sq = square_order("OPEN", 1000, 1000, false);
        sq.state = SquareOrderState::Unknown;
        assert!(matches!(
            verify_paid(&order, &sq),
            Err(CheckoutError::PaymentNotCompleted)
        ));
    }

    #[test]
    fn test_customer_validation() {
        let mut customer = CheckoutCustomer {
            name: "  ".to_string(),
            email: Email::parse("maya@example.com").unwrap(),
            shipping_address: address(),
        };
        assert!(matches!(
            customer.validate(),
            Err(CheckoutError::InvalidCustomer(_))
        ));

        customer.name = "Maya".to_string();
        assert!(customer.validate().is_ok());

        customer.shipping_address.postal_code = String::new();
        assert!(customer.validate().is_err());
    }

    #[test]
    fn test_build_order_items_rejects_unpriced_product() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 1).unwrap();

        let free = product(1, "0.00", &[("M", 5)]);
        let err = build_order_items(&cart, &[free]).unwrap_err();
        assert!(matches!(err, CheckoutError::UnpricedProduct(ref title) if title == "Suit 1"));
        assert!(err.is_client_error());
    }

    // In-memory checkout backend

    #[derive(Default)]
    struct FakeState {
        products: Vec<Product>,
        orders: HashMap<OrderId, Order>,
        /// Normalized email to (total spent, order count).
        purchases: HashMap<String, (Decimal, u32)>,
    }

    #[derive(Clone, Default)]
    struct FakeStore(Arc<Mutex<FakeState>>);

    impl FakeStore {
        fn with_products(products: Vec<Product>) -> Self {
            let store = Self::default();
            store.0.lock().unwrap().products = products;
            store
        }

        fn insert(&self, order: Order) -> OrderId {
            let id = order.id;
            self.0.lock().unwrap().orders.insert(id, order);
            id
        }

        fn status(&self, id: OrderId) -> OrderStatus {
            self.0.lock().unwrap().orders[&id].status
        }

        fn stock(&self, product_id: i32, s: &str) -> u32 {
            let state = self.0.lock().unwrap();
            state
                .products
                .iter()
                .find(|p| p.id == ProductId::new(product_id))
                .unwrap()
                .size_inventory
                .available(&size(s))
        }

        fn purchases(&self, email: &str) -> Option<(Decimal, u32)> {
            self.0.lock().unwrap().purchases.get(email).copied()
        }

        fn all_orders(&self) -> Vec<Order> {
            self.0.lock().unwrap().orders.values().cloned().collect()
        }

        fn settle_now(&self, id: OrderId) -> Option<Vec<Shortfall>> {
            let mut state = self.0.lock().unwrap();
            let order = state.orders.get_mut(&id)?;
            if order.status != OrderStatus::Pending {
                return None;
            }
            order.status = OrderStatus::Processing;
            order.paid_at = Some(Utc::now());
            let order = order.clone();

            let shortfalls = order
                .items
                .iter()
                .map(|item| {
                    state
                        .products
                        .iter_mut()
                        .find(|p| p.id == item.product_id)
                        .map_or(Shortfall(item.quantity), |p| {
                            p.size_inventory.decrement(&item.size, item.quantity)
                        })
                })
                .collect();

            let entry = state
                .purchases
                .entry(order.customer_email.normalized())
                .or_insert((Decimal::ZERO, 0));
            entry.0 += order.total;
            entry.1 += 1;
            Some(shortfalls)
        }
    }

    impl CheckoutStore for FakeStore {
        async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
            let state = self.0.lock().unwrap();
            Ok(state
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }

        async fn settings(&self) -> Result<StoreSettings, RepositoryError> {
            Ok(StoreSettings {
                store_name: "Riptide Swim".to_string(),
                contact_email: "hello@riptideswim.com".to_string(),
                currency: "USD".to_string(),
                flat_shipping_rate: dec("7.95"),
                free_shipping_threshold: None,
                tax_rate: Decimal::ZERO,
                low_stock_threshold: 3,
                announcement: None,
                updated_at: Utc::now(),
            })
        }

        async fn create_pending(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
            let order = Order {
                id: new.id,
                customer_name: new.customer_name.clone(),
                customer_email: new.customer_email.clone(),
                items: new.items.clone(),
                subtotal: new.totals.subtotal,
                shipping: new.totals.shipping,
                tax: new.totals.tax,
                total: new.totals.total,
                currency: new.currency.clone(),
                status: OrderStatus::Pending,
                tracking_number: None,
                shipping_address: new.shipping_address.clone(),
                payment_link_id: None,
                provider_order_id: None,
                payment_url: None,
                paid_at: None,
                shipped_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.insert(order.clone());
            Ok(order)
        }

        async fn attach_payment_link(
            &self,
            id: OrderId,
            link: &PaymentLink,
        ) -> Result<(), RepositoryError> {
            let mut state = self.0.lock().unwrap();
            let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            order.payment_link_id = Some(link.id.clone());
            order.provider_order_id = Some(link.order_id.clone());
            order.payment_url = Some(link.url.clone());
            Ok(())
        }

        async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
            Ok(self.0.lock().unwrap().orders.get(&id).cloned())
        }

        async fn stale_pending(
            &self,
            cutoff: DateTime<Utc>,
            limit: i64,
        ) -> Result<Vec<Order>, RepositoryError> {
            let state = self.0.lock().unwrap();
            let mut stale: Vec<Order> = state
                .orders
                .values()
                .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
                .cloned()
                .collect();
            stale.sort_by_key(|o| o.created_at);
            stale.truncate(usize::try_from(limit).unwrap());
            Ok(stale)
        }

        async fn settle(&self, order: &Order) -> Result<Option<Vec<Shortfall>>, RepositoryError> {
            Ok(self.settle_now(order.id))
        }

        async fn cancel_if_pending(&self, id: OrderId) -> Result<bool, RepositoryError> {
            let mut state = self.0.lock().unwrap();
            match state.orders.get_mut(&id) {
                Some(order) if order.status == OrderStatus::Pending => {
                    order.status = OrderStatus::Cancelled;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    /// Square stand-in. Unknown order IDs fail the lookup.
    struct FakeSquare {
        store: FakeStore,
        orders: HashMap<String, SquareOrder>,
        /// Orders another worker settles while this lookup is in flight.
        settled_during_lookup: HashSet<String>,
        link_fails: bool,
    }

    impl FakeSquare {
        fn new(store: &FakeStore) -> Self {
            Self {
                store: store.clone(),
                orders: HashMap::new(),
                settled_during_lookup: HashSet::new(),
                link_fails: false,
            }
        }

        fn with_order(mut self, id: &str, order: SquareOrder) -> Self {
            self.orders.insert(id.to_string(), order);
            self
        }

        fn settled_during_lookup(mut self, id: &str) -> Self {
            self.settled_during_lookup.insert(id.to_string());
            self
        }
    }

    impl PaymentProvider for FakeSquare {
        fn location_id(&self) -> &str {
            "L1"
        }

        async fn create_payment_link(
            &self,
            _request: &CreatePaymentLinkRequest,
        ) -> Result<PaymentLink, SquareError> {
            if self.link_fails {
                return Err(SquareError::Timeout);
            }
            Ok(PaymentLink {
                id: "link-1".to_string(),
                order_id: "sq-new".to_string(),
                url: "https://square.link/u/riptide".to_string(),
                long_url: None,
            })
        }

        async fn retrieve_order(&self, order_id: &str) -> Result<SquareOrder, SquareError> {
            if self.settled_during_lookup.contains(order_id) {
                let raced = self
                    .store
                    .all_orders()
                    .into_iter()
                    .find(|o| o.provider_order_id.as_deref() == Some(order_id));
                if let Some(raced) = raced {
                    self.store.settle_now(raced.id);
                }
            }
            self.orders.get(order_id).cloned().ok_or(SquareError::Timeout)
        }
    }

    /// $48.00 suit, size M, plus $7.95 shipping.
    const ORDER_CENTS: i64 = 5595;

    fn paid() -> SquareOrder {
        square_order("COMPLETED", ORDER_CENTS, 0, true)
    }

    fn unpaid() -> SquareOrder {
        square_order("OPEN", ORDER_CENTS, ORDER_CENTS, false)
    }

    fn stored_order(provider_order_id: Option<&str>, age: Duration) -> Order {
        let mut order = order(vec![item("48.00", 1)], "7.95", "0");
        order.provider_order_id = provider_order_id.map(str::to_string);
        order.created_at = Utc::now() - age;
        order
    }

    fn suit_store() -> FakeStore {
        FakeStore::with_products(vec![product(1, "48.00", &[("M", 10)])])
    }

    fn customer() -> CheckoutCustomer {
        CheckoutCustomer {
            name: "Maya Lin".to_string(),
            email: Email::parse("maya@example.com").unwrap(),
            shipping_address: address(),
        }
    }

    #[tokio::test]
    async fn test_confirm_payment_is_idempotent() {
        let store = suit_store();
        let id = store.insert(stored_order(Some("sq-paid"), Duration::minutes(5)));
        let square = FakeSquare::new(&store).with_order("sq-paid", paid());
        let service = CheckoutService::with_backend(store.clone(), &square);

        let first = service.confirm_payment(id).await.unwrap();
        assert!(first.newly_processed);
        assert_eq!(first.status, OrderStatus::Processing);

        let second = service.confirm_payment(id).await.unwrap();
        assert!(!second.newly_processed);
        assert_eq!(second.status, OrderStatus::Processing);

        assert_eq!(store.stock(1, "M"), 9);
        assert_eq!(store.purchases("maya@example.com"), Some((dec("55.95"), 1)));
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_settle_once() {
        let store = suit_store();
        let id = store.insert(stored_order(Some("sq-paid"), Duration::minutes(5)));
        let square = FakeSquare::new(&store).with_order("sq-paid", paid());
        let service = CheckoutService::with_backend(store.clone(), &square);

        let (a, b) = tokio::join!(service.confirm_payment(id), service.confirm_payment(id));
        let winners = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|c| c.newly_processed)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.stock(1, "M"), 9);
        assert_eq!(store.purchases("maya@example.com"), Some((dec("55.95"), 1)));
    }

    #[tokio::test]
    async fn test_confirm_after_settled_during_lookup() {
        let store = suit_store();
        let id = store.insert(stored_order(Some("sq-paid"), Duration::minutes(5)));
        let square = FakeSquare::new(&store)
            .with_order("sq-paid", paid())
            .settled_during_lookup("sq-paid");
        let service = CheckoutService::with_backend(store.clone(), &square);

        let confirmation = service.confirm_payment(id).await.unwrap();
        assert!(!confirmation.newly_processed);
        assert_eq!(confirmation.status, OrderStatus::Processing);
        assert_eq!(store.stock(1, "M"), 9);
        assert_eq!(store.purchases("maya@example.com").map(|p| p.1), Some(1));
    }

    #[tokio::test]
    async fn test_confirm_unpaid_leaves_order_pending() {
        let store = suit_store();
        let id = store.insert(stored_order(Some("sq-open"), Duration::minutes(5)));
        let square = FakeSquare::new(&store).with_order("sq-open", unpaid());
        let service = CheckoutService::with_backend(store.clone(), &square);

        assert!(matches!(
            service.confirm_payment(id).await,
            Err(CheckoutError::PaymentNotCompleted)
        ));
        assert_eq!(store.status(id), OrderStatus::Pending);
        assert_eq!(store.stock(1, "M"), 10);
    }

    #[tokio::test]
    async fn test_reconcile_classifies_each_order() {
        let store = suit_store();
        let old = Duration::hours(30);
        let confirmed = store.insert(stored_order(Some("sq-paid"), old));
        let abandoned = store.insert(stored_order(Some("sq-open"), old));
        let recent = store.insert(stored_order(Some("sq-open-recent"), Duration::hours(2)));
        let unreachable = store.insert(stored_order(Some("sq-down"), old));
        let no_link = store.insert(stored_order(None, old));
        let raced_unpaid = store.insert(stored_order(Some("sq-raced-open"), old));
        let raced_paid = store.insert(stored_order(Some("sq-raced-paid"), old));
        let fresh = store.insert(stored_order(Some("sq-fresh"), Duration::minutes(1)));

        let square = FakeSquare::new(&store)
            .with_order("sq-paid", paid())
            .with_order("sq-open", unpaid())
            .with_order("sq-open-recent", unpaid())
            .with_order("sq-raced-open", unpaid())
            .with_order("sq-raced-paid", paid())
            .settled_during_lookup("sq-raced-open")
            .settled_during_lookup("sq-raced-paid");
        let service = CheckoutService::with_backend(store.clone(), &square);

        let now = Utc::now();
        let report = service
            .reconcile(now - Duration::minutes(15), now - Duration::hours(24), 50)
            .await
            .unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                checked: 7,
                confirmed: 1,
                cancelled: 2,
                still_pending: 1,
                settled_elsewhere: 2,
                failed: 1,
            }
        );

        assert_eq!(store.status(confirmed), OrderStatus::Processing);
        assert_eq!(store.status(abandoned), OrderStatus::Cancelled);
        assert_eq!(store.status(no_link), OrderStatus::Cancelled);
        assert_eq!(store.status(recent), OrderStatus::Pending);
        assert_eq!(store.status(unreachable), OrderStatus::Pending);
        assert_eq!(store.status(fresh), OrderStatus::Pending);
        // Paid elsewhere while Square reported it open: must not be cancelled.
        assert_eq!(store.status(raced_unpaid), OrderStatus::Processing);
        assert_eq!(store.status(raced_paid), OrderStatus::Processing);

        assert_eq!(store.stock(1, "M"), 7);
        assert_eq!(store.purchases("maya@example.com").map(|p| p.1), Some(3));
    }

    #[tokio::test]
    async fn test_start_checkout_attaches_payment_link() {
        let store = suit_store();
        let square = FakeSquare::new(&store);
        let service = CheckoutService::with_backend(store.clone(), &square);

        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 2).unwrap();
        let started = service
            .start_checkout(&cart, &customer(), "https://riptideswim.com")
            .await
            .unwrap();

        assert_eq!(started.payment_url, "https://square.link/u/riptide");
        assert_eq!(started.totals.subtotal, dec("96.00"));

        let order = store.all_orders().pop().unwrap();
        assert_eq!(order.id, started.order_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, started.totals.total);
        assert_eq!(order.provider_order_id.as_deref(), Some("sq-new"));
        assert_eq!(order.payment_link_id.as_deref(), Some("link-1"));
        // Stock is only taken on payment.
        assert_eq!(store.stock(1, "M"), 10);
    }

    #[tokio::test]
    async fn test_start_checkout_cancels_order_when_link_fails() {
        let store = suit_store();
        let mut square = FakeSquare::new(&store);
        square.link_fails = true;
        let service = CheckoutService::with_backend(store.clone(), &square);

        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 1).unwrap();
        let result = service
            .start_checkout(&cart, &customer(), "https://riptideswim.com")
            .await;

        assert!(matches!(result, Err(CheckoutError::Square(SquareError::Timeout))));
        let orders = store.all_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_start_checkout_rejects_unpriced_product() {
        let store = FakeStore::with_products(vec![product(1, "0", &[("M", 10)])]);
        let square = FakeSquare::new(&store);
        let service = CheckoutService::with_backend(store.clone(), &square);

        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), size("M"), 1).unwrap();
        let result = service
            .start_checkout(&cart, &customer(), "https://riptideswim.com")
            .await;

        assert!(matches!(result, Err(CheckoutError::UnpricedProduct(_))));
        assert!(store.all_orders().is_empty());
    }
}
