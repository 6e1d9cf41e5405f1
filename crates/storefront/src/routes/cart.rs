//! Cart route handlers.
//!
//! The cart lives in the server session as product, size, and quantity.
//! Every response re-prices it from the current catalog.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use riptide_core::{OrderItem, OrderTotals, ProductId, Size};
use riptide_db::{Product, ProductRepository, StoreSettings};

use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::models::SessionCart;
use crate::services::CheckoutError;
use crate::state::AppState;

/// A cart line with current product data.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub title: String,
    pub image: Option<String>,
    pub size: Size,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Units of this size currently in stock.
    pub available: u32,
}

/// The priced cart.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub currency: String,
    #[serde(flatten)]
    pub totals: OrderTotals,
}

/// Body for adding an item.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    pub size: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Body for changing a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

/// Body identifying a line.
#[derive(Debug, Deserialize)]
pub struct LineRef {
    pub product_id: ProductId,
    pub size: String,
}

fn parse_size(raw: &str) -> Result<Size> {
    Size::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Price the cart, dropping lines whose product is gone or inactive.
async fn price_cart(state: &AppState, cart: &mut SessionCart) -> Result<CartView> {
    let products = if cart.is_empty() {
        Vec::new()
    } else {
        ProductRepository::new(state.pool())
            .get_many(&cart.product_ids())
            .await?
    };

    let active: Vec<ProductId> = products
        .iter()
        .filter(|p| p.is_purchasable())
        .map(|p| p.id)
        .collect();
    cart.retain_products(&active);

    let settings = state.catalog().settings().await?;
    Ok(cart_view(cart, &products, &settings))
}

fn cart_view(cart: &SessionCart, products: &[Product], settings: &StoreSettings) -> CartView {
    let mut lines = Vec::with_capacity(cart.lines.len());
    let mut items = Vec::with_capacity(cart.lines.len());

    for line in &cart.lines {
        let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
            continue;
        };
        let item = OrderItem {
            product_id: product.id,
            title: product.title.clone(),
            size: line.size.clone(),
            unit_price: product.price,
            quantity: line.quantity,
        };
        lines.push(CartLineView {
            product_id: product.id,
            title: product.title.clone(),
            image: product.images.first().cloned(),
            size: line.size.clone(),
            quantity: line.quantity,
            unit_price: product.price,
            line_total: item.line_total(),
            available: product.size_inventory.available(&line.size),
        });
        items.push(item);
    }

    CartView {
        lines,
        item_count: cart.item_count(),
        currency: settings.currency.clone(),
        totals: OrderTotals::compute(&items, &settings.shipping_rules(), settings.tax_rate),
    }
}

/// Price, persist if pruned, and return the cart.
async fn respond(state: &AppState, shopper: &Shopper, mut cart: SessionCart) -> Result<Json<CartView>> {
    let before = cart.lines.len();
    let view = price_cart(state, &mut cart).await?;
    if cart.lines.len() != before {
        tracing::debug!(dropped = before - cart.lines.len(), "Dropped unavailable cart lines");
    }
    shopper.save_cart(&cart).await?;
    Ok(Json(view))
}

/// Show the priced cart.
pub async fn show(State(state): State<AppState>, shopper: Shopper) -> Result<Json<CartView>> {
    let cart = shopper.cart().await?;
    respond(&state, &shopper, cart).await
}

/// Add units of a product in a size, merging with an existing line.
#[tracing::instrument(skip(state, shopper))]
pub async fn add(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(body): Json<AddItem>,
) -> Result<Json<CartView>> {
    let size = parse_size(&body.size)?;

    let entry = state
        .catalog()
        .product(body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let (product, _) = &*entry;

    if !product.size_inventory.offers(&size) {
        return Err(CheckoutError::SizeUnavailable {
            title: product.title.clone(),
            size,
        }
        .into());
    }

    let mut cart = shopper.cart().await?;
    let quantity = cart.add(product.id, size.clone(), body.quantity)?;

    let available = product.size_inventory.available(&size);
    if quantity > available {
        return Err(CheckoutError::InsufficientStock {
            title: product.title.clone(),
            size,
            available,
        }
        .into());
    }

    respond(&state, &shopper, cart).await
}

/// Set a line's quantity. Zero removes it.
pub async fn update(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(body): Json<UpdateItem>,
) -> Result<Json<CartView>> {
    let size = parse_size(&body.size)?;
    let mut cart = shopper.cart().await?;
    cart.set_quantity(body.product_id, &size, body.quantity)?;
    respond(&state, &shopper, cart).await
}

/// Remove a line.
pub async fn remove(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(body): Json<LineRef>,
) -> Result<Json<CartView>> {
    let size = parse_size(&body.size)?;
    let mut cart = shopper.cart().await?;
    if !cart.remove(body.product_id, &size) {
        return Err(AppError::NotFound("Cart item".to_string()));
    }
    respond(&state, &shopper, cart).await
}

/// Empty the cart.
pub async fn clear(State(state): State<AppState>, shopper: Shopper) -> Result<Json<CartView>> {
    shopper.clear_cart().await?;
    respond(&state, &shopper, SessionCart::default()).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use riptide_core::{ProductStatus, SizeInventory};

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn settings() -> StoreSettings {
        StoreSettings {
            store_name: "Riptide Swim".to_string(),
            contact_email: "hello@riptideswim.com".to_string(),
            currency: "USD".to_string(),
            flat_shipping_rate: dec("7.95"),
            free_shipping_threshold: Some(dec("100")),
            tax_rate: dec("0.0825"),
            low_stock_threshold: 5,
            announcement: None,
            updated_at: Utc::now(),
        }
    }

    fn product(id: i32, price: &str) -> Product {
        let size_inventory: SizeInventory = [(Size::parse("M").unwrap(), 4)].into_iter().collect();
        Product {
            id: ProductId::new(id),
            title: format!("Suit {id}"),
            description: String::new(),
            category: None,
            price: dec(price),
            compare_at_price: None,
            images: vec![format!("https://cdn.riptideswim.com/{id}.jpg")],
            inventory: 4,
            size_inventory,
            status: ProductStatus::Active,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_view_prices_lines() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), Size::parse("M").unwrap(), 2)
            .unwrap();

        let view = cart_view(&cart, &[product(1, "40.00")], &settings());
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].line_total, dec("80.00"));
        assert_eq!(view.lines[0].available, 4);
        assert_eq!(view.totals.subtotal, dec("80.00"));
        assert_eq!(view.totals.shipping, dec("7.95"));
        assert_eq!(view.totals.tax, dec("6.60"));
        assert_eq!(view.item_count, 2);
    }

    #[test]
    fn test_cart_view_free_shipping_over_threshold() {
        let mut cart = SessionCart::default();
        cart.add(ProductId::new(1), Size::parse("M").unwrap(), 1)
            .unwrap();
        let view = cart_view(&cart, &[product(1, "120.00")], &settings());
        assert_eq!(view.totals.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_empty_cart_view() {
        let view = cart_view(&SessionCart::default(), &[], &settings());
        assert!(view.lines.is_empty());
        assert_eq!(view.totals.total, Decimal::ZERO);
    }
}
