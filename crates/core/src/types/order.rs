//! Order line items, shipping addresses, and totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::round_cents;
use super::size::Size;

/// A purchased line, snapshotted at checkout.
///
/// Title and unit price are copied from the product so later catalog edits
/// don't rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub title: String,
    pub size: Size,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Reasons a shipping address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shipping address field `{0}` is required")]
pub struct AddressError(pub &'static str);

/// Where an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns the first required field that is blank.
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("region", &self.region),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AddressError(field));
            }
        }
        Ok(())
    }
}

/// Shipping pricing taken from store settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRules {
    pub flat_rate: Decimal,
    /// Orders with a subtotal at or above this ship free.
    pub free_shipping_threshold: Option<Decimal>,
}

impl ShippingRules {
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal.is_zero() {
            return Decimal::ZERO;
        }
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_rate,
        }
    }
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Price a set of items. `tax_rate` is a fraction (0.0825 for 8.25%) and
    /// applies to the merchandise subtotal only.
    #[must_use]
    pub fn compute(items: &[OrderItem], shipping: &ShippingRules, tax_rate: Decimal) -> Self {
        let subtotal = round_cents(items.iter().map(OrderItem::line_total).sum());
        let shipping = round_cents(shipping.shipping_for(subtotal));
        let tax = round_cents(subtotal * tax_rate);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}
