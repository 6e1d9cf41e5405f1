//! Session-stored shopping state.
//!
//! The cart and wishlist live in the server-side session rather than in the
//! browser. Prices are never stored here; they are read from the database
//! whenever the cart is shown or checked out.

use serde::{Deserialize, Serialize};

use riptide_core::{OrderId, ProductId, Size};

/// Session keys.
pub mod keys {
    /// Anonymous visitor token used for review likes.
    pub const VISITOR_ID: &str = "visitor_id";

    /// The shopping cart.
    pub const CART: &str = "cart";

    /// Saved product IDs.
    pub const WISHLIST: &str = "wishlist";

    /// Order created by this session's last checkout.
    pub const PENDING_ORDER: &str = "pending_order";
}

/// Errors from cart edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("quantity must be between 1 and {max}")]
    InvalidQuantity { max: u32 },
    #[error("cart cannot hold more than {max} lines")]
    TooManyLines { max: usize },
    #[error("item is not in the cart")]
    LineNotFound,
}

/// One product in one size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: u32,
}

/// The visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCart {
    pub lines: Vec<CartLine>,
}

impl SessionCart {
    pub const MAX_LINE_QUANTITY: u32 = 10;
    pub const MAX_LINES: usize = 50;

    fn position(&self, product_id: ProductId, size: &Size) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product_id == product_id && &line.size == size)
    }

    /// Add units, merging with an existing line for the same product and size.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the merged quantity leaves 1..=10 or the cart is full.
    pub fn add(&mut self, product_id: ProductId, size: Size, quantity: u32) -> Result<u32, CartError> {
        let max = Self::MAX_LINE_QUANTITY;
        if quantity == 0 || quantity > max {
            return Err(CartError::InvalidQuantity { max });
        }

        if let Some(idx) = self.position(product_id, &size) {
            let line = self
                .lines
                .get_mut(idx)
                .ok_or(CartError::LineNotFound)?;
            let merged = line.quantity.saturating_add(quantity);
            if merged > max {
                return Err(CartError::InvalidQuantity { max });
            }
            line.quantity = merged;
            return Ok(merged);
        }

        if self.lines.len() >= Self::MAX_LINES {
            return Err(CartError::TooManyLines {
                max: Self::MAX_LINES,
            });
        }
        self.lines.push(CartLine {
            product_id,
            size,
            quantity,
        });
        Ok(quantity)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the line is missing or the quantity exceeds 10.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<(), CartError> {
        let idx = self
            .position(product_id, size)
            .ok_or(CartError::LineNotFound)?;

        if quantity == 0 {
            self.lines.remove(idx);
            return Ok(());
        }
        if quantity > Self::MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity {
                max: Self::MAX_LINE_QUANTITY,
            });
        }
        if let Some(line) = self.lines.get_mut(idx) {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: ProductId, size: &Size) -> bool {
        self.position(product_id, size)
            .map(|idx| self.lines.remove(idx))
            .is_some()
    }

    /// Drop every line for products not in `keep`.
    pub fn retain_products(&mut self, keep: &[ProductId]) {
        self.lines.retain(|line| keep.contains(&line.product_id));
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Distinct product IDs in the cart.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|line| line.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Saved products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    pub product_ids: Vec<ProductId>,
}

impl Wishlist {
    pub const MAX_ITEMS: usize = 100;

    /// Add or remove a product. Returns `true` if it is now saved.
    pub fn toggle(&mut self, product_id: ProductId) -> bool {
        if let Some(idx) = self.product_ids.iter().position(|id| *id == product_id) {
            self.product_ids.remove(idx);
            return false;
        }
        if self.product_ids.len() >= Self::MAX_ITEMS {
            self.product_ids.remove(0);
        }
        self.product_ids.push(product_id);
        true
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.product_ids.contains(&product_id)
    }
}

/// Pointer to the order this session is paying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: OrderId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    fn pid(n: i32) -> ProductId {
        ProductId::new(n)
    }

    #[test]
    fn test_add_merges_same_product_and_size() {
        let mut cart = SessionCart::default();
        assert_eq!(cart.add(pid(1), size("M"), 2), Ok(2));
        assert_eq!(cart.add(pid(1), size("m"), 3), Ok(5));
        assert_eq!(cart.add(pid(1), size("L"), 1), Ok(1));
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = SessionCart::default();
        assert_eq!(
            cart.add(pid(1), size("S"), 0),
            Err(CartError::InvalidQuantity { max: 10 })
        );
        assert_eq!(
            cart.add(pid(1), size("S"), 11),
            Err(CartError::InvalidQuantity { max: 10 })
        );
        cart.add(pid(1), size("S"), 8).unwrap();
        assert!(cart.add(pid(1), size("S"), 3).is_err());
        assert_eq!(cart.item_count(), 8);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = SessionCart::default();
        cart.add(pid(2), size("XS"), 2).unwrap();
        cart.set_quantity(pid(2), &size("XS"), 4).unwrap();
        assert_eq!(cart.item_count(), 4);
        cart.set_quantity(pid(2), &size("XS"), 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(
            cart.set_quantity(pid(2), &size("XS"), 1),
            Err(CartError::LineNotFound)
        );
    }

    #[test]
    fn test_remove_and_retain() {
        let mut cart = SessionCart::default();
        cart.add(pid(1), size("M"), 1).unwrap();
        cart.add(pid(2), size("M"), 1).unwrap();
        cart.add(pid(3), size("M"), 1).unwrap();

        assert!(cart.remove(pid(1), &size("M")));
        assert!(!cart.remove(pid(1), &size("M")));

        cart.retain_products(&[pid(3)]);
        assert_eq!(cart.product_ids(), vec![pid(3)]);
    }

    #[test]
    fn test_line_cap() {
        let mut cart = SessionCart::default();
        for n in 0..50 {
            cart.add(pid(n), size("M"), 1).unwrap();
        }
        assert_eq!(
            cart.add(pid(99), size("M"), 1),
            Err(CartError::TooManyLines { max: 50 })
        );
    }

    #[test]
    fn test_wishlist_toggle() {
        let mut list = Wishlist::default();
        assert!(list.toggle(pid(7)));
        assert!(list.contains(pid(7)));
        assert!(!list.toggle(pid(7)));
        assert!(!list.contains(pid(7)));
    }

    #[test]
    fn test_cart_session_json() {
        let mut cart = SessionCart::default();
        cart.add(pid(4), size("l"), 2).unwrap();
        let json = serde_json::to_string(&cart).unwrap();
        assert_eq!(json, r#"{"lines":[{"product_id":4,"size":"L","quantity":2}]}"#);
        let back: SessionCart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }
}
