//! Garment sizes and per-size stock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors parsing a [`Size`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("size cannot be empty")]
    Empty,
    #[error("size must be at most {max} characters")]
    TooLong { max: usize },
}

/// A size label such as `XS`, `M`, or `32D`.
///
/// Labels are trimmed and uppercased so `m` and ` M ` refer to the same stock.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Size(String);

impl Size {
    pub const MAX_LENGTH: usize = 16;

    /// # Errors
    ///
    /// Returns an error if the trimmed label is empty or too long.
    pub fn parse(s: &str) -> Result<Self, SizeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SizeError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(SizeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Size {
    type Error = SizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Size> for String {
    fn from(size: Size) -> Self {
        size.0
    }
}

/// Units that could not be taken from stock.
///
/// Returned by [`SizeInventory::decrement`]. Zero means the full quantity was
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shortfall(pub u32);

impl Shortfall {
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Stock on hand per size.
///
/// A size missing from the map is not offered at all; a size mapped to zero
/// is offered but sold out. Counts are unsigned, so stock can never go
/// negative.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeInventory(BTreeMap<Size, u32>);

impl SizeInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total units across all sizes.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().map(|&qty| u64::from(qty)).sum()
    }

    /// Whether the size is offered for this product.
    #[must_use]
    pub fn offers(&self, size: &Size) -> bool {
        self.0.contains_key(size)
    }

    /// Units on hand for a size (zero if not offered).
    #[must_use]
    pub fn available(&self, size: &Size) -> u32 {
        self.0.get(size).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn can_fulfill(&self, size: &Size, quantity: u32) -> bool {
        self.offers(size) && self.available(size) >= quantity
    }

    pub fn set(&mut self, size: Size, quantity: u32) {
        self.0.insert(size, quantity);
    }

    /// Take `quantity` units of `size`, stopping at zero.
    pub fn decrement(&mut self, size: &Size, quantity: u32) -> Shortfall {
        match self.0.get_mut(size) {
            Some(on_hand) => {
                let taken = (*on_hand).min(quantity);
                *on_hand -= taken;
                Shortfall(quantity - taken)
            }
            None => Shortfall(quantity),
        }
    }

    /// Sizes with at least one unit on hand.
    pub fn in_stock(&self) -> impl Iterator<Item = &Size> {
        self.0
            .iter()
            .filter(|(_, qty)| **qty > 0)
            .map(|(size, _)| size)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Size, u32)> {
        self.0.iter().map(|(size, qty)| (size, *qty))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Size, u32)> for SizeInventory {
    fn from_iter<T: IntoIterator<Item = (Size, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    fn stock() -> SizeInventory {
        [(size("S"), 3), (size("M"), 0), (size("L"), 5)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_size_normalizes() {
        assert_eq!(size(" m ").as_str(), "M");
        assert_eq!(size("32d"), size("32D"));
        assert_eq!(Size::parse("  "), Err(SizeError::Empty));
        assert!(Size::parse(&"X".repeat(17)).is_err());
    }

    #[test]
    fn test_total_and_availability() {
        let inv = stock();
        assert_eq!(inv.total(), 8);
        assert_eq!(inv.available(&size("S")), 3);
        assert_eq!(inv.available(&size("XL")), 0);
        assert!(inv.offers(&size("M")));
        assert!(!inv.offers(&size("XL")));
    }

    #[test]
    fn test_can_fulfill() {
        let inv = stock();
        assert!(inv.can_fulfill(&size("S"), 3));
        assert!(!inv.can_fulfill(&size("S"), 4));
        assert!(!inv.can_fulfill(&size("M"), 1));
        assert!(!inv.can_fulfill(&size("XL"), 1));
    }

    #[test]
    fn test_decrement_within_stock() {
        let mut inv = stock();
        assert!(inv.decrement(&size("L"), 2).is_none());
        assert_eq!(inv.available(&size("L")), 3);
        assert_eq!(inv.total(), 6);
    }

    #[test]
    fn test_decrement_clamps_at_zero() {
        let mut inv = stock();
        assert_eq!(inv.decrement(&size("S"), 5), Shortfall(2));
        assert_eq!(inv.available(&size("S")), 0);
    }

    #[test]
    fn test_decrement_unknown_size() {
        let mut inv = stock();
        assert_eq!(inv.decrement(&size("XXL"), 1), Shortfall(1));
        assert!(!inv.offers(&size("XXL")));
    }

    #[test]
    fn test_in_stock_skips_sold_out() {
        let inv = stock();
        let sizes: Vec<&str> = inv.in_stock().map(Size::as_str).collect();
        assert_eq!(sizes, vec!["L", "S"]);
    }

    #[test]
    fn test_json_shape() {
        let inv: SizeInventory = serde_json::from_str(r#"{"s": 2, "M": 1}"#).unwrap();
        assert_eq!(inv.available(&size("S")), 2);
        assert_eq!(
            serde_json::to_string(&inv).unwrap(),
            r#"{"M":1,"S":2}"#
        );
        assert!(serde_json::from_str::<SizeInventory>(r#"{"S": -1}"#).is_err());
    }
}
