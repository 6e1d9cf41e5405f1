//! Decimal money amounts.
//!
//! Prices are stored as `NUMERIC(10,2)` and carried as [`Decimal`]. The
//! payment provider wants integer minor units, so conversions live here.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes the store can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Cad,
    Aud,
    Eur,
    Gbp,
}

impl CurrencyCode {
    /// Three-letter code as sent to the payment provider.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors converting between decimal amounts and minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount does not fit in minor units")]
    Overflow,
}

/// An amount in a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (dollars, not cents).
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl Money {
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Build from integer minor units (cents).
    #[must_use]
    pub fn from_minor_units(units: i64, currency: CurrencyCode) -> Self {
        Self::new(Decimal::new(units, 2), currency)
    }

    /// Convert to integer minor units, rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for negative amounts and
    /// `MoneyError::Overflow` if the value does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        (round_cents(self.amount) * Decimal::ONE_HUNDRED)
            .to_i64()
            .ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), round_cents(self.amount))
    }
}

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_minor_units() {
        let m = Money::new(dec("64.99"), CurrencyCode::Usd);
        assert_eq!(m.to_minor_units().unwrap(), 6499);

        let m = Money::new(dec("0.005"), CurrencyCode::Usd);
        assert_eq!(m.to_minor_units().unwrap(), 1);

        let m = Money::zero(CurrencyCode::Usd);
        assert_eq!(m.to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_negative_rejected() {
        let m = Money::new(dec("-1.00"), CurrencyCode::Usd);
        assert_eq!(m.to_minor_units(), Err(MoneyError::Negative));
    }

    #[test]
    fn test_from_minor_units() {
        let m = Money::from_minor_units(12_050, CurrencyCode::Cad);
        assert_eq!(m.amount, dec("120.50"));
        assert_eq!(m.to_string(), "$120.50");
    }

    #[test]
    fn test_display_symbols() {
        assert_eq!(Money::new(dec("5"), CurrencyCode::Eur).to_string(), "€5.00");
        assert_eq!(Money::new(dec("5.1"), CurrencyCode::Gbp).to_string(), "£5.10");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
        assert_eq!(
            serde_json::to_string(&CurrencyCode::Aud).unwrap(),
            "\"AUD\""
        );
    }
}
