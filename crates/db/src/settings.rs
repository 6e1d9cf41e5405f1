//! Store settings (singleton row).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use riptide_core::{CurrencyCode, Email, ShippingRules};

use super::RepositoryError;

const SETTINGS_COLUMNS: &str = "store_name, contact_email, currency, flat_shipping_rate, \
     free_shipping_threshold, tax_rate, low_stock_threshold, announcement, updated_at";

/// Store-wide configuration edited from the admin.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreSettings {
    pub store_name: String,
    pub contact_email: String,
    pub currency: String,
    pub flat_shipping_rate: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    /// Fraction applied to the merchandise subtotal (0.0825 = 8.25%).
    pub tax_rate: Decimal,
    pub low_stock_threshold: i32,
    pub announcement: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoreSettings {
    #[must_use]
    pub const fn shipping_rules(&self) -> ShippingRules {
        ShippingRules {
            flat_rate: self.flat_shipping_rate,
            free_shipping_threshold: self.free_shipping_threshold,
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` for an unknown currency code.
    pub fn currency_code(&self) -> Result<CurrencyCode, RepositoryError> {
        self.currency
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("store currency: {e}")))
    }
}

/// Replacement values for [`StoreSettings`].
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsInput {
    pub store_name: String,
    pub contact_email: String,
    pub currency: CurrencyCode,
    pub flat_shipping_rate: Decimal,
    #[serde(default)]
    pub free_shipping_threshold: Option<Decimal>,
    pub tax_rate: Decimal,
    pub low_stock_threshold: i32,
    #[serde(default)]
    pub announcement: Option<String>,
}

impl SettingsInput {
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.store_name.trim().is_empty() {
            return Err("store_name is required".to_string());
        }
        Email::parse(&self.contact_email).map_err(|e| format!("contact_email: {e}"))?;
        if self.flat_shipping_rate.is_sign_negative() {
            return Err("flat_shipping_rate cannot be negative".to_string());
        }
        if self.free_shipping_threshold.is_some_and(|t| t.is_sign_negative()) {
            return Err("free_shipping_threshold cannot be negative".to_string());
        }
        if self.tax_rate.is_sign_negative() || self.tax_rate > Decimal::ONE {
            return Err("tax_rate must be between 0 and 1".to_string());
        }
        if self.tax_rate.scale() > 5 {
            return Err("tax_rate supports at most 5 decimal places".to_string());
        }
        if self.low_stock_threshold < 0 {
            return Err("low_stock_threshold cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Repository for the settings row.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the settings row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the seeded row is missing.
    pub async fn get(&self) -> Result<StoreSettings, RepositoryError> {
        sqlx::query_as::<_, StoreSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM shop.store_settings WHERE id"
        ))
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("store_settings row missing".to_string()))
    }

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, input: &SettingsInput) -> Result<StoreSettings, RepositoryError> {
        let settings = sqlx::query_as::<_, StoreSettings>(&format!(
            r"
            INSERT INTO shop.store_settings
                (id, store_name, contact_email, currency, flat_shipping_rate,
                 free_shipping_threshold, tax_rate, low_stock_threshold, announcement)
            VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET store_name = EXCLUDED.store_name,
                contact_email = EXCLUDED.contact_email,
                currency = EXCLUDED.currency,
                flat_shipping_rate = EXCLUDED.flat_shipping_rate,
                free_shipping_threshold = EXCLUDED.free_shipping_threshold,
                tax_rate = EXCLUDED.tax_rate,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                announcement = EXCLUDED.announcement,
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "
        ))
        .bind(input.store_name.trim())
        .bind(input.contact_email.trim())
        .bind(input.currency.code())
        .bind(input.flat_shipping_rate)
        .bind(input.free_shipping_threshold)
        .bind(input.tax_rate)
        .bind(input.low_stock_threshold)
        .bind(
            input
                .announcement
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty()),
        )
        .fetch_one(self.pool)
        .await?;

        tracing::info!("Store settings updated");
        Ok(settings)
    }
}
