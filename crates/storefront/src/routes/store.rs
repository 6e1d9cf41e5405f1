//! Public store information.

use axum::{Json, extract::State, http::header::CACHE_CONTROL, response::IntoResponse};
use rust_decimal::Decimal;
use serde::Serialize;

use riptide_core::ShippingRules;
use riptide_db::StoreSettings;

use super::products::CATALOG_CACHE_CONTROL;
use crate::error::Result;
use crate::state::AppState;

/// Settings a shopper may see.
#[derive(Debug, Serialize)]
pub struct PublicStore<'a> {
    pub store_name: &'a str,
    pub contact_email: &'a str,
    pub currency: &'a str,
    pub shipping: ShippingRules,
    pub tax_rate: Decimal,
    pub announcement: Option<&'a str>,
    pub assistant_enabled: bool,
}

impl<'a> PublicStore<'a> {
    fn new(settings: &'a StoreSettings, assistant_enabled: bool) -> Self {
        Self {
            store_name: &settings.store_name,
            contact_email: &settings.contact_email,
            currency: &settings.currency,
            shipping: settings.shipping_rules(),
            tax_rate: settings.tax_rate,
            announcement: settings
                .announcement
                .as_deref()
                .filter(|a| !a.trim().is_empty()),
            assistant_enabled,
        }
    }
}

/// Store name, currency, shipping rules, and announcement.
pub async fn show(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let settings = state.catalog().settings().await?;
    let body = Json(PublicStore::new(&settings, state.assistant().is_some())).into_response();
    Ok(([(CACHE_CONTROL, CATALOG_CACHE_CONTROL)], body))
}
