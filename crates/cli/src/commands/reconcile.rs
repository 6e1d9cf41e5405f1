//! Pending order reconciliation.
//!
//! Catches payments whose redirect and webhook both went missing. Meant to
//! run on a schedule.

use chrono::{Duration, Utc};

use riptide_storefront::config::SquareConfig;
use riptide_storefront::services::CheckoutService;
use riptide_storefront::square::SquareClient;

use super::{CommandError, connect};

/// Unpaid orders older than this are cancelled.
const ABANDON_AFTER_HOURS: i64 = 24;

/// Re-verify pending orders created at least `older_than_minutes` ago.
///
/// # Errors
///
/// Returns an error if configuration is missing or the pending orders can't
/// be listed. Failures on single orders are counted, not returned.
pub async fn run(older_than_minutes: i64, limit: i64) -> Result<(), CommandError> {
    let pool = connect().await?;

    let base_url = std::env::var("STOREFRONT_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let square = SquareClient::new(&SquareConfig::from_env(base_url.trim_end_matches('/'))?)?;

    let now = Utc::now();
    let older_than = now - Duration::minutes(older_than_minutes.max(0));
    let abandon_before = now - Duration::hours(ABANDON_AFTER_HOURS);

    let report = CheckoutService::new(&pool, &square)
        .reconcile(older_than, abandon_before, limit.clamp(1, 1000))
        .await?;

    tracing::info!("Reconcile complete!");
    tracing::info!("  Checked: {}", report.checked);
    tracing::info!("  Confirmed: {}", report.confirmed);
    tracing::info!("  Cancelled: {}", report.cancelled);
    tracing::info!("  Still pending: {}", report.still_pending);
    tracing::info!("  Settled elsewhere: {}", report.settled_elsewhere);
    tracing::info!("  Failed: {}", report.failed);
    Ok(())
}
