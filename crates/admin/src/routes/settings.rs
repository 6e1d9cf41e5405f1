//! Store settings routes.

use axum::{Json, extract::State};
use tracing::instrument;

use riptide_db::{SettingsInput, SettingsRepository, StoreSettings};

use crate::{
    error::{AppError, Result},
    middleware::{RequireAdminAuth, RequireWriteAccess},
    state::AppState,
};

/// Current settings.
#[instrument(skip_all)]
pub async fn show(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<StoreSettings>> {
    Ok(Json(SettingsRepository::new(state.pool()).get().await?))
}

/// Replace all settings.
#[instrument(skip_all)]
pub async fn update(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Json(input): Json<SettingsInput>,
) -> Result<Json<StoreSettings>> {
    input.validate().map_err(AppError::BadRequest)?;

    let settings = SettingsRepository::new(state.pool()).update(&input).await?;
    tracing::info!(admin_user_id = %admin.id, "Store settings updated");
    Ok(Json(settings))
}
