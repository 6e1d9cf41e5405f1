//! Authentication extractors for admin.
//!
//! The session only says who logged in. Each extractor re-reads the account
//! so a deleted admin is logged out and a role change applies immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn update_product(
//!     RequireWriteAccess(admin): RequireWriteAccess,
//! ) -> impl IntoResponse {
//!     format!("{} may edit", admin.name)
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use riptide_core::AdminRole;
use riptide_db::AdminUserRepository;

use crate::error::set_sentry_user;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Why an authenticated extractor rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// No logged-in admin.
    Unauthorized,
    /// Logged in without the needed role.
    Forbidden(&'static str),
    /// Session or database failure.
    Internal,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Not logged in"),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Extractor that requires a logged-in admin of any role.
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Extractor that requires a role allowed to modify store data.
pub struct RequireWriteAccess(pub CurrentAdmin);

/// Extractor that requires a super admin.
pub struct RequireSuperAdmin(pub CurrentAdmin);

impl FromRequestParts<AppState> for RequireAdminAuth {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_admin(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireWriteAccess {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts, state).await?;
        if !admin.role.can_write() {
            return Err(AdminAuthRejection::Forbidden("Read-only accounts cannot make changes"));
        }
        Ok(Self(admin))
    }
}

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts, state).await?;
        if admin.role != AdminRole::SuperAdmin {
            return Err(AdminAuthRejection::Forbidden(
                "Only super admins can access this resource",
            ));
        }
        Ok(Self(admin))
    }
}

/// Load the session admin and refresh it from the database.
async fn current_admin(
    parts: &Parts,
    state: &AppState,
) -> Result<CurrentAdmin, AdminAuthRejection> {
    // Set by SessionManagerLayer
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::Internal)?;

    let stored: CurrentAdmin = session
        .get(session_keys::CURRENT_ADMIN)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to read admin session");
            AdminAuthRejection::Internal
        })?
        .ok_or(AdminAuthRejection::Unauthorized)?;

    let user = AdminUserRepository::new(state.pool())
        .get(stored.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load admin user");
            AdminAuthRejection::Internal
        })?;

    let Some(user) = user else {
        tracing::info!(admin_user_id = %stored.id, "Session admin no longer exists");
        let _ = clear_current_admin(session).await;
        return Err(AdminAuthRejection::Unauthorized);
    };

    let current = CurrentAdmin::from(&user);
    if current != stored {
        set_current_admin(session, &current).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to refresh admin session");
            AdminAuthRejection::Internal
        })?;
    }

    set_sentry_user(current.id.as_i32(), Some(current.email.as_str()));
    Ok(current)
}

/// Helper to set the current admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}
