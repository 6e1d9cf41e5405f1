//! Login, logout, and password routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::{
    error::{Result, clear_sentry_user, set_sentry_user},
    middleware::{RequireAdminAuth, set_current_admin},
    models::CurrentAdmin,
    services::AdminAuthService,
    state::AppState,
};

/// Login request body.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Password change request body.
#[derive(Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
}

/// Check credentials and start an admin session.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<CurrentAdmin>> {
    let user = AdminAuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
        .inspect_err(|_| tracing::warn!("Failed admin login attempt"))?;

    // New session ID on privilege change
    session.cycle_id().await?;
    let admin = CurrentAdmin::from(&user);
    set_current_admin(&session, &admin).await?;
    set_sentry_user(admin.id.as_i32(), Some(admin.email.as_str()));

    Ok(Json(admin))
}

/// End the admin session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    session.flush().await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in admin.
pub async fn me(RequireAdminAuth(admin): RequireAdminAuth) -> Json<CurrentAdmin> {
    Json(admin)
}

/// Change the logged-in admin's own password.
#[instrument(skip_all)]
pub async fn change_password(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<PasswordForm>,
) -> Result<StatusCode> {
    let auth = AdminAuthService::new(state.pool());
    let user = auth.get_user(admin.id).await?;
    auth.change_password(&user, &form.current_password, &form.new_password)
        .await?;

    session.cycle_id().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_debug_hides_password() {
        let form: LoginForm = serde_json::from_str(
            r#"{"email":"ops@riptideswim.com","password":"hunter2hunter2"}"#,
        )
        .unwrap();
        let debug = format!("{form:?}");
        assert!(debug.contains("ops@riptideswim.com"));
        assert!(!debug.contains("hunter2"));
    }
}
