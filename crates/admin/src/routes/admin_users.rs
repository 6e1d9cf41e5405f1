//! Admin account management (super admins only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use riptide_core::{AdminRole, AdminUserId};
use riptide_db::{AdminUser, AdminUserRepository};

use crate::{
    error::Result,
    middleware::RequireSuperAdmin,
    services::AdminAuthService,
    state::AppState,
};

/// New admin request body.
#[derive(Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub password: String,
}

/// Role change request body.
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: AdminRole,
}

/// All admin accounts.
#[instrument(skip_all)]
pub async fn index(
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminUser>>> {
    Ok(Json(AdminUserRepository::new(state.pool()).list().await?))
}

/// Create an admin account.
#[instrument(skip_all)]
pub async fn create(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(request): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AdminUser>)> {
    let user = AdminAuthService::new(state.pool())
        .create_admin(&request.email, &request.name, request.role, &request.password)
        .await?;
    tracing::info!(admin_user_id = %user.id, created_by = %admin.id, "Admin account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Change an admin's role.
#[instrument(skip(admin, state))]
pub async fn update_role(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<AdminUserId>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<AdminUser>> {
    let user = AdminAuthService::new(state.pool())
        .change_role(id, update.role)
        .await?;
    tracing::info!(admin_user_id = %id, changed_by = %admin.id, role = %user.role, "Admin role changed");
    Ok(Json(user))
}

/// Delete another admin's account.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<AdminUserId>,
) -> Result<StatusCode> {
    AdminAuthService::new(state.pool())
        .delete_admin(admin.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_roles() {
        let request: CreateAdminRequest = serde_json::from_str(
            r#"{"email":"a@riptideswim.com","name":"A","role":"viewer","password":"long enough pw"}"#,
        )
        .unwrap();
        assert_eq!(request.role, AdminRole::Viewer);

        assert!(
            serde_json::from_str::<RoleUpdate>(r#"{"role":"owner"}"#).is_err()
        );
    }
}
