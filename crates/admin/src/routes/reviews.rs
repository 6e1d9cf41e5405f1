//! Review moderation routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use riptide_core::ReviewId;
use riptide_db::{Review, ReviewListing, ReviewRepository};

use crate::{
    error::{AppError, Result},
    middleware::{RequireAdminAuth, RequireWriteAccess},
    state::AppState,
};

const MAX_REPLY_LENGTH: usize = 2000;

/// Review list query.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    /// Only reviews without an admin reply.
    #[serde(default)]
    pub unreplied: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Reply request body.
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

fn validate_reply(reply: &str) -> Result<&str> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(AppError::BadRequest("Reply cannot be empty".to_string()));
    }
    if reply.chars().count() > MAX_REPLY_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Reply must be at most {MAX_REPLY_LENGTH} characters"
        )));
    }
    Ok(reply)
}

/// Reviews across all products, newest first.
#[instrument(skip_all)]
pub async fn index(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<ReviewListing>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_all(query.unreplied, query.limit, query.offset)
        .await?;
    Ok(Json(reviews))
}

/// Set or replace the store's public reply.
#[instrument(skip(admin, state, request))]
pub async fn reply(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<Review>> {
    let text = validate_reply(&request.reply)?;
    let review = ReviewRepository::new(state.pool()).reply(id, text).await?;
    tracing::info!(review_id = %id, admin_user_id = %admin.id, "Review replied");
    Ok(Json(review))
}

/// Remove the store's reply.
#[instrument(skip(_admin, state))]
pub async fn clear_reply(
    RequireWriteAccess(_admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>> {
    let review = ReviewRepository::new(state.pool()).clear_reply(id).await?;
    Ok(Json(review))
}

/// Delete a review.
#[instrument(skip(admin, state))]
pub async fn delete(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    ReviewRepository::new(state.pool()).delete(id).await?;
    tracing::info!(review_id = %id, admin_user_id = %admin.id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
