//! Product review route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use riptide_core::{ProductId, Rating, ReviewId};
use riptide_db::{NewReview, Review, ReviewRepository};

use crate::error::{AppError, Result};
use crate::middleware::Shopper;
use crate::state::AppState;

const MAX_AUTHOR_CHARS: usize = 80;
const MAX_COMMENT_CHARS: usize = 2000;

/// A review as shown to shoppers.
#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub id: ReviewId,
    pub author_name: String,
    pub rating: i16,
    pub comment: String,
    pub like_count: usize,
    /// Whether the current visitor liked it.
    pub liked: bool,
    pub admin_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewView {
    fn new(review: Review, visitor: &str) -> Self {
        Self {
            like_count: review.like_count(),
            liked: review.liked_by(visitor),
            id: review.id,
            author_name: review.author_name,
            rating: review.rating,
            comment: review.comment,
            admin_reply: review.admin_reply,
            created_at: review.created_at,
        }
    }
}

/// Review form.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub author_name: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

impl ReviewForm {
    fn into_new_review(self, product_id: ProductId) -> Result<NewReview> {
        let author_name = self.author_name.trim().to_string();
        let author_len = author_name.chars().count();
        if author_len == 0 || author_len > MAX_AUTHOR_CHARS {
            return Err(AppError::BadRequest(format!(
                "author_name must be 1 to {MAX_AUTHOR_CHARS} characters"
            )));
        }

        let comment = self.comment.trim().to_string();
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::BadRequest(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }

        let rating =
            Rating::new(self.rating).map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(NewReview {
            product_id,
            author_name,
            rating,
            comment,
        })
    }
}

/// Like toggle result.
#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: usize,
}

/// Reviews for an active product, newest first.
pub async fn index(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<ReviewView>>> {
    if state.catalog().product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let visitor = shopper.visitor_id().await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;

    Ok(Json(
        reviews
            .into_iter()
            .map(|r| ReviewView::new(r, &visitor))
            .collect(),
    ))
}

/// Post a review on an active product.
#[tracing::instrument(skip(state, shopper, form))]
pub async fn create(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(product_id): Path<ProductId>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<ReviewView>)> {
    let review = form.into_new_review(product_id)?;

    if state.catalog().product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let created = ReviewRepository::new(state.pool()).create(&review).await?;
    state.catalog().invalidate_product(product_id).await;
    tracing::info!(review_id = %created.id, rating = created.rating, "Review posted");

    let visitor = shopper.visitor_id().await?;
    Ok((StatusCode::CREATED, Json(ReviewView::new(created, &visitor))))
}

/// Toggle the visitor's like on a review.
pub async fn toggle_like(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<ReviewId>,
) -> Result<Json<LikeResponse>> {
    let visitor = shopper.visitor_id().await?;
    let review = ReviewRepository::new(state.pool())
        .toggle_like(id, &visitor)
        .await?;

    Ok(Json(LikeResponse {
        liked: review.liked_by(&visitor),
        like_count: review.like_count(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(author: &str, rating: i64, comment: &str) -> ReviewForm {
        ReviewForm {
            author_name: author.to_string(),
            rating,
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_valid_review() {
        let review = form("  Jess  ", 5, "Fits true to size.")
            .into_new_review(ProductId::new(2))
            .unwrap();
        assert_eq!(review.author_name, "Jess");
        assert_eq!(review.rating.get(), 5);
    }

    #[test]
    fn test_rejects_bad_reviews() {
        let id = ProductId::new(2);
        assert!(form("", 4, "").into_new_review(id).is_err());
        assert!(form(&"a".repeat(81), 4, "").into_new_review(id).is_err());
        assert!(form("Jess", 0, "").into_new_review(id).is_err());
        assert!(form("Jess", 6, "").into_new_review(id).is_err());
        assert!(form("Jess", 3, &"x".repeat(2001)).into_new_review(id).is_err());
    }
}
