//! Product review repository.
//!
//! Likes are stored as an array of liker tokens on the review row, so a
//! visitor can like a review at most once and toggling is a single update.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use riptide_core::{ProductId, Rating, ReviewId};

use super::{RepositoryError, page_limit};

const REVIEW_COLUMNS: &str =
    "id, product_id, author_name, rating, comment, likes, admin_reply, replied_at, created_at";

/// A product review.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub author_name: String,
    pub rating: i16,
    pub comment: String,
    /// Liker tokens. Not exposed publicly; see [`Review::like_count`].
    #[serde(skip)]
    pub likes: Vec<String>,
    pub admin_reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    #[must_use]
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    #[must_use]
    pub fn liked_by(&self, liker: &str) -> bool {
        self.likes.iter().any(|l| l == liker)
    }
}

/// A review joined with its product title, for the admin list.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub product_title: String,
    pub like_count: i32,
}

/// A review being submitted.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub author_name: String,
    pub rating: Rating,
    pub comment: String,
}

/// Aggregate rating for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub count: i64,
    /// Mean rating rounded to one decimal place, `None` without reviews.
    pub average: Option<Decimal>,
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            r"
            SELECT {REVIEW_COLUMNS}
            FROM shop.review
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// All reviews for moderation, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        unreplied_only: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ReviewListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewListing>(
            r"
            SELECT r.id, r.product_id, r.author_name, r.rating, r.comment, r.likes,
                   r.admin_reply, r.replied_at, r.created_at,
                   p.title AS product_title,
                   cardinality(r.likes) AS like_count
            FROM shop.review r
            JOIN shop.product p ON p.id = r.product_id
            WHERE NOT $1 OR r.admin_reply IS NULL
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(unreplied_only)
        .bind(page_limit(limit))
        .bind(offset.unwrap_or(0).max(0))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM shop.review WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Store a new review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn create(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r"
            INSERT INTO shop.review (product_id, author_name, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(review.product_id)
        .bind(review.author_name.trim())
        .bind(i16::from(review.rating))
        .bind(review.comment.trim())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        tracing::info!(review_id = %row.id, product_id = %row.product_id, "Review created");
        Ok(row)
    }

    /// Add the liker to a review's likes, or remove them if already present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn toggle_like(&self, id: ReviewId, liker: &str) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r"
            UPDATE shop.review
            SET likes = CASE
                WHEN $2 = ANY(likes) THEN array_remove(likes, $2)
                ELSE array_append(likes, $2)
            END
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .bind(liker)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Set or replace the admin reply.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn reply(&self, id: ReviewId, reply: &str) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r"
            UPDATE shop.review
            SET admin_reply = $2, replied_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .bind(reply.trim())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Remove the admin reply.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn clear_reply(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r"
            UPDATE shop.review
            SET admin_reply = NULL, replied_at = NULL
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count and mean rating for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<ReviewSummary, RepositoryError> {
        let (count, average): (i64, Option<Decimal>) = sqlx::query_as(
            "SELECT COUNT(*), ROUND(AVG(rating), 1) FROM shop.review WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(ReviewSummary { count, average })
    }

    /// Number of reviews still awaiting an admin reply.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_unreplied(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.review WHERE admin_reply IS NULL")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn review() -> Review {
        Review {
            id: ReviewId::new(1),
            product_id: ProductId::new(2),
            author_name: "Kai".to_string(),
            rating: 5,
            comment: "Stays put in big surf.".to_string(),
            likes: vec!["visitor-a".to_string(), "visitor-b".to_string()],
            admin_reply: None,
            replied_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_like_helpers() {
        let r = review();
        assert_eq!(r.like_count(), 2);
        assert!(r.liked_by("visitor-a"));
        assert!(!r.liked_by("visitor-c"));
    }

    #[test]
    fn test_likes_not_serialized() {
        let json = serde_json::to_value(review()).unwrap();
        assert!(json.get("likes").is_none());
        assert_eq!(json["rating"], 5);
    }
}
