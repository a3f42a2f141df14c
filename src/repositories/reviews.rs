use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::Review;

const COLUMNS: &str = "\
    id, submission_id, reviewer_id, score_design, score_functionality, \
    score_completion, comment, is_ai_review, created_at";

pub(crate) async fn find_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "SELECT {COLUMNS} FROM reviews WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_submission_ids(
    pool: &PgPool,
    submission_ids: &[String],
) -> Result<HashMap<String, Review>, sqlx::Error> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        "SELECT {COLUMNS} FROM reviews WHERE submission_id = ANY($1)"
    ))
    .bind(submission_ids)
    .fetch_all(pool)
    .await?;
    Ok(reviews.into_iter().map(|review| (review.submission_id.clone(), review)).collect())
}

pub(crate) async fn exists_for_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM reviews WHERE submission_id = $1)")
        .bind(submission_id)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateReview<'a> {
    pub submission_id: &'a str,
    pub reviewer_id: &'a str,
    pub score_design: i32,
    pub score_functionality: i32,
    pub score_completion: i32,
    pub comment: Option<&'a str>,
    pub is_ai_review: bool,
}

/// Inserts the review for a submission. The UNIQUE constraint on
/// `submission_id` makes this the single arbiter of "already reviewed":
/// losers of the race get `Ok(None)`.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateReview<'_>,
) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "INSERT INTO reviews (
            id, submission_id, reviewer_id, score_design, score_functionality,
            score_completion, comment, is_ai_review, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        ON CONFLICT (submission_id) DO NOTHING
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.submission_id)
    .bind(params.reviewer_id)
    .bind(params.score_design)
    .bind(params.score_functionality)
    .bind(params.score_completion)
    .bind(params.comment)
    .bind(params.is_ai_review)
    .bind(primitive_now_utc())
    .fetch_optional(pool)
    .await
}
