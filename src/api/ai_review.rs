use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::review::{
    AiReviewRequest, AiReviewStatusQuery, AiReviewStatusResponse, ReviewResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(trigger_review).get(review_status))
}

/// Admin re-trigger for the automatic review. The job itself runs in the
/// worker process; this only enqueues.
async fn trigger_review(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<AiReviewRequest>,
) -> Result<Json<AiReviewStatusResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &payload.submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    let challenge = repositories::challenges::find_by_id(state.db(), &submission.challenge_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    if !challenge.ai_correction_enabled {
        return Err(ApiError::BadRequest(
            "AI correction is not enabled for this challenge".to_string(),
        ));
    }
    if challenge.reference_actions_json.is_none() {
        return Err(ApiError::BadRequest(
            "Challenge has no reference recording yet".to_string(),
        ));
    }
    if submission.actions_json.is_none() {
        return Err(ApiError::BadRequest("Submission has no action log".to_string()));
    }

    let existing = repositories::reviews::exists_for_submission(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing review"))?;
    if existing {
        return Err(ApiError::Conflict("Submission has already been reviewed".to_string()));
    }

    let queued = repositories::submissions::queue_review_job(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to queue review job"))?;

    if !queued {
        return Err(ApiError::Conflict("A review job is already in flight".to_string()));
    }

    tracing::info!(
        admin_id = %admin.id,
        submission_id = %submission.id,
        "AI review queued"
    );

    status_response(&state, &submission.id).await
}

async fn review_status(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Query(query): Query<AiReviewStatusQuery>,
) -> Result<Json<AiReviewStatusResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &query.submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.user_id != profile.id && !profile.is_admin {
        return Err(ApiError::Forbidden("Not the owner of this submission"));
    }

    status_response(&state, &submission.id).await
}

async fn status_response(
    state: &AppState,
    submission_id: &str,
) -> Result<Json<AiReviewStatusResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    let review = repositories::reviews::find_by_submission(state.db(), submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load review"))?;

    Ok(Json(AiReviewStatusResponse {
        submission_id: submission.id,
        review_job_status: submission.review_job_status,
        review_job_attempts: submission.review_job_attempts,
        review_job_error: submission.review_job_error,
        review: review.map(ReviewResponse::from_db),
    }))
}
