use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::db::types::{ReviewJobStatus, SubmissionStatus};
use crate::repositories;
use crate::schemas::review::{ReviewCreate, ReviewResponse};
use crate::schemas::submission::{SubmissionResponse, ValidateResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_own))
        .route("/all", get(list_all))
        .route("/reviewable", get(list_reviewable))
        .route("/:id", get(get_submission).delete(delete_submission))
        .route("/:id/validate", post(validate_submission))
        .route("/:id/reviews", post(create_review).get(get_review))
}

/// The caller's submissions, joined with the challenge title and the review
/// when one exists.
async fn list_own(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions = repositories::submissions::list_by_user(state.db(), &profile.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    let ids: Vec<String> = submissions.iter().map(|s| s.id.clone()).collect();
    let challenge_ids: Vec<String> = submissions.iter().map(|s| s.challenge_id.clone()).collect();

    let mut titles = repositories::challenges::titles_by_ids(state.db(), &challenge_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge titles"))?;
    let mut reviews = repositories::reviews::list_by_submission_ids(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load reviews"))?;

    let responses = submissions
        .into_iter()
        .map(|submission| {
            let title = titles.remove(&submission.challenge_id);
            let review = reviews.remove(&submission.id);
            let mut response = SubmissionResponse::from_db(submission);
            response.challenge_title = title;
            response.review = review.map(ReviewResponse::from_db);
            response
        })
        .collect();

    Ok(Json(responses))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_all(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let submissions = repositories::submissions::list_all(state.db(), limit, offset)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

/// Peer-review queue: pending submissions by other students without a review.
async fn list_reviewable(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions = repositories::submissions::list_reviewable(state.db(), &profile.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list reviewable submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

async fn get_submission(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = load_visible(&state, &profile, &id).await?;
    Ok(Json(SubmissionResponse::from_db(submission)))
}

async fn delete_submission(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.user_id != profile.id {
        return Err(ApiError::Forbidden("Not the owner of this submission"));
    }

    if submission.status != SubmissionStatus::Pending {
        return Err(ApiError::Conflict("Only pending submissions can be deleted".to_string()));
    }

    let deleted = repositories::submissions::delete_pending(state.db(), &id, &profile.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete submission"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        // Reviewed between the check and the delete.
        Err(ApiError::Conflict("Only pending submissions can be deleted".to_string()))
    }
}

/// Owner confirms the run; queues the AI review when the challenge supports
/// it. The submission stays pending until a review lands.
async fn validate_submission(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.user_id != profile.id {
        return Err(ApiError::Forbidden("Not the owner of this submission"));
    }

    if submission.status != SubmissionStatus::Pending {
        return Err(ApiError::Conflict("Submission has already been reviewed".to_string()));
    }

    if submission.validated_at.is_some()
        || matches!(
            submission.review_job_status,
            ReviewJobStatus::Queued | ReviewJobStatus::Processing
        )
    {
        return Err(ApiError::Conflict("Submission has already been validated".to_string()));
    }

    let challenge = repositories::challenges::find_by_id(state.db(), &submission.challenge_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    // Validation is one-shot whether or not an AI job follows; the stamp is
    // the arbiter under concurrent requests.
    let marked = repositories::submissions::mark_validated(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to mark submission validated"))?;
    if !marked {
        return Err(ApiError::Conflict("Submission has already been validated".to_string()));
    }

    let eligible = challenge.ai_correction_enabled
        && challenge.reference_actions_json.is_some()
        && submission.actions_json.is_some();

    let queued = if eligible {
        repositories::submissions::queue_review_job(state.db(), &submission.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to queue review job"))?
    } else {
        false
    };

    Ok(Json(ValidateResponse { success: true, review_queued: queued }))
}

/// Peer review. One review per submission, enforced by the database; the
/// winner flips the submission to reviewed.
async fn create_review(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ReviewCreate>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    validate_payload(&payload)?;

    let submission = repositories::submissions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.user_id == profile.id {
        return Err(ApiError::BadRequest("You cannot review your own submission".to_string()));
    }

    if submission.status != SubmissionStatus::Pending {
        return Err(ApiError::Conflict("Submission has already been reviewed".to_string()));
    }

    let review = repositories::reviews::create(
        state.db(),
        repositories::reviews::CreateReview {
            submission_id: &submission.id,
            reviewer_id: &profile.id,
            score_design: payload.score_design,
            score_functionality: payload.score_functionality,
            score_completion: payload.score_completion,
            comment: payload.comment.as_deref(),
            is_ai_review: false,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create review"))?
    .ok_or_else(|| ApiError::Conflict("Submission has already been reviewed".to_string()))?;

    repositories::submissions::mark_reviewed(state.db(), &submission.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update submission status"))?;

    Ok((StatusCode::CREATED, Json(ReviewResponse::from_db(review))))
}

async fn get_review(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let _submission = load_visible(&state, &profile, &id).await?;

    let review = repositories::reviews::find_by_submission(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load review"))?
        .ok_or_else(|| ApiError::NotFound("No review for this submission".to_string()))?;

    Ok(Json(ReviewResponse::from_db(review)))
}

async fn load_visible(
    state: &AppState,
    profile: &Profile,
    id: &str,
) -> Result<crate::db::models::Submission, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.user_id != profile.id && !profile.is_admin {
        return Err(ApiError::Forbidden("Not the owner of this submission"));
    }

    Ok(submission)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support;

    #[tokio::test]
    async fn owner_sees_and_deletes_pending_submission() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &student.id, &challenge.id, "upload-1").await;

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/submissions/{}", submission.id),
            Some(&token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_support::delete_request(
            &ctx.app,
            &format!("/api/v1/submissions/{}", submission.id),
            Some(&token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response =
            test_support::get_request(&ctx.app, "/api/v1/submissions", Some(&token)).await;
        let body = test_support::read_json(response).await;
        assert!(body.as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn stranger_cannot_see_submission() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let other =
            test_support::insert_profile(&ctx, "other", "other@example.com", "password123", false).await;
        let other_token = test_support::bearer_token(&ctx, &other);
        let admin_token = test_support::bearer_token(&ctx, &admin);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-2").await;
        let path = format!("/api/v1/submissions/{}", submission.id);

        let response = test_support::get_request(&ctx.app, &path, Some(&other_token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = test_support::delete_request(&ctx.app, &path, Some(&other_token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Admins can inspect any submission.
        let response = test_support::get_request(&ctx.app, &path, Some(&admin_token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn peer_review_flips_status_and_awards_points() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let reviewer =
            test_support::insert_profile(&ctx, "reviewer", "reviewer@example.com", "password123", false)
                .await;
        let reviewer_token = test_support::bearer_token(&ctx, &reviewer);
        let owner_token = test_support::bearer_token(&ctx, &owner);
        // points_base is 100 in the fixture.
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-3").await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            &format!("/api/v1/submissions/{}/reviews", submission.id),
            Some(&reviewer_token),
            json!({
                "score_design": 4,
                "score_functionality": 5,
                "score_completion": 3,
                "comment": "Bon travail"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = test_support::read_json(response).await;
        assert_eq!(body["is_ai_review"], false);

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/submissions/{}", submission.id),
            Some(&owner_token),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], "reviewed");

        // round(100 * 12 / 15) = 80 points for the owner, review credit for
        // the reviewer.
        let owner_profile = test_support::fetch_profile(&ctx, &owner.id).await;
        assert_eq!(owner_profile.total_points, 80);
        let reviewer_profile = test_support::fetch_profile(&ctx, &reviewer.id).await;
        assert_eq!(reviewer_profile.reviews_count, 1);

        // Once reviewed the submission can no longer be deleted.
        let response = test_support::delete_request(
            &ctx.app,
            &format!("/api/v1/submissions/{}", submission.id),
            Some(&owner_token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn second_review_is_rejected() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let first =
            test_support::insert_profile(&ctx, "first", "first@example.com", "password123", false).await;
        let second =
            test_support::insert_profile(&ctx, "second", "second@example.com", "password123", false)
                .await;
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-4").await;
        let path = format!("/api/v1/submissions/{}/reviews", submission.id);
        let scores = json!({"score_design": 3, "score_functionality": 3, "score_completion": 3});

        let token = test_support::bearer_token(&ctx, &first);
        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&token), scores.clone()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = test_support::bearer_token(&ctx, &second);
        let response = test_support::json_request(&ctx.app, "POST", &path, Some(&token), scores).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn self_review_and_bad_scores_are_rejected() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let owner_token = test_support::bearer_token(&ctx, &owner);
        let reviewer =
            test_support::insert_profile(&ctx, "reviewer", "reviewer@example.com", "password123", false)
                .await;
        let reviewer_token = test_support::bearer_token(&ctx, &reviewer);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-5").await;
        let path = format!("/api/v1/submissions/{}/reviews", submission.id);

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            &path,
            Some(&owner_token),
            json!({"score_design": 5, "score_functionality": 5, "score_completion": 5}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            &path,
            Some(&reviewer_token),
            json!({"score_design": 6, "score_functionality": 0, "score_completion": 0}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reviewable_queue_excludes_own_and_reviewed() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let alice =
            test_support::insert_profile(&ctx, "alice", "alice@example.com", "password123", false).await;
        let bob = test_support::insert_profile(&ctx, "bob", "bob@example.com", "password123", false).await;
        let bob_token = test_support::bearer_token(&ctx, &bob);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        test_support::insert_submission(&ctx, &alice.id, &challenge.id, "upload-a").await;
        test_support::insert_submission(&ctx, &bob.id, &challenge.id, "upload-b").await;

        let response =
            test_support::get_request(&ctx.app, "/api/v1/submissions/reviewable", Some(&bob_token))
                .await;
        let body = test_support::read_json(response).await;
        let entries = body.as_array().expect("array");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["user_id"], serde_json::Value::String(alice.id.clone()));
    }

    #[tokio::test]
    async fn validate_queues_ai_review_for_owner_only() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let owner_token = test_support::bearer_token(&ctx, &owner);
        let other =
            test_support::insert_profile(&ctx, "other", "other@example.com", "password123", false).await;
        let other_token = test_support::bearer_token(&ctx, &other);
        let challenge = test_support::insert_challenge_with_reference(&ctx, &admin.id).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-v").await;
        let path = format!("/api/v1/submissions/{}/validate", submission.id);

        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&other_token), json!({})).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&owner_token), json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["review_queued"], true);

        // Validating twice is a conflict while the job is in flight.
        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&owner_token), json!({})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn validate_is_one_shot_even_without_ai_review() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let owner =
            test_support::insert_profile(&ctx, "owner", "owner@example.com", "password123", false).await;
        let owner_token = test_support::bearer_token(&ctx, &owner);
        // No AI correction: nothing gets queued, but the validation still
        // consumes the submission's single validate.
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;
        let submission =
            test_support::insert_submission(&ctx, &owner.id, &challenge.id, "upload-v2").await;
        let path = format!("/api/v1/submissions/{}/validate", submission.id);

        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&owner_token), json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["review_queued"], false);

        let response =
            test_support::json_request(&ctx.app, "POST", &path, Some(&owner_token), json!({})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
