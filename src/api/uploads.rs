use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::json;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::submission::SubmissionResponse;
use crate::schemas::upload::{
    DirectUploadRequest, DirectUploadResponse, ReferenceUploadRequest, ReferenceUploadResponse,
};
use crate::services::actions::ActionEnvelope;
use crate::services::reconcile::{self, SubmissionIngest};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(direct_upload)).route("/reference", post(reference_upload))
}

/// Action-log side of the submission race. The video side arrives through
/// the webhook; both converge on the `mux_upload_id` row.
async fn direct_upload(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Json(payload): Json<DirectUploadRequest>,
) -> Result<(StatusCode, Json<DirectUploadResponse>), ApiError> {
    validate_payload(&payload)?;

    let challenge = repositories::challenges::find_by_id(state.db(), &payload.challenge_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    if !challenge.is_active {
        return Err(ApiError::BadRequest("Challenge is not active".to_string()));
    }

    let envelope = ActionEnvelope {
        actions: payload.actions,
        screenshots: payload.screenshots,
        metadata: payload.metadata.unwrap_or_else(|| json!({})),
    };

    let (submission, queued) = reconcile::ingest_submission(
        state.db(),
        &challenge,
        &profile.id,
        SubmissionIngest {
            mux_upload_id: payload.mux_upload_id,
            envelope,
            duration_ms: payload.duration,
            bubble_url: payload.bubble_url,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store submission"))?
    .ok_or_else(|| ApiError::Conflict("Submission has already been reviewed".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(DirectUploadResponse {
            success: true,
            submission: SubmissionResponse::from_db(submission),
            ai_review_queued: queued,
        }),
    ))
}

/// Stores the admin's reference recording on the challenge.
async fn reference_upload(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<ReferenceUploadRequest>,
) -> Result<Json<ReferenceUploadResponse>, ApiError> {
    let challenge = repositories::challenges::find_by_id(state.db(), &payload.challenge_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    if !challenge.ai_correction_enabled {
        return Err(ApiError::BadRequest(
            "AI correction is not enabled for this challenge".to_string(),
        ));
    }

    let actions_count = payload.actions.len();
    let screenshots_count = payload.screenshots.len();

    let reference = json!({
        "actions": payload.actions,
        "screenshots": payload.screenshots,
        "metadata": payload.metadata.unwrap_or_else(|| json!({})),
        "recordedAt": crate::core::time::format_primitive(crate::core::time::primitive_now_utc()),
    });

    repositories::challenges::set_reference_actions(state.db(), &challenge.id, reference)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store reference actions"))?;

    tracing::info!(
        challenge_id = %challenge.id,
        actions = actions_count,
        screenshots = screenshots_count,
        "Reference recording stored"
    );

    Ok(Json(ReferenceUploadResponse { success: true, actions_count, screenshots_count }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support;

    #[tokio::test]
    async fn direct_upload_creates_pending_submission() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-123",
                "actions": [{"type": "click", "t": 1000, "text": "Design"}],
                "duration": 42000,
                "bubble_url": "https://bubble.io/page"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = test_support::read_json(response).await;
        assert_eq!(body["submission"]["status"], "pending");
        assert_eq!(body["submission"]["has_actions"], true);
        // AI disabled on this challenge, so no job.
        assert_eq!(body["ai_review_queued"], false);
        assert_eq!(body["submission"]["review_job_status"], "skipped");
    }

    #[tokio::test]
    async fn direct_upload_requires_correlation_id() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({"challenge_id": challenge.id, "mux_upload_id": "", "actions": []}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn direct_upload_is_idempotent_per_upload_id() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        let payload = json!({
            "challenge_id": challenge.id,
            "mux_upload_id": "upload-dup",
            "actions": [{"type": "click", "t": 1}]
        });

        let first = test_support::json_request(&ctx.app, "POST", "/api/v1/uploads", Some(&token), payload.clone())
            .await;
        let first_body = test_support::read_json(first).await;
        let second = test_support::json_request(&ctx.app, "POST", "/api/v1/uploads", Some(&token), payload)
            .await;
        let second_body = test_support::read_json(second).await;

        assert_eq!(first_body["submission"]["id"], second_body["submission"]["id"]);
    }

    #[tokio::test]
    async fn reposted_upload_cannot_alter_reviewed_submission() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let reviewer =
            test_support::insert_profile(&ctx, "reviewer", "reviewer@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let reviewer_token = test_support::bearer_token(&ctx, &reviewer);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-locked",
                "actions": [{"type": "click", "t": 1}],
                "duration": 30000
            }),
        )
        .await;
        let body = test_support::read_json(response).await;
        let submission_id = body["submission"]["id"].as_str().expect("id").to_string();

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            &format!("/api/v1/submissions/{submission_id}/reviews"),
            Some(&reviewer_token),
            json!({"score_design": 4, "score_functionality": 4, "score_completion": 4}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // Re-posting the upload must not rewrite the log the review scored.
        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-locked",
                "actions": [{"type": "click", "t": 2}, {"type": "input", "t": 3}],
                "duration": 99000
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(&token),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["duration"], 30000);
    }

    #[tokio::test]
    async fn upload_queues_review_when_reference_exists() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let admin_token = test_support::bearer_token(&ctx, &admin);
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, true).await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads/reference",
            Some(&admin_token),
            json!({
                "challenge_id": challenge.id,
                "actions": [{"type": "click", "t": 100, "text": "Design"}]
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-ai",
                "actions": [{"type": "click", "t": 900, "text": "Design"}]
            }),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["ai_review_queued"], true);
        assert_eq!(body["submission"]["review_job_status"], "queued");
    }

    #[tokio::test]
    async fn reference_upload_rejected_for_non_admin() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, true).await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads/reference",
            Some(&token),
            json!({"challenge_id": challenge.id, "actions": []}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
