use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::json;
use time::OffsetDateTime;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::types::UploadType;
use crate::schemas::upload::{UploadUrlRequest, UploadUrlResponse};
use crate::services::reconcile;
use crate::services::video::{self, UploadPassthrough, WebhookEvent};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/upload-url", post(upload_url)).route("/webhook", post(webhook))
}

async fn upload_url(
    State(state): State<AppState>,
    CurrentUser(profile): CurrentUser,
    Json(payload): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    let video = state.video().ok_or_else(|| {
        ApiError::ServiceUnavailable("Video uploads are not configured".to_string())
    })?;

    if payload.upload_type == UploadType::Reference && !profile.is_admin {
        return Err(ApiError::Forbidden("Admin access required"));
    }

    let challenge = crate::repositories::challenges::find_by_id(state.db(), &payload.challenge_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    let passthrough = UploadPassthrough {
        user_id: profile.id,
        challenge_id: challenge.id,
        upload_type: payload.upload_type,
        timestamp: OffsetDateTime::now_utc().unix_timestamp(),
    };

    let upload = video
        .create_direct_upload(&passthrough)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create video upload"))?;

    Ok(Json(UploadUrlResponse {
        success: true,
        upload_id: upload.upload_id,
        upload_url: upload.upload_url,
    }))
}

/// Video provider webhook. The signature check reads the raw body, so the
/// payload is taken as a string rather than extracted JSON.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get("mux-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let secret = &state.settings().mux().webhook_secret;
    if !video::verify_webhook_signature(secret, &body, signature) {
        return Err(ApiError::Unauthorized("Invalid webhook signature"));
    }

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    reconcile::process_webhook_event(
        state.db(),
        &state.settings().mux().playback_base_url,
        event,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Webhook processing failed"))?;

    Ok(Json(json!({"received": true})))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;

    use crate::test_support;

    fn signature_header(secret: &str, payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(b"1700000000.");
        mac.update(payload.as_bytes());
        format!("t=1700000000,v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn asset_ready_event(passthrough: &serde_json::Value, upload_id: &str) -> String {
        json!({
            "type": "video.asset.ready",
            "data": {
                "id": "asset-1",
                "upload_id": upload_id,
                "duration": 42.5,
                "playback_ids": [{"id": "playback-1"}],
                "passthrough": passthrough.to_string()
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;

        let response = test_support::webhook_request(
            &ctx.app,
            "/api/v1/video/webhook",
            "{}",
            "t=1,v1=deadbeef",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_fills_video_on_existing_submission() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        // Direct upload lands first.
        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-race",
                "actions": [{"type": "click", "t": 1}],
                "duration": 30000
            }),
        )
        .await;
        let body = test_support::read_json(response).await;
        let submission_id = body["submission"]["id"].as_str().expect("id").to_string();

        // Then the webhook for the same upload id.
        let passthrough = json!({
            "user_id": student.id,
            "challenge_id": challenge.id,
            "upload_type": "submission",
            "timestamp": 1700000000
        });
        let payload = asset_ready_event(&passthrough, "upload-race");
        let header = signature_header(test_support::TEST_WEBHOOK_SECRET, &payload);
        let response =
            test_support::webhook_request(&ctx.app, "/api/v1/video/webhook", &payload, &header)
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(&token),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["mux_playback_id"], "playback-1");
        assert_eq!(body["video_url"], "https://stream.mux.com/playback-1.m3u8");
        // Action-log duration wins over the asset duration.
        assert_eq!(body["duration"], 30000);
    }

    #[tokio::test]
    async fn webhook_creates_submission_when_video_arrives_first() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let student =
            test_support::insert_profile(&ctx, "student", "student@example.com", "password123", false)
                .await;
        let token = test_support::bearer_token(&ctx, &student);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, false).await;

        let passthrough = json!({
            "user_id": student.id,
            "challenge_id": challenge.id,
            "upload_type": "submission",
            "timestamp": 1700000000
        });
        let payload = asset_ready_event(&passthrough, "upload-first");
        let header = signature_header(test_support::TEST_WEBHOOK_SECRET, &payload);
        let response =
            test_support::webhook_request(&ctx.app, "/api/v1/video/webhook", &payload, &header)
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The later direct upload reuses the same row.
        let response = test_support::json_request(
            &ctx.app,
            "POST",
            "/api/v1/uploads",
            Some(&token),
            json!({
                "challenge_id": challenge.id,
                "mux_upload_id": "upload-first",
                "actions": [{"type": "click", "t": 1}]
            }),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["submission"]["mux_playback_id"], "playback-1");
        assert_eq!(body["submission"]["has_actions"], true);
        // Asset duration survives because the upload carried none.
        assert_eq!(body["submission"]["duration"], 42500);

        let submissions =
            test_support::get_request(&ctx.app, "/api/v1/submissions", Some(&token)).await;
        let body = test_support::read_json(submissions).await;
        assert_eq!(body.as_array().expect("array").len(), 1);
    }

    #[tokio::test]
    async fn webhook_replay_leaves_reviewed_submission_untouched() {
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
        let submission =
            test_support::insert_submission(&ctx, &student.id, &challenge.id, "upload-late").await;

        let response = test_support::json_request(
            &ctx.app,
            "POST",
            &format!("/api/v1/submissions/{}/reviews", submission.id),
            Some(&reviewer_token),
            json!({"score_design": 3, "score_functionality": 3, "score_completion": 3}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // A late (or replayed) asset event for the reviewed row is dropped.
        let passthrough = json!({
            "user_id": student.id,
            "challenge_id": challenge.id,
            "upload_type": "submission",
            "timestamp": 1700000000
        });
        let payload = asset_ready_event(&passthrough, "upload-late");
        let header = signature_header(test_support::TEST_WEBHOOK_SECRET, &payload);
        let response =
            test_support::webhook_request(&ctx.app, "/api/v1/video/webhook", &payload, &header)
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/submissions/{}", submission.id),
            Some(&token),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert!(body["mux_playback_id"].is_null());
        assert!(body["video_url"].is_null());
        assert_eq!(body["duration"], 30000);
    }

    #[tokio::test]
    async fn webhook_reference_updates_challenge() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;
        let admin = test_support::insert_profile(&ctx, "admin", "admin@example.com", "password123", true).await;
        let admin_token = test_support::bearer_token(&ctx, &admin);
        let challenge = test_support::insert_challenge(&ctx, &admin.id, true).await;

        let passthrough = json!({
            "user_id": admin.id,
            "challenge_id": challenge.id,
            "upload_type": "reference",
            "timestamp": 1700000000
        });
        let payload = asset_ready_event(&passthrough, "upload-ref");
        let header = signature_header(test_support::TEST_WEBHOOK_SECRET, &payload);
        let response =
            test_support::webhook_request(&ctx.app, "/api/v1/video/webhook", &payload, &header)
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_support::get_request(
            &ctx.app,
            &format!("/api/v1/challenges/{}", challenge.id),
            Some(&admin_token),
        )
        .await;
        let body = test_support::read_json(response).await;
        assert_eq!(body["reference_video_playback_id"], "playback-1");
        assert_eq!(body["reference_video_duration"], 42500);
    }

    #[tokio::test]
    async fn webhook_ignores_unknown_event_types() {
        let _guard = test_support::env_lock();
        let ctx = test_support::setup_test_context().await;

        let payload = json!({"type": "video.asset.deleted", "data": {}}).to_string();
        let header = signature_header(test_support::TEST_WEBHOOK_SECRET, &payload);
        let response =
            test_support::webhook_request(&ctx.app, "/api/v1/video/webhook", &payload, &header)
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["received"], true);
    }
}
