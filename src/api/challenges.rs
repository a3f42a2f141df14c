use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser, OptionalUser};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::challenge::{
    ChallengeCreate, ChallengeInfoResponse, ChallengeResponse, ChallengeUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_challenges).post(create_challenge))
        .route(
            "/:id",
            get(get_challenge).patch(update_challenge).delete(delete_challenge),
        )
        .route("/:id/info", get(challenge_info))
        .route("/all", get(list_all_challenges))
}

async fn list_challenges(
    State(state): State<AppState>,
    CurrentUser(_profile): CurrentUser,
) -> Result<Json<Vec<ChallengeResponse>>, ApiError> {
    let challenges = repositories::challenges::list_active(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list challenges"))?;

    Ok(Json(challenges.into_iter().map(ChallengeResponse::from_db).collect()))
}

async fn list_all_challenges(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<ChallengeResponse>>, ApiError> {
    let challenges = repositories::challenges::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list challenges"))?;

    Ok(Json(challenges.into_iter().map(ChallengeResponse::from_db).collect()))
}

async fn get_challenge(
    State(state): State<AppState>,
    CurrentUser(_profile): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = repositories::challenges::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    Ok(Json(ChallengeResponse::from_db(challenge)))
}

/// Recorder extension handshake: decides whether this run records the admin
/// reference or a student submission. Works unauthenticated (the extension
/// probes before login), but only admins get reference mode.
async fn challenge_info(
    State(state): State<AppState>,
    OptionalUser(profile): OptionalUser,
    Path(id): Path<String>,
) -> Result<Json<ChallengeInfoResponse>, ApiError> {
    let challenge = repositories::challenges::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load challenge"))?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    let is_admin = profile.map(|p| p.is_admin).unwrap_or(false);
    let has_reference = challenge.reference_actions_json.is_some();
    let record_reference = is_admin && challenge.ai_correction_enabled && !has_reference;

    let (upload_mode, upload_endpoint) = if record_reference {
        ("reference", "/api/v1/uploads/reference")
    } else {
        ("submission", "/api/v1/uploads")
    };

    Ok(Json(ChallengeInfoResponse {
        challenge_id: challenge.id,
        title: challenge.title,
        ai_correction_enabled: challenge.ai_correction_enabled,
        has_reference,
        is_admin,
        upload_mode: upload_mode.to_string(),
        upload_endpoint: upload_endpoint.to_string(),
    }))
}

async fn create_challenge(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<ChallengeCreate>,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    validate_payload(&payload)?;

    let challenge = repositories::challenges::create(
        state.db(),
        repositories::challenges::CreateChallenge {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: &payload.description,
            criteria_design: &payload.criteria_design,
            criteria_functionality: &payload.criteria_functionality,
            criteria_completion: &payload.criteria_completion,
            time_limit: payload.time_limit,
            points_base: payload.points_base,
            difficulty: payload.difficulty,
            ai_correction_enabled: payload.ai_correction_enabled,
            created_by: &admin.id,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create challenge"))?;

    Ok((StatusCode::CREATED, Json(ChallengeResponse::from_db(challenge))))
}

async fn update_challenge(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(payload): Json<ChallengeUpdate>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    validate_payload(&payload)?;

    let challenge = repositories::challenges::update(
        state.db(),
        &id,
        repositories::challenges::UpdateChallenge {
            title: payload.title,
            description: payload.description,
            criteria_design: payload.criteria_design,
            criteria_functionality: payload.criteria_functionality,
            criteria_completion: payload.criteria_completion,
            time_limit: payload.time_limit,
            points_base: payload.points_base,
            difficulty: payload.difficulty,
            is_active: payload.is_active,
            ai_correction_enabled: payload.ai_correction_enabled,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update challenge"))?
    .ok_or_else(|| ApiError::NotFound("Challenge not found".to_string()))?;

    Ok(Json(ChallengeResponse::from_db(challenge)))
}

async fn delete_challenge(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::challenges::delete(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete challenge"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Challenge not found".to_string()))
    }
}
