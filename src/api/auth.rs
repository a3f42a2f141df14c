use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_payload;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, RefreshRequest, SignupRequest, TokenResponse};
use crate::schemas::user::UserResponse;

/// Max attempts per window for auth endpoints.
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validate_payload(&payload)?;

    let rate_key = format!("rl:signup:{}", payload.email.to_lowercase());
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many signup attempts, try again later"));
    }

    let taken = repositories::profiles::username_or_email_taken(
        state.db(),
        &payload.username,
        &payload.email,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to check existing profile"))?;

    if taken {
        return Err(ApiError::Conflict("Username or email already registered".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let profile = repositories::profiles::create(
        state.db(),
        repositories::profiles::CreateProfile {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            email: &payload.email,
            hashed_password,
            is_admin: false,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create profile"))?;

    let response = token_response(&state, profile)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rate_key = format!("rl:login:{}", payload.email.to_lowercase());
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let profile = repositories::profiles::find_by_email(state.db(), &payload.email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load profile"))?
        .ok_or(ApiError::Unauthorized("Incorrect email or password"))?;

    let verified = security::verify_password(&payload.password, &profile.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect email or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect email or password"));
    }

    if !profile.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    Ok(Json(token_response(&state, profile)?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = security::verify_refresh_token(&payload.refresh_token, state.settings())
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token"))?;

    let profile = repositories::profiles::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load profile"))?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    if !profile.is_active {
        return Err(ApiError::Unauthorized("Invalid refresh token"));
    }

    Ok(Json(token_response(&state, profile)?))
}

async fn me(CurrentUser(profile): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(profile))
}

fn token_response(state: &AppState, profile: Profile) -> Result<TokenResponse, ApiError> {
    let access_token = security::create_access_token(&profile.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;
    let refresh_token = security::create_refresh_token(&profile.id, state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to create refresh token"))?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(profile),
    })
}
