use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::user::LeaderboardEntryResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(top)).route("/me", get(my_rank))
}

async fn top(
    Query(params): Query<LeaderboardQuery>,
    CurrentUser(_profile): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntryResponse>>, ApiError> {
    let limit = params.limit.clamp(1, 100);
    let entries = repositories::leaderboard::top(state.db(), limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load leaderboard"))?;

    Ok(Json(entries.into_iter().map(LeaderboardEntryResponse::from_db).collect()))
}

async fn my_rank(
    CurrentUser(profile): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<LeaderboardEntryResponse>, ApiError> {
    let entry = repositories::leaderboard::rank_for_user(state.db(), &profile.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load leaderboard rank"))?
        .ok_or_else(|| ApiError::NotFound("Not ranked yet".to_string()))?;

    Ok(Json(LeaderboardEntryResponse::from_db(entry)))
}
