use std::collections::HashMap;

use serde_json::Value;
use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::db::models::Challenge;
use crate::db::types::DifficultyLevel;

const COLUMNS: &str = "\
    id, title, description, criteria_design, criteria_functionality, \
    criteria_completion, time_limit, points_base, difficulty, is_active, \
    ai_correction_enabled, reference_actions_json, reference_video_asset_id, \
    reference_video_playback_id, reference_video_duration, created_by, \
    created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Challenge>, sqlx::Error> {
    sqlx::query_as::<_, Challenge>(&format!("SELECT {COLUMNS} FROM challenges WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_active(pool: &PgPool) -> Result<Vec<Challenge>, sqlx::Error> {
    sqlx::query_as::<_, Challenge>(&format!(
        "SELECT {COLUMNS} FROM challenges WHERE is_active ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn titles_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT id, title FROM challenges WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Challenge>, sqlx::Error> {
    sqlx::query_as::<_, Challenge>(&format!(
        "SELECT {COLUMNS} FROM challenges ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateChallenge<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub criteria_design: &'a str,
    pub criteria_functionality: &'a str,
    pub criteria_completion: &'a str,
    pub time_limit: i32,
    pub points_base: i32,
    pub difficulty: DifficultyLevel,
    pub ai_correction_enabled: bool,
    pub created_by: &'a str,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateChallenge<'_>,
) -> Result<Challenge, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Challenge>(&format!(
        "INSERT INTO challenges (
            id, title, description, criteria_design, criteria_functionality,
            criteria_completion, time_limit, points_base, difficulty,
            ai_correction_enabled, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$12)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.criteria_design)
    .bind(params.criteria_functionality)
    .bind(params.criteria_completion)
    .bind(params.time_limit)
    .bind(params.points_base)
    .bind(params.difficulty)
    .bind(params.ai_correction_enabled)
    .bind(params.created_by)
    .bind(now)
    .fetch_one(pool)
    .await
}

#[derive(Default)]
pub(crate) struct UpdateChallenge {
    pub title: Option<String>,
    pub description: Option<String>,
    pub criteria_design: Option<String>,
    pub criteria_functionality: Option<String>,
    pub criteria_completion: Option<String>,
    pub time_limit: Option<i32>,
    pub points_base: Option<i32>,
    pub difficulty: Option<DifficultyLevel>,
    pub is_active: Option<bool>,
    pub ai_correction_enabled: Option<bool>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateChallenge,
) -> Result<Option<Challenge>, sqlx::Error> {
    sqlx::query_as::<_, Challenge>(&format!(
        "UPDATE challenges SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            criteria_design = COALESCE($3, criteria_design),
            criteria_functionality = COALESCE($4, criteria_functionality),
            criteria_completion = COALESCE($5, criteria_completion),
            time_limit = COALESCE($6, time_limit),
            points_base = COALESCE($7, points_base),
            difficulty = COALESCE($8, difficulty),
            is_active = COALESCE($9, is_active),
            ai_correction_enabled = COALESCE($10, ai_correction_enabled),
            updated_at = $11
         WHERE id = $12
         RETURNING {COLUMNS}",
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.criteria_design)
    .bind(params.criteria_functionality)
    .bind(params.criteria_completion)
    .bind(params.time_limit)
    .bind(params.points_base)
    .bind(params.difficulty)
    .bind(params.is_active)
    .bind(params.ai_correction_enabled)
    .bind(primitive_now_utc())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM challenges WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_reference_actions(
    pool: &PgPool,
    id: &str,
    reference: Value,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE challenges SET reference_actions_json = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(sqlx::types::Json(reference))
    .bind(primitive_now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_reference_video(
    pool: &PgPool,
    id: &str,
    asset_id: &str,
    playback_id: Option<&str>,
    duration_ms: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE challenges SET
            reference_video_asset_id = $1,
            reference_video_playback_id = $2,
            reference_video_duration = $3,
            updated_at = $4
         WHERE id = $5",
    )
    .bind(asset_id)
    .bind(playback_id)
    .bind(duration_ms)
    .bind(primitive_now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
