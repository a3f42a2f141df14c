use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::db::models::Profile;

const COLUMNS: &str = "\
    id, username, email, hashed_password, is_admin, is_active, \
    total_points, submissions_count, reviews_count, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!("SELECT {COLUMNS} FROM profiles WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!("SELECT {COLUMNS} FROM profiles WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!("SELECT {COLUMNS} FROM profiles WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn username_or_email_taken(
    pool: &PgPool,
    username: &str,
    email: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE username = $1 OR email = $2)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await
}

pub(crate) struct CreateProfile<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub hashed_password: String,
    pub is_admin: bool,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateProfile<'_>,
) -> Result<Profile, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Profile>(&format!(
        "INSERT INTO profiles (
            id, username, email, hashed_password, is_admin, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.is_admin)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {COLUMNS} FROM profiles ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub(crate) struct UpdateProfile {
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub hashed_password: Option<String>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateProfile,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "UPDATE profiles SET
            is_admin = COALESCE($1, is_admin),
            is_active = COALESCE($2, is_active),
            hashed_password = COALESCE($3, hashed_password),
            updated_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(params.is_admin)
    .bind(params.is_active)
    .bind(params.hashed_password)
    .bind(primitive_now_utc())
    .bind(id)
    .fetch_optional(pool)
    .await
}
