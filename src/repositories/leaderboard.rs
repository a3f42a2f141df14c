use sqlx::PgPool;

use crate::db::models::LeaderboardEntry;

pub(crate) async fn top(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT id, username, total_points, submissions_count, reviews_count, rank
         FROM leaderboard
         ORDER BY rank ASC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn rank_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT id, username, total_points, submissions_count, reviews_count, rank
         FROM leaderboard
         WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
