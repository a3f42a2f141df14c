use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::Submission;
use crate::db::types::{ReviewJobStatus, SubmissionStatus};

const COLUMNS: &str = "\
    id, user_id, challenge_id, status, actions_json, duration, video_url, \
    mux_asset_id, mux_playback_id, mux_upload_id, bubble_url, \
    review_job_status, review_job_error, review_job_attempts, \
    review_job_started_at, validated_at, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_all(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Pending submissions by other students that have no review yet; this is
/// the peer-review queue.
pub(crate) async fn list_reviewable(
    pool: &PgPool,
    reviewer_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions s
         WHERE s.status = $1
           AND s.user_id <> $2
           AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.submission_id = s.id)
         ORDER BY s.created_at ASC"
    ))
    .bind(SubmissionStatus::Pending)
    .bind(reviewer_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct UpsertVideo<'a> {
    pub upload_id: &'a str,
    pub user_id: &'a str,
    pub challenge_id: &'a str,
    pub asset_id: &'a str,
    pub playback_id: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub duration_ms: Option<i64>,
}

/// Webhook-side writer of the reconciliation race. Creates the row keyed by
/// `mux_upload_id` or fills the video columns on the row the direct-upload
/// endpoint already created. Reviewed rows are immutable: a replayed event
/// hits the conflict branch, fails its status guard and yields `None`.
pub(crate) async fn upsert_video_by_upload_id(
    pool: &PgPool,
    params: UpsertVideo<'_>,
) -> Result<Option<Submission>, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, user_id, challenge_id, mux_upload_id, mux_asset_id,
            mux_playback_id, video_url, duration, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$9)
        ON CONFLICT (mux_upload_id) WHERE mux_upload_id IS NOT NULL
        DO UPDATE SET
            mux_asset_id = EXCLUDED.mux_asset_id,
            mux_playback_id = EXCLUDED.mux_playback_id,
            video_url = EXCLUDED.video_url,
            duration = COALESCE(submissions.duration, EXCLUDED.duration),
            updated_at = EXCLUDED.updated_at
        WHERE submissions.status = $10
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.user_id)
    .bind(params.challenge_id)
    .bind(params.upload_id)
    .bind(params.asset_id)
    .bind(params.playback_id)
    .bind(params.video_url)
    .bind(params.duration_ms)
    .bind(now)
    .bind(SubmissionStatus::Pending)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpsertActions<'a> {
    pub upload_id: &'a str,
    pub user_id: &'a str,
    pub challenge_id: &'a str,
    pub actions_json: Value,
    pub duration_ms: Option<i64>,
    pub bubble_url: Option<&'a str>,
}

/// Direct-upload-side writer of the reconciliation race. The action-log
/// duration wins over the asset duration when both arrive. Reviewed rows
/// are immutable; a re-post against one yields `None`.
pub(crate) async fn upsert_actions_by_upload_id(
    pool: &PgPool,
    params: UpsertActions<'_>,
) -> Result<Option<Submission>, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, user_id, challenge_id, mux_upload_id, actions_json,
            duration, bubble_url, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        ON CONFLICT (mux_upload_id) WHERE mux_upload_id IS NOT NULL
        DO UPDATE SET
            actions_json = EXCLUDED.actions_json,
            duration = COALESCE(EXCLUDED.duration, submissions.duration),
            bubble_url = EXCLUDED.bubble_url,
            updated_at = EXCLUDED.updated_at
        WHERE submissions.status = $9
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.user_id)
    .bind(params.challenge_id)
    .bind(params.upload_id)
    .bind(Json(params.actions_json))
    .bind(params.duration_ms)
    .bind(params.bubble_url)
    .bind(now)
    .bind(SubmissionStatus::Pending)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn attach_video_to_latest_pending(
    pool: &PgPool,
    user_id: &str,
    challenge_id: &str,
    asset_id: &str,
    playback_id: Option<&str>,
    video_url: Option<&str>,
    duration_ms: Option<i64>,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "WITH candidate AS (
            SELECT id AS candidate_id FROM submissions
            WHERE user_id = $1 AND challenge_id = $2 AND status = $3
            ORDER BY created_at DESC
            LIMIT 1
        )
        UPDATE submissions
        SET mux_asset_id = $4,
            mux_playback_id = $5,
            video_url = $6,
            duration = COALESCE(submissions.duration, $7),
            updated_at = $8
        FROM candidate
        WHERE submissions.id = candidate.candidate_id
        RETURNING {COLUMNS}",
    ))
    .bind(user_id)
    .bind(challenge_id)
    .bind(SubmissionStatus::Pending)
    .bind(asset_id)
    .bind(playback_id)
    .bind(video_url)
    .bind(duration_ms)
    .bind(primitive_now_utc())
    .fetch_optional(pool)
    .await
}

pub(crate) async fn insert_with_video(
    pool: &PgPool,
    user_id: &str,
    challenge_id: &str,
    asset_id: &str,
    playback_id: Option<&str>,
    video_url: Option<&str>,
    duration_ms: Option<i64>,
) -> Result<Submission, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, user_id, challenge_id, mux_asset_id, mux_playback_id,
            video_url, duration, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(challenge_id)
    .bind(asset_id)
    .bind(playback_id)
    .bind(video_url)
    .bind(duration_ms)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete_pending(
    pool: &PgPool,
    id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM submissions WHERE id = $1 AND user_id = $2 AND status = $3")
            .bind(id)
            .bind(user_id)
            .bind(SubmissionStatus::Pending)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Stamps the owner's one-shot validation. `false` means the submission was
/// already validated.
pub(crate) async fn mark_validated(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let now = primitive_now_utc();
    let result = sqlx::query(
        "UPDATE submissions
         SET validated_at = $1, updated_at = $1
         WHERE id = $2 AND validated_at IS NULL",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_reviewed(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(SubmissionStatus::Reviewed)
        .bind(primitive_now_utc())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Enqueues the AI review job. Only pending, unreviewed submissions whose
/// job is not already in flight are eligible; re-queueing a failed job
/// resets its attempt counter.
pub(crate) async fn queue_review_job(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET review_job_status = $1,
             review_job_error = NULL,
             review_job_attempts = 0,
             updated_at = $2
         WHERE id = $3
           AND status = $4
           AND review_job_status IN ($5, $6)
           AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.submission_id = submissions.id)",
    )
    .bind(ReviewJobStatus::Queued)
    .bind(primitive_now_utc())
    .bind(id)
    .bind(SubmissionStatus::Pending)
    .bind(ReviewJobStatus::Skipped)
    .bind(ReviewJobStatus::Failed)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Claims the oldest queued review job. FOR UPDATE SKIP LOCKED keeps
/// concurrent workers off the same row.
pub(crate) async fn claim_next_review_job(
    pool: &PgPool,
) -> Result<Option<Submission>, sqlx::Error> {
    let now = primitive_now_utc();
    sqlx::query_as::<_, Submission>(&format!(
        "WITH candidate AS (
            SELECT id AS candidate_id FROM submissions
            WHERE review_job_status = $1
            ORDER BY created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE submissions
        SET review_job_status = $2,
            review_job_attempts = review_job_attempts + 1,
            review_job_started_at = $3,
            review_job_error = NULL,
            updated_at = $3
        FROM candidate
        WHERE submissions.id = candidate.candidate_id
        RETURNING {COLUMNS}",
    ))
    .bind(ReviewJobStatus::Queued)
    .bind(ReviewJobStatus::Processing)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn complete_review_job(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE submissions
         SET review_job_status = $1,
             review_job_error = NULL,
             updated_at = $2
         WHERE id = $3",
    )
    .bind(ReviewJobStatus::Completed)
    .bind(primitive_now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a job failure: back to the queue while attempts remain, terminal
/// `failed` once the budget is spent.
pub(crate) async fn fail_review_job(
    pool: &PgPool,
    id: &str,
    error: &str,
    terminal: bool,
) -> Result<(), sqlx::Error> {
    let status = if terminal { ReviewJobStatus::Failed } else { ReviewJobStatus::Queued };
    sqlx::query(
        "UPDATE submissions
         SET review_job_status = $1,
             review_job_error = $2,
             review_job_started_at = NULL,
             updated_at = $3
         WHERE id = $4",
    )
    .bind(status)
    .bind(error)
    .bind(primitive_now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn skip_review_job(pool: &PgPool, id: &str, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE submissions
         SET review_job_status = $1,
             review_job_error = $2,
             updated_at = $3
         WHERE id = $4",
    )
    .bind(ReviewJobStatus::Skipped)
    .bind(reason)
    .bind(primitive_now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Requeues processing jobs whose worker disappeared without reporting back.
pub(crate) async fn recover_stale_review_jobs(
    pool: &PgPool,
    older_than_seconds: i64,
) -> Result<u64, sqlx::Error> {
    let now = primitive_now_utc();
    let cutoff = now - time::Duration::seconds(older_than_seconds);
    let result = sqlx::query(
        "UPDATE submissions
         SET review_job_status = $1,
             review_job_started_at = NULL,
             updated_at = $2
         WHERE review_job_status = $3
           AND review_job_started_at IS NOT NULL
           AND review_job_started_at < $4",
    )
    .bind(ReviewJobStatus::Queued)
    .bind(now)
    .bind(ReviewJobStatus::Processing)
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
