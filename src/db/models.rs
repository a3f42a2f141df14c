use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DifficultyLevel, ReviewJobStatus, SubmissionStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Profile {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) is_admin: bool,
    pub(crate) is_active: bool,
    pub(crate) total_points: i32,
    pub(crate) submissions_count: i32,
    pub(crate) reviews_count: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Challenge {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) criteria_design: String,
    pub(crate) criteria_functionality: String,
    pub(crate) criteria_completion: String,
    /// Minutes the student has to complete the exercise.
    pub(crate) time_limit: i32,
    pub(crate) points_base: i32,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) is_active: bool,
    pub(crate) ai_correction_enabled: bool,
    pub(crate) reference_actions_json: Option<Json<serde_json::Value>>,
    pub(crate) reference_video_asset_id: Option<String>,
    pub(crate) reference_video_playback_id: Option<String>,
    /// Milliseconds.
    pub(crate) reference_video_duration: Option<i64>,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) challenge_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) actions_json: Option<Json<serde_json::Value>>,
    /// Milliseconds.
    pub(crate) duration: Option<i64>,
    pub(crate) video_url: Option<String>,
    pub(crate) mux_asset_id: Option<String>,
    pub(crate) mux_playback_id: Option<String>,
    pub(crate) mux_upload_id: Option<String>,
    pub(crate) bubble_url: Option<String>,
    pub(crate) review_job_status: ReviewJobStatus,
    pub(crate) review_job_error: Option<String>,
    pub(crate) review_job_attempts: i32,
    pub(crate) review_job_started_at: Option<PrimitiveDateTime>,
    pub(crate) validated_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Review {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) score_design: i32,
    pub(crate) score_functionality: i32,
    pub(crate) score_completion: i32,
    pub(crate) comment: Option<String>,
    pub(crate) is_ai_review: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct LeaderboardEntry {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) total_points: i32,
    pub(crate) submissions_count: i32,
    pub(crate) reviews_count: i32,
    pub(crate) rank: i64,
}
