use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Challenge;
use crate::db::types::DifficultyLevel;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ChallengeCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    pub(crate) description: String,
    #[serde(alias = "criteriaDesign")]
    pub(crate) criteria_design: String,
    #[serde(alias = "criteriaFunctionality")]
    pub(crate) criteria_functionality: String,
    #[serde(alias = "criteriaCompletion")]
    pub(crate) criteria_completion: String,
    /// Minutes.
    #[serde(alias = "timeLimit")]
    #[validate(range(min = 1, message = "time_limit must be positive"))]
    pub(crate) time_limit: i32,
    #[serde(alias = "pointsBase")]
    #[validate(range(min = 0, message = "points_base must be non-negative"))]
    pub(crate) points_base: i32,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    #[serde(alias = "aiCorrectionEnabled")]
    pub(crate) ai_correction_enabled: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct ChallengeUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "criteriaDesign")]
    pub(crate) criteria_design: Option<String>,
    #[serde(default)]
    #[serde(alias = "criteriaFunctionality")]
    pub(crate) criteria_functionality: Option<String>,
    #[serde(default)]
    #[serde(alias = "criteriaCompletion")]
    pub(crate) criteria_completion: Option<String>,
    #[serde(default)]
    #[serde(alias = "timeLimit")]
    #[validate(range(min = 1, message = "time_limit must be positive"))]
    pub(crate) time_limit: Option<i32>,
    #[serde(default)]
    #[serde(alias = "pointsBase")]
    #[validate(range(min = 0, message = "points_base must be non-negative"))]
    pub(crate) points_base: Option<i32>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
    #[serde(default)]
    #[serde(alias = "aiCorrectionEnabled")]
    pub(crate) ai_correction_enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChallengeResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) criteria_design: String,
    pub(crate) criteria_functionality: String,
    pub(crate) criteria_completion: String,
    pub(crate) time_limit: i32,
    pub(crate) points_base: i32,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) is_active: bool,
    pub(crate) ai_correction_enabled: bool,
    pub(crate) has_reference: bool,
    pub(crate) reference_video_playback_id: Option<String>,
    pub(crate) reference_video_duration: Option<i64>,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ChallengeResponse {
    pub(crate) fn from_db(challenge: Challenge) -> Self {
        Self {
            id: challenge.id,
            title: challenge.title,
            description: challenge.description,
            criteria_design: challenge.criteria_design,
            criteria_functionality: challenge.criteria_functionality,
            criteria_completion: challenge.criteria_completion,
            time_limit: challenge.time_limit,
            points_base: challenge.points_base,
            difficulty: challenge.difficulty,
            is_active: challenge.is_active,
            ai_correction_enabled: challenge.ai_correction_enabled,
            has_reference: challenge.reference_actions_json.is_some(),
            reference_video_playback_id: challenge.reference_video_playback_id,
            reference_video_duration: challenge.reference_video_duration,
            created_by: challenge.created_by,
            created_at: format_primitive(challenge.created_at),
            updated_at: format_primitive(challenge.updated_at),
        }
    }
}

/// Handshake payload for the recorder extension: tells it whether this run
/// should be captured as the admin reference or a student submission.
#[derive(Debug, Serialize)]
pub(crate) struct ChallengeInfoResponse {
    pub(crate) challenge_id: String,
    pub(crate) title: String,
    pub(crate) ai_correction_enabled: bool,
    pub(crate) has_reference: bool,
    pub(crate) is_admin: bool,
    pub(crate) upload_mode: String,
    pub(crate) upload_endpoint: String,
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Easy
}
