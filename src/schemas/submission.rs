use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::Submission;
use crate::db::types::{ReviewJobStatus, SubmissionStatus};
use crate::schemas::review::ReviewResponse;

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) challenge_id: String,
    pub(crate) status: SubmissionStatus,
    /// Milliseconds.
    pub(crate) duration: Option<i64>,
    pub(crate) video_url: Option<String>,
    pub(crate) mux_playback_id: Option<String>,
    pub(crate) bubble_url: Option<String>,
    pub(crate) has_actions: bool,
    pub(crate) review_job_status: ReviewJobStatus,
    pub(crate) review_job_attempts: i32,
    pub(crate) review_job_error: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    /// Only populated on the caller's own listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) challenge_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) review: Option<ReviewResponse>,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: Submission) -> Self {
        Self {
            id: submission.id,
            user_id: submission.user_id,
            challenge_id: submission.challenge_id,
            status: submission.status,
            duration: submission.duration,
            video_url: submission.video_url,
            mux_playback_id: submission.mux_playback_id,
            bubble_url: submission.bubble_url,
            has_actions: submission.actions_json.is_some(),
            review_job_status: submission.review_job_status,
            review_job_attempts: submission.review_job_attempts,
            review_job_error: submission.review_job_error,
            created_at: format_primitive(submission.created_at),
            updated_at: format_primitive(submission.updated_at),
            challenge_title: None,
            review: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidateResponse {
    pub(crate) success: bool,
    pub(crate) review_queued: bool,
}
