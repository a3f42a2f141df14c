use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Review;
use crate::db::types::ReviewJobStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewCreate {
    #[serde(alias = "scoreDesign")]
    #[validate(range(min = 0, max = 5, message = "score_design must be between 0 and 5"))]
    pub(crate) score_design: i32,
    #[serde(alias = "scoreFunctionality")]
    #[validate(range(min = 0, max = 5, message = "score_functionality must be between 0 and 5"))]
    pub(crate) score_functionality: i32,
    #[serde(alias = "scoreCompletion")]
    #[validate(range(min = 0, max = 5, message = "score_completion must be between 0 and 5"))]
    pub(crate) score_completion: i32,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewResponse {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) score_design: i32,
    pub(crate) score_functionality: i32,
    pub(crate) score_completion: i32,
    pub(crate) comment: Option<String>,
    pub(crate) is_ai_review: bool,
    pub(crate) created_at: String,
}

impl ReviewResponse {
    pub(crate) fn from_db(review: Review) -> Self {
        Self {
            id: review.id,
            submission_id: review.submission_id,
            reviewer_id: review.reviewer_id,
            score_design: review.score_design,
            score_functionality: review.score_functionality,
            score_completion: review.score_completion,
            comment: review.comment,
            is_ai_review: review.is_ai_review,
            created_at: format_primitive(review.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AiReviewRequest {
    #[serde(alias = "submissionId")]
    pub(crate) submission_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AiReviewStatusQuery {
    pub(crate) submission_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AiReviewStatusResponse {
    pub(crate) submission_id: String,
    pub(crate) review_job_status: ReviewJobStatus,
    pub(crate) review_job_attempts: i32,
    pub(crate) review_job_error: Option<String>,
    pub(crate) review: Option<ReviewResponse>,
}
