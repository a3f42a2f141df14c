use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::db::types::UploadType;
use crate::schemas::submission::SubmissionResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DirectUploadRequest {
    #[serde(alias = "challengeId")]
    pub(crate) challenge_id: String,
    /// Correlation id from the upload-url endpoint. Mandatory: it is the key
    /// the video webhook and this endpoint converge on.
    #[serde(alias = "muxUploadId")]
    #[validate(length(min = 1, message = "mux_upload_id must not be empty"))]
    pub(crate) mux_upload_id: String,
    #[serde(default)]
    pub(crate) actions: Vec<Value>,
    #[serde(default)]
    pub(crate) screenshots: Vec<Value>,
    #[serde(default)]
    pub(crate) metadata: Option<Value>,
    /// Milliseconds.
    #[serde(default)]
    pub(crate) duration: Option<i64>,
    #[serde(default)]
    #[serde(alias = "bubbleUrl")]
    pub(crate) bubble_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DirectUploadResponse {
    pub(crate) success: bool,
    pub(crate) submission: SubmissionResponse,
    pub(crate) ai_review_queued: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReferenceUploadRequest {
    #[serde(alias = "challengeId")]
    pub(crate) challenge_id: String,
    #[serde(default)]
    pub(crate) actions: Vec<Value>,
    #[serde(default)]
    pub(crate) screenshots: Vec<Value>,
    #[serde(default)]
    pub(crate) metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReferenceUploadResponse {
    pub(crate) success: bool,
    pub(crate) actions_count: usize,
    pub(crate) screenshots_count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadUrlRequest {
    #[serde(alias = "challengeId")]
    pub(crate) challenge_id: String,
    #[serde(default = "default_upload_type")]
    #[serde(alias = "uploadType")]
    pub(crate) upload_type: UploadType,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadUrlResponse {
    pub(crate) success: bool,
    pub(crate) upload_id: String,
    pub(crate) upload_url: String,
}

fn default_upload_type() -> UploadType {
    UploadType::Submission
}
