use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficultylevel", rename_all = "lowercase")]
pub(crate) enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

/// Canonical submission lifecycle: `pending` from the moment either writer
/// materializes the row, `reviewed` once a review exists. There is no
/// intermediate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submissionstatus", rename_all = "lowercase")]
pub(crate) enum SubmissionStatus {
    Pending,
    Reviewed,
}

/// Visible state of the AI review job attached to a submission. `Skipped`
/// means nothing was enqueued (AI correction disabled, or not validated yet);
/// `Failed` is terminal after the retry budget runs out and leaves the
/// submission open for peer review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "reviewjobstatus", rename_all = "lowercase")]
pub(crate) enum ReviewJobStatus {
    Skipped,
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UploadType {
    Submission,
    Reference,
}
