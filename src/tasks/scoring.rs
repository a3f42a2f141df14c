use anyhow::Result;

use crate::core::state::AppState;
use crate::db::models::{Challenge, Submission};
use crate::repositories;
use crate::services::actions;
use crate::services::ai_review::{AiReviewService, ReviewRequest};

/// Decision for a claimed job, before any model call is made.
#[derive(Debug)]
pub(crate) enum JobOutcome {
    Skip(&'static str),
    Ready(ReviewRequest),
}

/// Preconditions are rechecked at claim time: the challenge may have been
/// edited or the reference removed while the job sat in the queue.
pub(crate) fn evaluate(challenge: &Challenge, submission: &Submission) -> JobOutcome {
    if !challenge.ai_correction_enabled {
        return JobOutcome::Skip("AI correction disabled for this challenge");
    }

    let Some(reference) = challenge.reference_actions_json.as_ref() else {
        return JobOutcome::Skip("Challenge has no reference recording");
    };

    let Some(student) = submission.actions_json.as_ref() else {
        return JobOutcome::Skip("Submission has no action log");
    };

    JobOutcome::Ready(ReviewRequest {
        submission_id: submission.id.clone(),
        challenge_title: challenge.title.clone(),
        challenge_description: challenge.description.clone(),
        criteria_design: challenge.criteria_design.clone(),
        criteria_functionality: challenge.criteria_functionality.clone(),
        criteria_completion: challenge.criteria_completion.clone(),
        reference_log: actions::normalize(&reference.0),
        student_log: actions::normalize(&student.0),
    })
}

pub(crate) async fn process_review_job(
    state: &AppState,
    ai: &AiReviewService,
    submission: Submission,
) -> Result<()> {
    let challenge =
        repositories::challenges::find_by_id(state.db(), &submission.challenge_id).await?;

    let Some(challenge) = challenge else {
        repositories::submissions::skip_review_job(
            state.db(),
            &submission.id,
            "Challenge no longer exists",
        )
        .await?;
        return Ok(());
    };

    // A peer review may have landed while the job was queued.
    let already_reviewed =
        repositories::reviews::exists_for_submission(state.db(), &submission.id).await?;
    if already_reviewed {
        repositories::submissions::complete_review_job(state.db(), &submission.id).await?;
        return Ok(());
    }

    let request = match evaluate(&challenge, &submission) {
        JobOutcome::Skip(reason) => {
            tracing::info!(submission_id = %submission.id, reason, "Review job skipped");
            repositories::submissions::skip_review_job(state.db(), &submission.id, reason).await?;
            return Ok(());
        }
        JobOutcome::Ready(request) => request,
    };

    let scores = ai.review_submission(&request).await?;

    let review = repositories::reviews::create(
        state.db(),
        repositories::reviews::CreateReview {
            submission_id: &submission.id,
            reviewer_id: &submission.user_id,
            score_design: scores.score_design,
            score_functionality: scores.score_functionality,
            score_completion: scores.score_completion,
            comment: Some(&format!("🤖 {}", scores.comment)),
            is_ai_review: true,
        },
    )
    .await?;

    match review {
        Some(review) => {
            repositories::submissions::mark_reviewed(state.db(), &submission.id).await?;
            tracing::info!(
                submission_id = %submission.id,
                review_id = %review.id,
                score_design = review.score_design,
                score_functionality = review.score_functionality,
                score_completion = review.score_completion,
                "AI review stored"
            );
        }
        None => {
            // Lost the race against a concurrent reviewer.
            tracing::info!(submission_id = %submission.id, "Review already present, keeping it");
        }
    }

    repositories::submissions::complete_review_job(state.db(), &submission.id).await?;
    Ok(())
}

/// Marks a failed attempt; the job goes back to the queue until the attempt
/// budget is spent, then stays `failed` with the error preserved.
pub(crate) async fn record_failure(
    state: &AppState,
    submission_id: &str,
    attempts: i32,
    error: &str,
) -> Result<()> {
    let max_attempts = state.settings().review().max_job_attempts as i32;
    let terminal = attempts >= max_attempts;

    repositories::submissions::fail_review_job(state.db(), submission_id, error, terminal).await?;

    if terminal {
        tracing::error!(submission_id, attempts, error, "Review job failed permanently");
    } else {
        tracing::warn!(submission_id, attempts, error, "Review job failed, requeued");
    }

    Ok(())
}
