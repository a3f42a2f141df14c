use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;

use crate::db::models::{Challenge, Submission};
use crate::db::types::UploadType;
use crate::repositories;
use crate::services::actions::ActionEnvelope;
use crate::services::video::{self, UploadPassthrough, WebhookEvent};

/// A submission row is written by two independent racers: the video webhook
/// (asset metadata) and the direct upload endpoint (action log). Both funnel
/// through the `mux_upload_id` upsert so the order of arrival does not
/// matter; the fallback path below only covers webhook events that carry no
/// upload id.
pub(crate) async fn process_webhook_event(
    db: &PgPool,
    playback_base_url: &str,
    event: WebhookEvent,
) -> Result<()> {
    match event.event_type.as_str() {
        "video.asset.ready" => handle_asset_ready(db, playback_base_url, &event.data).await,
        "video.asset.errored" => {
            let asset_id = event.data.get("id").and_then(Value::as_str).unwrap_or("unknown");
            tracing::error!(asset_id = %asset_id, errors = ?event.data.get("errors"), "Video processing failed");
            Ok(())
        }
        "video.upload.asset_created" => {
            tracing::info!(asset_id = ?event.data.get("asset_id"), "Upload completed, asset created");
            Ok(())
        }
        other => {
            tracing::debug!(event_type = %other, "Unhandled video webhook event");
            Ok(())
        }
    }
}

async fn handle_asset_ready(db: &PgPool, playback_base_url: &str, asset: &Value) -> Result<()> {
    let Some(raw_passthrough) = asset.get("passthrough").and_then(Value::as_str) else {
        tracing::info!("Asset ready without passthrough, skipping");
        return Ok(());
    };

    let Some(passthrough) = video::parse_passthrough(raw_passthrough) else {
        tracing::warn!("Asset ready with unparseable passthrough, skipping");
        return Ok(());
    };

    let asset_id =
        asset.get("id").and_then(Value::as_str).context("Asset ready event missing asset id")?;
    let playback_id = asset
        .get("playback_ids")
        .and_then(|ids| ids.get(0))
        .and_then(|entry| entry.get("id"))
        .and_then(Value::as_str);
    let duration_ms =
        asset.get("duration").and_then(Value::as_f64).map(|seconds| (seconds * 1000.0).round() as i64);
    let upload_id = asset.get("upload_id").and_then(Value::as_str);

    tracing::info!(
        asset_id = %asset_id,
        playback_id = ?playback_id,
        upload_id = ?upload_id,
        upload_type = ?passthrough.upload_type,
        challenge_id = %passthrough.challenge_id,
        "Video asset ready"
    );

    match passthrough.upload_type {
        UploadType::Reference => {
            save_reference_video(db, &passthrough, asset_id, playback_id, duration_ms).await
        }
        UploadType::Submission => {
            save_submission_video(
                db,
                playback_base_url,
                &passthrough,
                asset_id,
                playback_id,
                duration_ms,
                upload_id,
            )
            .await
        }
    }
}

async fn save_reference_video(
    db: &PgPool,
    passthrough: &UploadPassthrough,
    asset_id: &str,
    playback_id: Option<&str>,
    duration_ms: Option<i64>,
) -> Result<()> {
    let updated = repositories::challenges::set_reference_video(
        db,
        &passthrough.challenge_id,
        asset_id,
        playback_id,
        duration_ms,
    )
    .await?;

    if updated {
        tracing::info!(challenge_id = %passthrough.challenge_id, "Reference video saved");
    } else {
        tracing::warn!(challenge_id = %passthrough.challenge_id, "Reference video for unknown challenge");
    }

    Ok(())
}

async fn save_submission_video(
    db: &PgPool,
    playback_base_url: &str,
    passthrough: &UploadPassthrough,
    asset_id: &str,
    playback_id: Option<&str>,
    duration_ms: Option<i64>,
    upload_id: Option<&str>,
) -> Result<()> {
    let video_url = playback_id.map(|id| video::playback_url(playback_base_url, id));

    if let Some(upload_id) = upload_id {
        let submission = repositories::submissions::upsert_video_by_upload_id(
            db,
            repositories::submissions::UpsertVideo {
                upload_id,
                user_id: &passthrough.user_id,
                challenge_id: &passthrough.challenge_id,
                asset_id,
                playback_id,
                video_url: video_url.as_deref(),
                duration_ms,
            },
        )
        .await?;
        match submission {
            Some(submission) => {
                tracing::info!(submission_id = %submission.id, "Submission video reconciled by upload id");
            }
            None => {
                tracing::warn!(upload_id = %upload_id, "Replayed video event for a reviewed submission, ignored");
            }
        }
        return Ok(());
    }

    // Legacy events without an upload id: attach to the latest pending
    // submission for this user and challenge, or create one.
    let attached = repositories::submissions::attach_video_to_latest_pending(
        db,
        &passthrough.user_id,
        &passthrough.challenge_id,
        asset_id,
        playback_id,
        video_url.as_deref(),
        duration_ms,
    )
    .await?;

    match attached {
        Some(submission) => {
            tracing::info!(submission_id = %submission.id, "Submission video attached to pending row");
        }
        None => {
            let submission = repositories::submissions::insert_with_video(
                db,
                &passthrough.user_id,
                &passthrough.challenge_id,
                asset_id,
                playback_id,
                video_url.as_deref(),
                duration_ms,
            )
            .await?;
            tracing::info!(submission_id = %submission.id, "Submission created from video webhook");
        }
    }

    Ok(())
}

pub(crate) struct SubmissionIngest {
    pub(crate) mux_upload_id: String,
    pub(crate) envelope: ActionEnvelope,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) bubble_url: Option<String>,
}

/// Stores the action log for a direct upload and decides whether an AI
/// review job should be queued. Returns the submission and whether a job
/// was queued; `None` when the row under this upload id is already reviewed
/// and therefore closed to writes.
pub(crate) async fn ingest_submission(
    db: &PgPool,
    challenge: &Challenge,
    user_id: &str,
    ingest: SubmissionIngest,
) -> Result<Option<(Submission, bool)>> {
    let has_actions = !ingest.envelope.actions.is_empty();
    let actions_json = serde_json::to_value(&ingest.envelope)
        .context("Failed to encode action log")?;

    let Some(submission) = repositories::submissions::upsert_actions_by_upload_id(
        db,
        repositories::submissions::UpsertActions {
            upload_id: &ingest.mux_upload_id,
            user_id,
            challenge_id: &challenge.id,
            actions_json,
            duration_ms: ingest.duration_ms,
            bubble_url: ingest.bubble_url.as_deref(),
        },
    )
    .await?
    else {
        tracing::warn!(upload_id = %ingest.mux_upload_id, "Upload re-posted for a reviewed submission, rejected");
        return Ok(None);
    };

    let eligible = challenge.ai_correction_enabled
        && challenge.reference_actions_json.is_some()
        && has_actions;

    let queued = if eligible {
        repositories::submissions::queue_review_job(db, &submission.id).await?
    } else {
        false
    };

    tracing::info!(
        submission_id = %submission.id,
        challenge_id = %challenge.id,
        actions = ingest.envelope.actions.len(),
        review_queued = queued,
        "Submission ingested"
    );

    Ok(Some((submission, queued)))
}
