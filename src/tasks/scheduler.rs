use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::repositories;
use crate::services::ai_review::AiReviewService;
use crate::tasks::scoring;

/// Processing jobs older than this are assumed orphaned by a dead worker.
const STALE_JOB_SECONDS: i64 = 600;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let ai = AiReviewService::from_settings(state.settings())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let concurrency = state.settings().review().worker_concurrency;
    let mut handles = Vec::with_capacity(concurrency + 1);

    for _ in 0..concurrency {
        handles.push(tokio::spawn(review_worker(state.clone(), ai.clone(), shutdown_rx.clone())));
    }
    handles.push(tokio::spawn(recover_stale_loop(state.clone(), shutdown_rx.clone())));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn review_worker(state: AppState, ai: AiReviewService, mut shutdown: watch::Receiver<bool>) {
    let poll = Duration::from_secs(state.settings().review().worker_poll_seconds);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match repositories::submissions::claim_next_review_job(state.db()).await {
            Ok(Some(submission)) => {
                let submission_id = submission.id.clone();
                let attempts = submission.review_job_attempts;
                if let Err(err) = scoring::process_review_job(&state, &ai, submission).await {
                    if let Err(recovery_err) =
                        scoring::record_failure(&state, &submission_id, attempts, &err.to_string())
                            .await
                    {
                        tracing::error!(
                            submission_id,
                            error = %recovery_err,
                            "Failed to record review job failure"
                        );
                    }
                    tracing::error!(
                        submission_id,
                        error = %err,
                        "Review job failed"
                    );
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to claim review job"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(poll) => {}
        }
    }
}

async fn recover_stale_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match repositories::submissions::recover_stale_review_jobs(
                    state.db(),
                    STALE_JOB_SECONDS,
                )
                .await
                {
                    Ok(0) => {}
                    Ok(count) => {
                        tracing::warn!(count, "Requeued stale review jobs");
                    }
                    Err(err) => tracing::error!(error = %err, "recover_stale_review_jobs failed"),
                }
            }
        }
    }
}
