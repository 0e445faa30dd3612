//! Submission queue: bounded worker pool, polling plus in-process wakeups,
//! retry sweep and stale reaper.
//!
//! Shutdown: [`SubmissionQueue::shutdown`] stops the claim loop and the
//! maintenance task; submissions already being handled run to completion or
//! time out. Rows left in `processing` by a killed process are failed by the
//! stale reaper of the next instance and then retried.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;

use cas_core::models::{FormSubmission, ProcessingStatus};
use cas_core::{SubmissionConfig, SyncError};
use cas_db::SubmissionRepository;

use crate::handler::SubmissionHandler;

/// Upper bound in seconds for the delay before a retry
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Retries requeued per sweep
const RETRY_SWEEP_BATCH: i64 = 100;

/// `min(base * 2^retry_count, 300)` seconds
#[inline]
pub fn compute_retry_backoff_seconds(base_seconds: i64, retry_count: i32) -> u64 {
    let base = base_seconds.max(0) as u64;
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(MAX_RETRY_BACKOFF_SECS)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// When a failed submission should be retried, or `None` when it never will be
pub fn next_retry_at(
    submission: &FormSubmission,
    recoverable: bool,
    base_seconds: i64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if !recoverable || !submission.can_retry() {
        return None;
    }
    let backoff = compute_retry_backoff_seconds(base_seconds, submission.retry_count);
    Some(now + ChronoDuration::seconds(backoff as i64))
}

/// Errors without a [`SyncError`] classification are retried
fn is_recoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .map(|e| e.is_recoverable())
        .unwrap_or(true)
}

#[derive(Clone, Debug)]
pub struct SubmissionQueueConfig {
    pub max_concurrent: usize,
    pub poll_interval_ms: u64,
    pub timeout_seconds: u64,
    pub retry_base_seconds: i64,
    /// Interval in seconds between retry sweeps and stale reaper runs
    pub retry_interval_seconds: u64,
    /// Grace period added to the timeout before a `processing` row is reaped
    pub stale_grace_period_secs: i64,
}

impl Default for SubmissionQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            poll_interval_ms: 1000,
            timeout_seconds: 60,
            retry_base_seconds: 30,
            retry_interval_seconds: 60,
            stale_grace_period_secs: 60,
        }
    }
}

impl From<&SubmissionConfig> for SubmissionQueueConfig {
    fn from(config: &SubmissionConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            poll_interval_ms: config.poll_interval_ms,
            timeout_seconds: config.timeout_seconds,
            retry_base_seconds: config.retry_base_seconds,
            retry_interval_seconds: config.retry_interval_seconds,
            ..Self::default()
        }
    }
}

impl SubmissionQueueConfig {
    fn stale_after_secs(&self) -> i64 {
        self.timeout_seconds as i64 + self.stale_grace_period_secs
    }
}

#[derive(Clone)]
pub struct SubmissionQueue {
    config: SubmissionQueueConfig,
    semaphore: Arc<Semaphore>,
    wakeup: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SubmissionQueue {
    /// Create the queue and spawn its worker loop and maintenance task
    pub fn new(
        repository: SubmissionRepository,
        config: SubmissionQueueConfig,
        handler: Arc<dyn SubmissionHandler>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let wakeup = Arc::new(Notify::new());

        let worker = Worker {
            repository,
            config: config.clone(),
            semaphore: semaphore.clone(),
            wakeup: wakeup.clone(),
            handler,
        };
        tokio::spawn(worker.run(shutdown_rx));

        Self {
            config,
            semaphore,
            wakeup,
            shutdown_tx,
        }
    }

    /// Queue without a worker. Submissions still land in the database and are
    /// picked up by whichever instance runs one.
    pub fn new_no_worker(config: SubmissionQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            wakeup: Arc::new(Notify::new()),
            config,
            shutdown_tx,
        }
    }

    /// Wake the worker after a submission was stored
    pub fn notify(&self) {
        self.wakeup.notify_one();
    }

    /// Submissions currently being handled by this instance
    pub fn in_flight(&self) -> usize {
        self.config
            .max_concurrent
            .saturating_sub(self.semaphore.available_permits())
    }

    pub fn config(&self) -> &SubmissionQueueConfig {
        &self.config
    }

    /// Signal the worker loop to stop claiming. Returns without waiting for
    /// in-flight submissions.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating submission queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

struct Worker {
    repository: SubmissionRepository,
    config: SubmissionQueueConfig,
    semaphore: Arc<Semaphore>,
    wakeup: Arc<Notify>,
    handler: Arc<dyn SubmissionHandler>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval_ms,
            retry_interval_seconds = self.config.retry_interval_seconds,
            "Submission worker started"
        );

        let (maintenance_shutdown_tx, maintenance_shutdown_rx) = mpsc::channel::<()>(1);
        if self.config.retry_interval_seconds > 0 {
            tokio::spawn(Self::maintenance(
                self.repository.clone(),
                self.config.clone(),
                self.wakeup.clone(),
                maintenance_shutdown_rx,
            ));
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Submission worker shutting down");
                    let _ = maintenance_shutdown_tx.send(()).await;
                    break;
                }
                _ = self.wakeup.notified() => {
                    self.claim_available().await;
                }
                _ = sleep(poll_interval) => {
                    self.claim_available().await;
                }
            }
        }

        tracing::info!("Submission worker stopped");
    }

    /// Retry sweep and stale reaper
    async fn maintenance(
        repository: SubmissionRepository,
        config: SubmissionQueueConfig,
        wakeup: Arc<Notify>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.retry_interval_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match repository.reap_stale_processing(config.stale_after_secs()).await {
                        Ok(reaped) => {
                            for submission in reaped {
                                if let Err(e) = repository
                                    .append_log(
                                        submission.id,
                                        submission.retry_count,
                                        ProcessingStatus::Failed,
                                        "Processing timed out",
                                        None,
                                    )
                                    .await
                                {
                                    tracing::warn!(
                                        error = %e,
                                        submission_id = %submission.id,
                                        "Failed to log stale submission"
                                    );
                                }
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Stale submission reaper failed"),
                    }

                    match repository.requeue_due_retries(RETRY_SWEEP_BATCH).await {
                        Ok(requeued) if !requeued.is_empty() => {
                            for submission in &requeued {
                                if let Err(e) = repository
                                    .append_log(
                                        submission.id,
                                        submission.retry_count,
                                        ProcessingStatus::Pending,
                                        "Queued for retry",
                                        Some(json!({ "retryCount": submission.retry_count })),
                                    )
                                    .await
                                {
                                    tracing::warn!(
                                        error = %e,
                                        submission_id = %submission.id,
                                        "Failed to log submission retry"
                                    );
                                }
                            }
                            wakeup.notify_one();
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Submission retry sweep failed"),
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    /// Claim pending submissions while permits are free
    async fn claim_available(&self) {
        while self.claim_and_dispatch_one().await {}
    }

    async fn claim_and_dispatch_one(&self) -> bool {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return false;
            }
        };

        match self.repository.claim_next_submission().await {
            Ok(Some(submission)) => {
                let repository = self.repository.clone();
                let handler = self.handler.clone();
                let config = self.config.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = process_submission(submission, repository, handler, config).await
                    {
                        tracing::error!(error = %e, "Failed to record submission outcome");
                    }
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No pending submissions");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim submission");
                false
            }
        }
    }
}

#[tracing::instrument(
    skip_all,
    fields(submission.id = %submission.id, submission.form = %submission.form_name)
)]
async fn process_submission(
    submission: FormSubmission,
    repository: SubmissionRepository,
    handler: Arc<dyn SubmissionHandler>,
    config: SubmissionQueueConfig,
) -> Result<()> {
    let attempt = submission.retry_count;

    repository
        .append_log(
            submission.id,
            attempt,
            ProcessingStatus::Processing,
            "Processing started",
            None,
        )
        .await?;

    let timeout = Duration::from_secs(config.timeout_seconds);
    let outcome = tokio::time::timeout(timeout, handler.handle(&submission)).await;

    let (message, recoverable) = match outcome {
        Ok(Ok(crm_id)) => {
            repository.mark_completed(submission.id, &crm_id).await?;
            repository
                .append_log(
                    submission.id,
                    attempt,
                    ProcessingStatus::Completed,
                    "Synced to CRM",
                    Some(json!({ "zohoCrmId": crm_id })),
                )
                .await?;
            return Ok(());
        }
        Ok(Err(e)) => (e.to_string(), is_recoverable(&e)),
        Err(_) => (
            format!("Processing timed out after {}s", config.timeout_seconds),
            true,
        ),
    };

    let retry_at = next_retry_at(&submission, recoverable, config.retry_base_seconds, Utc::now());

    tracing::warn!(
        error = %message,
        recoverable = recoverable,
        retry_count = submission.retry_count,
        max_retries = submission.max_retries,
        "Submission processing failed"
    );

    repository
        .mark_failed(submission.id, &message, retry_at)
        .await?;

    let log_message = match (retry_at, recoverable) {
        (Some(_), _) => "Attempt failed, retry scheduled",
        (None, false) => "Attempt failed with an unrecoverable error",
        (None, true) => "Attempt failed, retries exhausted",
    };
    repository
        .append_log(
            submission.id,
            attempt,
            ProcessingStatus::Failed,
            log_message,
            Some(json!({
                "error": message,
                "recoverable": recoverable,
                "nextRetryAt": retry_at,
            })),
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_core::models::SyncStatus;
    use uuid::Uuid;

    fn submission(retry_count: i32, max_retries: i32) -> FormSubmission {
        let now = Utc::now();
        FormSubmission {
            id: Uuid::new_v4(),
            form_name: "contact".to_string(),
            data: json!({ "name": "Ada" }),
            source_ip: None,
            processing_status: ProcessingStatus::Processing,
            sync_status: SyncStatus::NotSynced,
            retry_count,
            max_retries,
            zoho_crm_id: None,
            last_error: None,
            next_retry_at: None,
            started_at: Some(now),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(30, 0), 30);
        assert_eq!(compute_retry_backoff_seconds(30, 1), 60);
        assert_eq!(compute_retry_backoff_seconds(30, 2), 120);
        assert_eq!(compute_retry_backoff_seconds(30, 3), 240);
        assert_eq!(compute_retry_backoff_seconds(30, 4), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(1, 8), 256);
        assert_eq!(compute_retry_backoff_seconds(1, 9), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn retry_backoff_never_overflows() {
        assert_eq!(compute_retry_backoff_seconds(30, 64), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(i64::MAX, 2), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(30, -1), 30);
        assert_eq!(compute_retry_backoff_seconds(-5, 3), 0);
    }

    #[test]
    fn recoverable_failure_with_retries_left_is_scheduled() {
        let now = Utc::now();
        let retry_at = next_retry_at(&submission(1, 3), true, 30, now);
        assert_eq!(retry_at, Some(now + ChronoDuration::seconds(60)));
    }

    #[test]
    fn exhausted_or_unrecoverable_failure_is_final() {
        let now = Utc::now();
        assert_eq!(next_retry_at(&submission(3, 3), true, 30, now), None);
        assert_eq!(next_retry_at(&submission(0, 3), false, 30, now), None);
        assert_eq!(next_retry_at(&submission(0, 0), true, 30, now), None);
    }

    #[test]
    fn unrecoverable_sync_error_detected() {
        let err: anyhow::Error = SyncError::unrecoverable(anyhow::anyhow!("bad payload")).into();
        assert!(!is_recoverable(&err));
    }

    #[test]
    fn recoverable_sync_error_detected() {
        let err: anyhow::Error = SyncError::recoverable(anyhow::anyhow!("timeout")).into();
        assert!(is_recoverable(&err));
    }

    #[test]
    fn unclassified_error_treated_as_recoverable() {
        let err = anyhow::anyhow!("connection reset");
        assert!(is_recoverable(&err));
    }

    #[tokio::test]
    async fn no_worker_queue_reports_idle() {
        let queue = SubmissionQueue::new_no_worker(SubmissionQueueConfig::default());
        queue.notify();
        assert_eq!(queue.in_flight(), 0);
        queue.shutdown().await;
    }

    #[test]
    fn config_from_submission_settings() {
        let settings = SubmissionConfig {
            worker_enabled: true,
            max_retries: 5,
            poll_interval_ms: 250,
            retry_interval_seconds: 15,
            retry_base_seconds: 10,
            max_concurrent: 0,
            timeout_seconds: 20,
        };
        let config = SubmissionQueueConfig::from(&settings);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.stale_after_secs(), 80);
    }
}
