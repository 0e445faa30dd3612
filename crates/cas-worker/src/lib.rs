//! Submission outbox worker.
//!
//! Form endpoints store a [`FormSubmission`](cas_core::models::FormSubmission)
//! as `pending`; [`SubmissionQueue`] claims pending rows, hands them to a
//! [`SubmissionHandler`] and records the outcome, scheduling retries for
//! recoverable failures.

pub mod handler;
pub mod queue;

pub use handler::SubmissionHandler;
pub use queue::{
    compute_retry_backoff_seconds, next_retry_at, SubmissionQueue, SubmissionQueueConfig,
    MAX_RETRY_BACKOFF_SECS,
};
