//! Submission handler trait
//!
//! The API implements this with the CRM client. The worker calls `handle`
//! for every claimed submission.

use anyhow::Result;
use async_trait::async_trait;

use cas_core::models::FormSubmission;

#[async_trait]
pub trait SubmissionHandler: Send + Sync {
    /// Push the submission to the CRM and return the created record id.
    ///
    /// Return a [`SyncError`](cas_core::SyncError) inside the `anyhow::Error`
    /// to control retries; any other error is treated as recoverable.
    async fn handle(&self, submission: &FormSubmission) -> Result<String>;
}
