//! CRM sync error types
//!
//! Submission handlers return these so the worker can tell a transient CRM
//! failure (retried on the next sweep) from one that will never succeed.

use std::fmt;

/// Submission sync error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct SyncError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl SyncError {
    /// Create a new unrecoverable sync error
    ///
    /// The submission fails immediately and is never scheduled for a retry.
    /// Use this for errors like:
    /// - Missing CRM credentials
    /// - Payloads the CRM rejects as invalid
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable sync error
    ///
    /// Use this for transient network failures, rate limiting and 5xx answers.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for SyncError {
    /// Unclassified errors are treated as transient
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for Result to mark an error as unrecoverable
pub trait SyncResultExt<T> {
    fn unrecoverable(self) -> Result<T, SyncError>;
}

impl<T, E: Into<anyhow::Error>> SyncResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, SyncError> {
        self.map_err(|e| SyncError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = SyncError::unrecoverable(anyhow::anyhow!("Missing access token"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Missing access token"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = SyncError::recoverable(anyhow::anyhow!("Network timeout"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Network timeout"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: SyncError = anyhow::anyhow!("Some error").into();
        assert!(err.is_recoverable(), "Default should be recoverable");
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("Bad field mapping"));
        let sync_result = result.unrecoverable();
        assert!(!sync_result.unwrap_err().is_recoverable());
    }

    #[test]
    fn test_downcast_from_anyhow() {
        let err: anyhow::Error = SyncError::unrecoverable(anyhow::anyhow!("400")).into();
        let sync = err.downcast_ref::<SyncError>().unwrap();
        assert!(!sync.is_recoverable());
    }
}
