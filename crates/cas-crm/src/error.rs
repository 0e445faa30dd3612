use cas_core::{AppError, SyncError};
use thiserror::Error;

use crate::SERVICE_NAME;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Zoho access token is not configured")]
    MissingToken,

    #[error("HTTP request to Zoho failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zoho API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected Zoho response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid submission payload: {0}")]
    InvalidPayload(String),
}

pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    /// Whether retrying the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CrmError::MissingToken | CrmError::InvalidPayload(_) => false,
            CrmError::Http(_) => true,
            CrmError::Api { status, .. } => *status == 429 || *status >= 500,
            CrmError::UnexpectedResponse(_) => false,
        }
    }
}

impl From<CrmError> for SyncError {
    fn from(err: CrmError) -> Self {
        if err.is_recoverable() {
            SyncError::recoverable(err)
        } else {
            SyncError::unrecoverable(err)
        }
    }
}

impl From<CrmError> for AppError {
    fn from(err: CrmError) -> Self {
        AppError::ExternalService {
            service: SERVICE_NAME.to_string(),
            message: err.to_string(),
        }
    }
}
