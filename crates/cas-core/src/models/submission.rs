use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "sync_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotSynced,
    Synced,
    SyncFailed,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncStatus::NotSynced => write!(f, "not_synced"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::SyncFailed => write!(f, "sync_failed"),
        }
    }
}

/// Outbox row: a form payload waiting to be pushed to the CRM
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_name: String,
    pub data: serde_json::Value,
    pub source_ip: Option<String>,
    pub processing_status: ProcessingStatus,
    pub sync_status: SyncStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub zoho_crm_id: Option<String>,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormSubmission {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// A failed submission the retry sweep will pick up again. Submissions
    /// at the retry ceiling, or failed for good, are not eligible.
    pub fn is_eligible_for_retry(&self) -> bool {
        self.processing_status == ProcessingStatus::Failed
            && self.next_retry_at.is_some()
            && self.can_retry()
    }
}

/// Append-only record of one processing attempt
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SubmissionLog {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub attempt: i32,
    pub status: ProcessingStatus,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    #[validate(custom(function = "crate::validation::validate_form_name"))]
    pub form_name: String,
    #[validate(custom(function = "crate::validation::validate_json_object"))]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAccepted {
    pub id: Uuid,
    pub processing_status: ProcessingStatus,
    pub sync_status: SyncStatus,
    pub status_url: String,
}

/// Status view polled by the browser after a submit
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatusResponse {
    pub id: Uuid,
    pub form_name: String,
    pub processing_status: ProcessingStatus,
    pub sync_status: SyncStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub eligible_for_retry: bool,
    pub zoho_crm_id: Option<String>,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub logs: Vec<SubmissionLog>,
}

impl SubmissionStatusResponse {
    pub fn new(submission: FormSubmission, logs: Vec<SubmissionLog>) -> Self {
        SubmissionStatusResponse {
            eligible_for_retry: submission.is_eligible_for_retry(),
            id: submission.id,
            form_name: submission.form_name,
            processing_status: submission.processing_status,
            sync_status: submission.sync_status,
            retry_count: submission.retry_count,
            max_retries: submission.max_retries,
            zoho_crm_id: submission.zoho_crm_id,
            last_error: submission.last_error,
            next_retry_at: submission.next_retry_at,
            processed_at: submission.processed_at,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
            logs,
        }
    }
}

/// Row of the admin submission listing (no payload, no logs)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub form_name: String,
    pub processing_status: ProcessingStatus,
    pub sync_status: SyncStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub zoho_crm_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FormSubmission> for SubmissionSummary {
    fn from(s: FormSubmission) -> Self {
        SubmissionSummary {
            id: s.id,
            form_name: s.form_name,
            processing_status: s.processing_status,
            sync_status: s.sync_status,
            retry_count: s.retry_count,
            max_retries: s.max_retries,
            zoho_crm_id: s.zoho_crm_id,
            last_error: s.last_error,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormCount {
    pub form_name: String,
    pub count: i64,
}

/// Outbox statistics for the monitoring dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub not_synced: i64,
    pub synced: i64,
    pub sync_failed: i64,
    pub eligible_for_retry: i64,
    pub exhausted_retries: i64,
    pub max_retries: i32,
    pub in_flight: usize,
    pub by_form: Vec<FormCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: ProcessingStatus, retry_count: i32) -> FormSubmission {
        let now = Utc::now();
        FormSubmission {
            id: Uuid::new_v4(),
            form_name: "contact".to_string(),
            data: serde_json::json!({"email": "a@b.ca"}),
            source_ip: None,
            processing_status: status,
            sync_status: SyncStatus::SyncFailed,
            retry_count,
            max_retries: 3,
            zoho_crm_id: None,
            last_error: Some("503".to_string()),
            next_retry_at: Some(now),
            started_at: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_retry_eligibility_below_max() {
        assert!(submission(ProcessingStatus::Failed, 0).is_eligible_for_retry());
        assert!(submission(ProcessingStatus::Failed, 2).is_eligible_for_retry());
    }

    #[test]
    fn test_retry_eligibility_excludes_max() {
        let at_max = submission(ProcessingStatus::Failed, 3);
        assert!(!at_max.can_retry());
        assert!(!at_max.is_eligible_for_retry());
    }

    #[test]
    fn test_retry_eligibility_requires_failed_and_schedule() {
        assert!(!submission(ProcessingStatus::Pending, 0).is_eligible_for_retry());
        assert!(!submission(ProcessingStatus::Completed, 0).is_eligible_for_retry());
        let mut permanent = submission(ProcessingStatus::Failed, 0);
        permanent.next_retry_at = None;
        assert!(!permanent.is_eligible_for_retry());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::NotSynced).unwrap(),
            "\"not_synced\""
        );
        assert_eq!(ProcessingStatus::Processing.to_string(), "processing");
        assert_eq!(
            "failed".parse::<ProcessingStatus>().unwrap(),
            ProcessingStatus::Failed
        );
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(!ProcessingStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_response_flags_eligibility() {
        let response = SubmissionStatusResponse::new(submission(ProcessingStatus::Failed, 3), vec![]);
        assert!(!response.eligible_for_retry);
        assert_eq!(response.retry_count, 3);
    }
}
