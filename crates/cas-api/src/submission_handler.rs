//! Pushes outbox submissions to Zoho CRM as Leads

use anyhow::Result;
use async_trait::async_trait;
use cas_core::models::FormSubmission;
use cas_core::SyncError;
use cas_crm::{lead_from_submission, AccessTokenProvider, CrmError, ZohoClient};
use cas_worker::SubmissionHandler;
use std::sync::Arc;

/// Wrap a CRM failure so the worker sees its retry classification
fn classified(err: CrmError) -> anyhow::Error {
    anyhow::Error::new(SyncError::from(err))
}

#[derive(Clone)]
pub struct CrmSubmissionHandler {
    client: ZohoClient,
    token_provider: Arc<dyn AccessTokenProvider>,
}

impl CrmSubmissionHandler {
    pub fn new(client: ZohoClient, token_provider: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client,
            token_provider,
        }
    }
}

#[async_trait]
impl SubmissionHandler for CrmSubmissionHandler {
    #[tracing::instrument(
        skip(self, submission),
        fields(submission_id = %submission.id, form_name = %submission.form_name)
    )]
    async fn handle(&self, submission: &FormSubmission) -> Result<String> {
        let lead =
            lead_from_submission(&submission.form_name, &submission.data).map_err(classified)?;
        let token = self.token_provider.access_token().await.map_err(classified)?;

        let lead_id = self
            .client
            .create_lead(&token, lead)
            .await
            .map_err(classified)?;

        tracing::info!(lead_id = %lead_id, "Lead created in CRM");
        Ok(lead_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_core::models::{ProcessingStatus, SyncStatus};
    use cas_crm::StaticTokenProvider;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use std::time::Duration;
    use uuid::Uuid;

    fn submission(form_name: &str, data: serde_json::Value) -> FormSubmission {
        let now = Utc::now();
        FormSubmission {
            id: Uuid::new_v4(),
            form_name: form_name.to_string(),
            data,
            source_ip: None,
            processing_status: ProcessingStatus::Processing,
            sync_status: SyncStatus::NotSynced,
            retry_count: 0,
            max_retries: 3,
            zoho_crm_id: None,
            last_error: None,
            next_retry_at: None,
            started_at: Some(now),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn handler(base_url: &str, token: Option<&str>) -> CrmSubmissionHandler {
        CrmSubmissionHandler::new(
            ZohoClient::new(base_url, Duration::from_secs(5)).unwrap(),
            Arc::new(StaticTokenProvider::new(token.map(String::from))),
        )
    }

    fn recoverable(err: &anyhow::Error) -> Option<bool> {
        err.downcast_ref::<SyncError>().map(|e| e.is_recoverable())
    }

    #[tokio::test]
    async fn test_creates_lead_with_contact_source() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/Leads")
            .match_header("authorization", "Zoho-oauthtoken tok")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "data": [{ "Lead_Source": "Website - Contact", "Email": "grace@example.ca" }]
            })))
            .with_status(201)
            .with_body(r#"{"data":[{"code":"SUCCESS","status":"success","message":"record added","details":{"id":"5550001"}}]}"#)
            .create_async()
            .await;

        let data = serde_json::json!({
            "name": "Grace Hopper",
            "email": "grace@example.ca",
            "message": "Hello"
        });
        let id = handler(&server.url(), Some("tok"))
            .handle(&submission("contact", data))
            .await
            .unwrap();

        assert_eq!(id, "5550001");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_token_is_unrecoverable() {
        let server = Server::new_async().await;
        let err = handler(&server.url(), None)
            .handle(&submission("contact", serde_json::json!({"email": "a@b.ca"})))
            .await
            .unwrap_err();
        assert_eq!(recoverable(&err), Some(false));
    }

    #[tokio::test]
    async fn test_server_error_is_recoverable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/Leads")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = handler(&server.url(), Some("tok"))
            .handle(&submission("contact", serde_json::json!({"email": "a@b.ca"})))
            .await
            .unwrap_err();
        assert_eq!(recoverable(&err), Some(true));
    }

    #[tokio::test]
    async fn test_rejected_payload_is_unrecoverable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/Leads")
            .with_status(400)
            .with_body(r#"{"code":"INVALID_DATA"}"#)
            .create_async()
            .await;

        let err = handler(&server.url(), Some("tok"))
            .handle(&submission("contact", serde_json::json!({"email": "a@b.ca"})))
            .await
            .unwrap_err();
        assert_eq!(recoverable(&err), Some(false));
    }
}
