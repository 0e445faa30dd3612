//! Minimal HTTP client for the admin endpoints of the CAS API.
//!
//! Authenticates with an admin member's session token (`Authorization: Bearer`).

use anyhow::{Context, Result};
use cas_core::models::{ProcessingStatus, SubmissionStats, SubmissionSummary};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const API_PREFIX: &str = "/api";

/// Workflow created in Zoho CRM by the provisioning endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWorkflow {
    pub workflow: String,
    pub email_notification_id: String,
    pub workflow_rule_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowError {
    pub workflow: String,
    pub error: String,
}

/// Body of `POST /api/admin/crm/workflows` (200 or 207)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningReport {
    #[serde(default)]
    pub created: Vec<CreatedWorkflow>,
    #[serde(default)]
    pub errors: Vec<WorkflowError>,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create client from environment: CAS_API_URL (default http://localhost:4000)
    /// and CAS_API_TOKEN, an admin session token from `POST /api/auth/login`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("CAS_API_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());
        let token = std::env::var("CAS_API_TOKEN")
            .context("Missing admin token. Set CAS_API_TOKEN")?;

        Self::new(base_url, token)
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    pub async fn get_stats(&self) -> Result<SubmissionStats> {
        self.send(self.client.get(self.build_url("/monitor/stats")))
            .await
    }

    pub async fn list_submissions(
        &self,
        status: Option<ProcessingStatus>,
        form_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SubmissionSummary>> {
        let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        if let Some(form_name) = form_name {
            query.push(("formName", form_name.to_string()));
        }

        self.send(self.client.get(self.build_url("/submit-form")).query(&query))
            .await
    }

    /// Re-queue a failed submission
    pub async fn retry_submission(&self, id: Uuid) -> Result<serde_json::Value> {
        self.send(
            self.client
                .post(self.build_url(&format!("/submit-form/{}/retry", id))),
        )
        .await
    }

    pub async fn provision_workflows(&self) -> Result<ProvisioningReport> {
        self.send(self.client.post(self.build_url("/admin/crm/workflows")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_list_submissions_sends_filters_and_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/submit-form")
            .match_header("authorization", "Bearer admin-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("status".into(), "failed".into()),
                Matcher::UrlEncoded("formName".into(), "contact".into()),
                Matcher::UrlEncoded("limit".into(), "20".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), "admin-token".to_string()).unwrap();
        let submissions = client
            .list_submissions(Some(ProcessingStatus::Failed), Some("contact"), 20)
            .await
            .unwrap();

        assert!(submissions.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_partial_provisioning_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/admin/crm/workflows")
            .with_status(207)
            .with_body(
                r#"{"created":[{"workflow":"CAS Membership Notification","emailNotificationId":"en-1","workflowRuleId":"wr-1"}],
                    "errors":[{"workflow":"General Inquiry Notification","error":"Zoho CRM returned 500"}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(format!("{}/", server.url()), "t".to_string()).unwrap();
        let report = client.provision_workflows().await.unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].workflow_rule_id, "wr-1");
        assert_eq!(report.errors[0].workflow, "General Inquiry Notification");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/monitor/stats")
            .with_status(403)
            .with_body(r#"{"error":"Admin role required","code":"FORBIDDEN"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), "t".to_string()).unwrap();
        let err = client.get_stats().await.unwrap_err();

        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("Admin role required"));
    }
}
