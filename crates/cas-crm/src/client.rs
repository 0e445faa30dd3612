//! Thin client for the Zoho CRM REST API (v8).
//!
//! Every call takes the access token explicitly so callers decide when a
//! token is fetched; the header is `Authorization: Zoho-oauthtoken {token}`.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use cas_core::CrmConfig;

use crate::error::{CrmError, CrmResult};

#[derive(Clone, Debug)]
pub struct ZohoClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<ZohoUser>,
}

#[derive(Debug, Deserialize)]
struct ZohoUser {
    id: String,
}

/// Per-record outcome returned by Zoho write endpoints
#[derive(Debug, Deserialize)]
struct ActionResult {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Value,
}

impl ActionResult {
    fn into_id(self) -> CrmResult<String> {
        let succeeded = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("success"))
            .unwrap_or(false);

        if !succeeded {
            return Err(CrmError::Api {
                status: 200,
                body: format!(
                    "{}: {}",
                    self.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                    self.message.unwrap_or_default()
                ),
            });
        }

        // ids come back as strings, occasionally as numbers
        match self.details.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(CrmError::UnexpectedResponse(
                "success response without an id".to_string(),
            )),
        }
    }
}

impl ZohoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CrmResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CrmConfig) -> CrmResult<Self> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.http_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header("Authorization", format!("Zoho-oauthtoken {}", token))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> CrmResult<T> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CrmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CrmError::UnexpectedResponse(format!("{}: {}", e, text)))
    }

    /// Pull the single record result out of `{ "<key>": [ {...} ] }`
    fn first_result(mut body: Value, key: &str) -> CrmResult<String> {
        let first = body
            .get_mut(key)
            .and_then(Value::as_array_mut)
            .and_then(|items| {
                if items.is_empty() {
                    None
                } else {
                    Some(items.swap_remove(0))
                }
            })
            .ok_or_else(|| CrmError::UnexpectedResponse(format!("missing `{}` array", key)))?;

        let result: ActionResult = serde_json::from_value(first)
            .map_err(|e| CrmError::UnexpectedResponse(e.to_string()))?;
        result.into_id()
    }

    /// Id of the user owning the token, used as the notification sender
    #[tracing::instrument(skip(self, token))]
    pub async fn get_current_user_id(&self, token: &str) -> CrmResult<String> {
        let request = Self::authorize(self.client.get(self.url("/users")), token)
            .query(&[("type", "CurrentUser")]);

        let body: UsersResponse = Self::send(request).await?;
        body.users
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| CrmError::UnexpectedResponse("no current user returned".to_string()))
    }

    /// Create an email notification action on the Leads module. Returns its id.
    #[tracing::instrument(skip(self, token, recipients))]
    pub async fn create_email_notification(
        &self,
        token: &str,
        name: &str,
        from_user_id: &str,
        recipients: &[String],
        subject: &str,
        content: &str,
    ) -> CrmResult<String> {
        let to_address: Vec<Value> = if recipients.is_empty() {
            // nobody configured: notify the token owner
            vec![json!({ "type": "user", "resource": { "id": from_user_id } })]
        } else {
            recipients
                .iter()
                .map(|email| json!({ "type": "email", "resource": { "email": email } }))
                .collect()
        };

        let payload = json!({
            "email_notifications": [{
                "name": name,
                "module": { "api_name": "Leads" },
                "from_address": { "type": "user", "resource": { "id": from_user_id } },
                "to_address": to_address,
                "subject": subject,
                "content": content,
            }]
        });

        let request = Self::authorize(
            self.client
                .post(self.url("/settings/automation/email_notifications")),
            token,
        )
        .json(&payload);

        let body: Value = Self::send(request).await?;
        let id = Self::first_result(body, "email_notifications")?;

        tracing::info!(name = %name, email_notification_id = %id, "Zoho email notification created");
        Ok(id)
    }

    /// Create a workflow rule firing `email_notification_id` when a Lead
    /// matching every criterion is created. Returns the rule id.
    #[tracing::instrument(skip(self, token, criteria))]
    pub async fn create_workflow_rule(
        &self,
        token: &str,
        name: &str,
        description: &str,
        email_notification_id: &str,
        criteria: Vec<Value>,
    ) -> CrmResult<String> {
        let payload = json!({
            "workflow_rules": [{
                "name": name,
                "description": description,
                "module": { "api_name": "Leads" },
                "execute_when": {
                    "type": "create",
                    "details": { "trigger_module": { "api_name": "Leads" } }
                },
                "conditions": [{
                    "sequence_number": 1,
                    "criteria_details": {
                        "criteria": {
                            "group_operator": "AND",
                            "group": criteria,
                        }
                    },
                    "instant_actions": {
                        "actions": [{
                            "type": "email_notifications",
                            "id": email_notification_id,
                        }]
                    }
                }]
            }]
        });

        let request = Self::authorize(
            self.client.post(self.url("/settings/automation/workflow_rules")),
            token,
        )
        .json(&payload);

        let body: Value = Self::send(request).await?;
        let id = Self::first_result(body, "workflow_rules")?;

        tracing::info!(name = %name, workflow_rule_id = %id, "Zoho workflow rule created");
        Ok(id)
    }

    /// Create a Lead record. Returns the CRM record id.
    #[tracing::instrument(skip(self, token, lead))]
    pub async fn create_lead(&self, token: &str, lead: Map<String, Value>) -> CrmResult<String> {
        let payload = json!({ "data": [Value::Object(lead)] });

        let request = Self::authorize(self.client.post(self.url("/Leads")), token).json(&payload);

        let body: Value = Self::send(request).await?;
        let id = Self::first_result(body, "data")?;

        tracing::info!(lead_id = %id, "Zoho lead created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> ZohoClient {
        ZohoClient::new(server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_current_user_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users")
            .match_query(Matcher::UrlEncoded("type".into(), "CurrentUser".into()))
            .match_header("authorization", "Zoho-oauthtoken tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"users":[{"id":"4150868000000225013","full_name":"CAS Admin"}]}"#)
            .create_async()
            .await;

        let id = client(&server).get_current_user_id("tok").await.unwrap();

        assert_eq!(id, "4150868000000225013");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_current_user_empty_list() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"users":[]}"#)
            .create_async()
            .await;

        let result = client(&server).get_current_user_id("tok").await;
        assert!(matches!(result, Err(CrmError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_create_lead_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/Leads")
            .match_header("authorization", "Zoho-oauthtoken tok")
            .match_body(Matcher::PartialJson(
                json!({ "data": [{ "Last_Name": "Lovelace" }] }),
            ))
            .with_status(201)
            .with_body(
                r#"{"data":[{"code":"SUCCESS","details":{"id":"555"},"message":"record added","status":"success"}]}"#,
            )
            .create_async()
            .await;

        let mut lead = Map::new();
        lead.insert("Last_Name".to_string(), json!("Lovelace"));

        let id = client(&server).create_lead("tok", lead).await.unwrap();

        assert_eq!(id, "555");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_lead_record_level_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/Leads")
            .with_status(200)
            .with_body(
                r#"{"data":[{"code":"MANDATORY_NOT_FOUND","details":{"api_name":"Last_Name"},"message":"required field not found","status":"error"}]}"#,
            )
            .create_async()
            .await;

        let result = client(&server).create_lead("tok", Map::new()).await;

        match result {
            Err(CrmError::Api { body, .. }) => assert!(body.contains("MANDATORY_NOT_FOUND")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/Leads")
            .with_status(429)
            .with_body(r#"{"code":"TOO_MANY_REQUESTS"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .create_lead("tok", Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrmError::Api { status: 429, .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_email_notification_defaults_to_current_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/settings/automation/email_notifications")
            .match_body(Matcher::PartialJson(json!({
                "email_notifications": [{
                    "to_address": [{ "type": "user", "resource": { "id": "42" } }]
                }]
            })))
            .with_status(201)
            .with_body(
                r#"{"email_notifications":[{"code":"SUCCESS","details":{"id":"900"},"status":"success"}]}"#,
            )
            .create_async()
            .await;

        let id = client(&server)
            .create_email_notification("tok", "Test", "42", &[], "Subject", "Body")
            .await
            .unwrap();

        assert_eq!(id, "900");
        mock.assert_async().await;
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ZohoClient::new("https://www.zohoapis.com/crm/v8/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url(), "https://www.zohoapis.com/crm/v8");
        assert_eq!(client.url("/Leads"), "https://www.zohoapis.com/crm/v8/Leads");
    }
}
