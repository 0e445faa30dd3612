//! Provisioning of the three Lead notification workflows.
//!
//! Each workflow is an email notification action plus a workflow rule that
//! fires it when a Lead whose `Lead_Source` matches every condition is
//! created. Workflows are provisioned one after another; a failure is
//! recorded against its workflow and the next one is still attempted.

use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use cas_core::CrmConfig;

use crate::client::ZohoClient;
use crate::error::CrmResult;
use crate::token::AccessTokenProvider;

pub const CAS_MEMBERSHIP_WORKFLOW: &str = "CAS Membership Notification";
pub const CANN_MEMBERSHIP_WORKFLOW: &str = "CANN Membership Notification";
pub const GENERAL_INQUIRY_WORKFLOW: &str = "General Inquiry Notification";

const LEAD_SOURCE_FIELD: &str = "Lead_Source";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Contains,
    NotContains,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Contains => "contains",
            Comparator::NotContains => "not_contains",
        }
    }
}

/// One `Lead_Source` condition of a workflow rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadSourceCondition {
    pub comparator: Comparator,
    pub value: String,
}

impl LeadSourceCondition {
    pub fn contains(value: &str) -> Self {
        Self {
            comparator: Comparator::Contains,
            value: value.to_string(),
        }
    }

    pub fn not_contains(value: &str) -> Self {
        Self {
            comparator: Comparator::NotContains,
            value: value.to_string(),
        }
    }

    /// Criterion entry in the shape the workflow rule API expects
    pub fn to_criterion(&self) -> Value {
        json!({
            "comparator": self.comparator.as_str(),
            "field": { "api_name": LEAD_SOURCE_FIELD },
            "value": self.value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub name: String,
    pub description: String,
    pub subject: String,
    pub recipients: Vec<String>,
    /// AND-combined
    pub conditions: Vec<LeadSourceCondition>,
}

impl WorkflowConfig {
    fn criteria(&self) -> Vec<Value> {
        self.conditions
            .iter()
            .enumerate()
            .map(|(index, condition)| {
                let mut criterion = condition.to_criterion();
                criterion["sequence_number"] = json!(index + 1);
                criterion
            })
            .collect()
    }

    fn email_content(&self) -> String {
        format!(
            "A new lead has been created from the website.<br><br>\
             Name: ${{Leads.First Name}} ${{Leads.Last Name}}<br>\
             Email: ${{Leads.Email}}<br>\
             Lead Source: ${{Leads.Lead Source}}<br><br>{}",
            self.description
        )
    }
}

/// The three notification workflows, with recipients from configuration
pub fn default_workflows(config: &CrmConfig) -> Vec<WorkflowConfig> {
    vec![
        WorkflowConfig {
            name: CAS_MEMBERSHIP_WORKFLOW.to_string(),
            description: "Notifies the CAS membership team of new CAS membership applications"
                .to_string(),
            subject: "New CAS membership application".to_string(),
            recipients: config.notify_cas_emails.clone(),
            conditions: vec![
                LeadSourceCondition::contains("Membership"),
                LeadSourceCondition::not_contains("CANN"),
            ],
        },
        WorkflowConfig {
            name: CANN_MEMBERSHIP_WORKFLOW.to_string(),
            description: "Notifies the CANN coordinators of new CANN membership applications"
                .to_string(),
            subject: "New CANN membership application".to_string(),
            recipients: config.notify_cann_emails.clone(),
            conditions: vec![LeadSourceCondition::contains("CANN")],
        },
        WorkflowConfig {
            name: GENERAL_INQUIRY_WORKFLOW.to_string(),
            description: "Notifies the CAS office of website inquiries and submissions"
                .to_string(),
            subject: "New website inquiry".to_string(),
            recipients: config.notify_general_emails.clone(),
            conditions: vec![
                LeadSourceCondition::contains("Website"),
                LeadSourceCondition::not_contains("Membership"),
            ],
        },
    ]
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWorkflow {
    pub workflow: String,
    pub email_notification_id: String,
    pub workflow_rule_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct WorkflowError {
    pub workflow: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ProvisioningResult {
    pub created: Vec<CreatedWorkflow>,
    pub errors: Vec<WorkflowError>,
}

impl ProvisioningResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Create every workflow in `workflows`, strictly in order.
///
/// A missing token or an unresolvable current user is returned as an error
/// before any workflow is attempted. Per-workflow failures end up in
/// [`ProvisioningResult::errors`].
#[tracing::instrument(skip_all, fields(workflows = workflows.len()))]
pub async fn provision_workflows(
    client: &ZohoClient,
    tokens: &dyn AccessTokenProvider,
    workflows: &[WorkflowConfig],
) -> CrmResult<ProvisioningResult> {
    let token = tokens.access_token().await?;
    let user_id = client.get_current_user_id(&token).await?;

    let mut result = ProvisioningResult::default();

    for workflow in workflows {
        match provision_one(client, &token, &user_id, workflow).await {
            Ok(created) => result.created.push(created),
            Err(e) => {
                tracing::warn!(workflow = %workflow.name, error = %e, "Workflow provisioning failed");
                result.errors.push(WorkflowError {
                    workflow: workflow.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        created = result.created.len(),
        failed = result.errors.len(),
        "Workflow provisioning finished"
    );

    Ok(result)
}

async fn provision_one(
    client: &ZohoClient,
    token: &str,
    user_id: &str,
    workflow: &WorkflowConfig,
) -> CrmResult<CreatedWorkflow> {
    let email_notification_id = client
        .create_email_notification(
            token,
            &workflow.name,
            user_id,
            &workflow.recipients,
            &workflow.subject,
            &workflow.email_content(),
        )
        .await?;

    let workflow_rule_id = client
        .create_workflow_rule(
            token,
            &workflow.name,
            &workflow.description,
            &email_notification_id,
            workflow.criteria(),
        )
        .await?;

    Ok(CreatedWorkflow {
        workflow: workflow.name.clone(),
        email_notification_id,
        workflow_rule_id,
    })
}
