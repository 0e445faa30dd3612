use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Uploaded educational resource and its moderation state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub submitted_by: Option<Uuid>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub is_approved: bool,
    pub is_flagged: bool,
    pub moderation_note: Option<String>,
    pub moderated_by: Option<Uuid>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Whether the resource is still waiting for a moderator decision
    pub fn in_moderation_queue(&self) -> bool {
        !self.is_approved
    }
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub submitted_by: Option<Uuid>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub submitter_name: Option<String>,
    pub is_approved: bool,
    pub is_flagged: bool,
    pub moderation_note: Option<String>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceResponse {
    pub fn from_resource(resource: Resource, api_prefix: &str) -> Self {
        ResourceResponse {
            download_url: format!("{}/resources/{}/file", api_prefix, resource.id),
            id: resource.id,
            title: resource.title,
            description: resource.description,
            category: resource.category,
            file_name: resource.file_name,
            content_type: resource.content_type,
            file_size: resource.file_size,
            submitter_name: resource.submitter_name,
            is_approved: resource.is_approved,
            is_flagged: resource.is_flagged,
            moderation_note: resource.moderation_note,
            moderated_at: resource.moderated_at,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Flag,
    Unflag,
}

/// Moderator update of a resource: an optional decision plus metadata edits
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub action: Option<ModerationAction>,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Moderation note must be at most 2000 characters"))]
    pub moderation_note: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: Option<String>,
}

impl UpdateResourceRequest {
    pub fn has_metadata_changes(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.category.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModerationFilter {
    /// Every unapproved resource
    #[default]
    Pending,
    /// Unapproved resources a moderator flagged
    Flagged,
    /// Everything, approved or not
    All,
}
