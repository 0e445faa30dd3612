//! Public intake forms: contact, membership application, patient stories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Form names used to tag submissions created by the dedicated endpoints
pub const CONTACT_FORM: &str = "contact";
pub const MEMBERSHIP_FORM: &str = "membership";
pub const STORIES_FORM: &str = "stories";
pub const RESOURCES_FORM: &str = "resources";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub submission_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MembershipApplication {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::validate_password_strength"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub discipline: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub institution: Option<String>,
    #[serde(default)]
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[serde(default)]
    pub cas_member: bool,
    #[serde(default)]
    pub cann_member: bool,
    #[serde(default)]
    pub newsletter_opt_in: bool,
    #[serde(default)]
    pub event_notifications: bool,
    #[serde(default)]
    pub research_updates: bool,
}

impl MembershipApplication {
    /// Fields forwarded to the CRM. The password never leaves the server.
    pub fn crm_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "firstName": self.first_name,
            "lastName": self.last_name,
            "email": self.email,
            "phone": self.phone,
            "discipline": self.discipline,
            "institution": self.institution,
            "casMember": self.cas_member,
            "cannMember": self.cann_member,
            "newsletterOptIn": self.newsletter_opt_in,
            "eventNotifications": self.event_notifications,
            "researchUpdates": self.research_updates,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub relationship: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 20000, message = "Story must be 1-20000 characters"))]
    pub story: String,
    #[serde(default)]
    pub consent_to_share: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PatientStory {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub relationship: Option<String>,
    pub title: String,
    pub story: String,
    pub consent_to_share: bool,
    pub submission_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Returned by the public form endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormReceipt {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub message: String,
}
