use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "member_role", rename_all = "lowercase")
)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    Moderator,
    Admin,
}

impl MemberRole {
    /// Moderators review uploaded resources; admins can do everything moderators can.
    pub fn can_moderate(&self) -> bool {
        matches!(self, MemberRole::Moderator | MemberRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }
}

impl Display for MemberRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MemberRole::Member => write!(f, "member"),
            MemberRole::Moderator => write!(f, "moderator"),
            MemberRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for MemberRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(MemberRole::Member),
            "moderator" => Ok(MemberRole::Moderator),
            "admin" => Ok(MemberRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid member role: {}", s)),
        }
    }
}

/// Member account row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Member {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub discipline: Option<String>,
    pub institution: Option<String>,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub cas_member: bool,
    pub cann_member: bool,
    pub newsletter_opt_in: bool,
    pub event_notifications: bool,
    pub research_updates: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Session backing an issued JWT (the token's `jti`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MemberSession {
    pub id: Uuid,
    pub member_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl MemberSession {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}

/// Values needed to insert a member; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub discipline: Option<String>,
    pub institution: Option<String>,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub cas_member: bool,
    pub cann_member: bool,
    pub newsletter_opt_in: bool,
    pub event_notifications: bool,
    pub research_updates: bool,
}

/// Public view of a member (portal profile, `/auth/me`)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub discipline: Option<String>,
    pub institution: Option<String>,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub cas_member: bool,
    pub cann_member: bool,
    pub newsletter_opt_in: bool,
    pub event_notifications: bool,
    pub research_updates: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Member> for MemberProfile {
    fn from(member: Member) -> Self {
        MemberProfile {
            id: member.id,
            email: member.email,
            first_name: member.first_name,
            last_name: member.last_name,
            discipline: member.discipline,
            institution: member.institution,
            phone: member.phone,
            role: member.role,
            cas_member: member.cas_member,
            cann_member: member.cann_member,
            newsletter_opt_in: member.newsletter_opt_in,
            event_notifications: member.event_notifications,
            research_updates: member.research_updates,
            last_login_at: member.last_login_at,
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

/// Outer `None` when the field is absent, `Some(None)` for an explicit `null`
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Profile edit. Absent fields keep their stored value; `null` clears
/// `discipline`, `institution` and `phone`. Membership flags are not part of
/// this payload and are ignored if a client sends them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 200, message = "Discipline must be at most 200 characters"))]
    pub discipline: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 200, message = "Institution must be at most 200 characters"))]
    pub institution: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 40, message = "Phone must be at most 40 characters"))]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub newsletter_opt_in: Option<bool>,
    #[serde(default)]
    pub event_notifications: Option<bool>,
    #[serde(default)]
    pub research_updates: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.discipline.is_none()
            && self.institution.is_none()
            && self.phone.is_none()
            && self.newsletter_opt_in.is_none()
            && self.event_notifications.is_none()
            && self.research_updates.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom(function = "crate::validation::validate_password_strength"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub member: MemberProfile,
}
