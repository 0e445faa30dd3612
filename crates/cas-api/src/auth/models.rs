use crate::error::ErrorResponse;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use cas_core::models::{Member, MemberRole};
use cas_core::AppError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid,    // member_id
    pub jti: Uuid,    // session_id
    pub role: String, // "member", "moderator" or "admin"
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Authenticated member, resolved from the bearer token and stored in request extensions
#[derive(Debug, Clone)]
pub struct MemberContext {
    pub session_id: Uuid,
    pub member: Member,
}

impl MemberContext {
    pub fn member_id(&self) -> Uuid {
        self.member.id
    }

    /// Role from the member row, so promotions apply to live sessions
    pub fn role(&self) -> MemberRole {
        self.member.role
    }

    pub fn require_moderator(&self) -> Result<(), AppError> {
        if self.role().can_moderate() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Moderator role required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role().is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }
}

// Extension cannot be used with Multipart, so we extract directly from request parts
impl<S> FromRequestParts<S> for MemberContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<MemberContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(
                        ErrorResponse::new("Missing member session", "MISSING_MEMBER_CONTEXT")
                            .with_suggested_action("Sign in and send the session token"),
                    ),
                )
            })
    }
}

/// Routes behind the optional auth layer see `None` for anonymous callers
impl<S> OptionalFromRequestParts<S> for MemberContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<MemberContext>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(role: MemberRole) -> MemberContext {
        let now = Utc::now();
        MemberContext {
            session_id: Uuid::new_v4(),
            member: Member {
                id: Uuid::new_v4(),
                email: "ada@example.ca".to_string(),
                password_hash: String::new(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                discipline: None,
                institution: None,
                phone: None,
                role,
                cas_member: true,
                cann_member: false,
                newsletter_opt_in: false,
                event_notifications: false,
                research_updates: false,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn test_role_guards() {
        assert!(context(MemberRole::Member).require_moderator().is_err());
        assert!(context(MemberRole::Moderator).require_moderator().is_ok());
        assert!(context(MemberRole::Moderator).require_admin().is_err());
        assert!(context(MemberRole::Admin).require_moderator().is_ok());
        assert!(context(MemberRole::Admin).require_admin().is_ok());
    }
}
