//! HS256 session tokens
//!
//! A token is only a pointer to a session row: `jti` is the session id, so
//! logout and password changes revoke tokens by revoking the row.

use crate::auth::models::JwtClaims;
use cas_core::models::MemberRole;
use cas_core::AppError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Expiry for a session issued at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }

    pub fn issue(
        &self,
        member_id: Uuid,
        session_id: Uuid,
        role: MemberRole,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = JwtClaims {
            sub: member_id,
            jti: session_id,
            role: role.to_string(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Validate signature, `exp` and `nbf`
    pub fn decode(&self, token: &str) -> Result<JwtClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.leeway = 30;

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AppError::Unauthorized("Invalid or expired session token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-min-32-characters-long-for-testing";

    #[test]
    fn test_issue_and_decode() {
        let service = JwtService::new(SECRET, 24);
        let member_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let token = service
            .issue(member_id, session_id, MemberRole::Moderator, now, service.expires_at(now))
            .unwrap();

        let claims = service.decode(&token).unwrap();
        assert_eq!(claims.sub, member_id);
        assert_eq!(claims.jti, session_id);
        assert_eq!(claims.role, "moderator");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_rejects_expired_token() {
        let service = JwtService::new(SECRET, 1);
        let issued = Utc::now() - Duration::hours(3);
        let token = service
            .issue(
                Uuid::new_v4(),
                Uuid::new_v4(),
                MemberRole::Member,
                issued,
                issued + Duration::hours(1),
            )
            .unwrap();
        assert!(matches!(service.decode(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_rejects_other_secret() {
        let now = Utc::now();
        let token = JwtService::new(SECRET, 1)
            .issue(Uuid::new_v4(), Uuid::new_v4(), MemberRole::Admin, now, now + Duration::hours(1))
            .unwrap();
        let other = JwtService::new("another-secret-that-is-also-32-characters", 1);
        assert!(other.decode(&token).is_err());
    }
}
