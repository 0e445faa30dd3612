use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use cas_core::models::MemberSession;

/// Server-side record of issued member tokens, used for logout and
/// revocation after a password change.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_session(
        &self,
        member_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<MemberSession> {
        let session = sqlx::query_as::<Postgres, MemberSession>(
            r#"
            INSERT INTO member_sessions (id, member_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, member_id, created_at, expires_at, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(member_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create member session")?;

        tracing::debug!(session_id = %session.id, member_id = %member_id, "Session created");

        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_session(&self, id: Uuid) -> Result<Option<MemberSession>> {
        let session = sqlx::query_as::<Postgres, MemberSession>(
            r#"
            SELECT id, member_id, created_at, expires_at, revoked_at
            FROM member_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member session")?;

        Ok(session)
    }

    /// Revoke one session. Returns false when it was unknown or already revoked.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_session(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE member_sessions
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to revoke member session")?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active session of a member except `keep`
    #[tracing::instrument(skip(self))]
    pub async fn revoke_other_sessions(&self, member_id: Uuid, keep: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE member_sessions
            SET revoked_at = NOW()
            WHERE member_id = $1 AND id <> $2 AND revoked_at IS NULL
            "#,
        )
        .bind(member_id)
        .bind(keep)
        .execute(&self.pool)
        .await
        .context("Failed to revoke member sessions")?;

        if result.rows_affected() > 0 {
            tracing::info!(
                member_id = %member_id,
                revoked = result.rows_affected(),
                "Revoked other member sessions"
            );
        }

        Ok(result.rows_affected())
    }

    /// Delete sessions that expired more than a day ago
    #[tracing::instrument(skip(self))]
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM member_sessions WHERE expires_at < NOW() - INTERVAL '1 day'",
        )
        .execute(&self.pool)
        .await
        .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected())
    }
}
