use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use cas_core::models::{FormSubmission, Member, MemberRole, NewMember, ProfileUpdate};

use super::submission::{insert_submission, NewSubmission};

const MEMBER_COLUMNS: &str = r#"
    id,
    email,
    password_hash,
    first_name,
    last_name,
    discipline,
    institution,
    phone,
    role,
    cas_member,
    cann_member,
    newsletter_opt_in,
    event_notifications,
    research_updates,
    last_login_at,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a member from a membership application and queue the CRM
    /// submission in the same transaction. Returns `None` when the email is
    /// already registered.
    #[tracing::instrument(skip(self, member, submission), fields(email = %member.email))]
    pub async fn create_member_with_submission(
        &self,
        member: NewMember,
        submission: NewSubmission,
    ) -> Result<Option<(Member, FormSubmission)>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for membership")?;

        let sql = format!(
            r#"
            INSERT INTO members (
                email, password_hash, first_name, last_name, discipline, institution,
                phone, role, cas_member, cann_member, newsletter_opt_in,
                event_notifications, research_updates
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        );

        let created = sqlx::query_as::<Postgres, Member>(&sql)
            .bind(normalize_email(&member.email))
            .bind(&member.password_hash)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(member.discipline.as_deref())
            .bind(member.institution.as_deref())
            .bind(member.phone.as_deref())
            .bind(member.role)
            .bind(member.cas_member)
            .bind(member.cann_member)
            .bind(member.newsletter_opt_in)
            .bind(member.event_notifications)
            .bind(member.research_updates)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to insert member")?;

        let Some(created) = created else {
            tx.rollback().await.ok();
            tracing::debug!("Membership application for an existing email");
            return Ok(None);
        };

        let submission = insert_submission(&mut *tx, &submission).await?;

        tx.commit()
            .await
            .context("Failed to commit membership transaction")?;

        tracing::info!(
            member_id = %created.id,
            submission_id = %submission.id,
            cas_member = created.cas_member,
            cann_member = created.cann_member,
            "Member created"
        );

        Ok(Some((created, submission)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_member(&self, id: Uuid) -> Result<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE id = $1", MEMBER_COLUMNS);
        let member = sqlx::query_as::<Postgres, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch member")?;

        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE email = $1", MEMBER_COLUMNS);
        let member = sqlx::query_as::<Postgres, Member>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch member by email")?;

        Ok(member)
    }

    /// Apply a profile edit. Only fields present in `update` change, and an
    /// explicit null clears an optional field. The CAS/CANN membership flags
    /// are never touched here.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<Member>> {
        let sql = format!(
            r#"
            UPDATE members
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                discipline = CASE WHEN $4::boolean THEN $5::text ELSE discipline END,
                institution = CASE WHEN $6::boolean THEN $7::text ELSE institution END,
                phone = CASE WHEN $8::boolean THEN $9::text ELSE phone END,
                newsletter_opt_in = COALESCE($10, newsletter_opt_in),
                event_notifications = COALESCE($11, event_notifications),
                research_updates = COALESCE($12, research_updates),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        );

        let member = sqlx::query_as::<Postgres, Member>(&sql)
            .bind(id)
            .bind(update.first_name.as_deref())
            .bind(update.last_name.as_deref())
            .bind(update.discipline.is_some())
            .bind(update.discipline.clone().flatten())
            .bind(update.institution.is_some())
            .bind(update.institution.clone().flatten())
            .bind(update.phone.is_some())
            .bind(update.phone.clone().flatten())
            .bind(update.newsletter_opt_in)
            .bind(update.event_notifications)
            .bind(update.research_updates)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update member profile")?;

        if member.is_some() {
            tracing::info!(member_id = %id, "Member profile updated");
        }

        Ok(member)
    }

    #[tracing::instrument(skip(self, password_hash))]
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE members
            SET password_hash = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .context("Failed to update member password")?;

        if result.rows_affected() > 0 {
            tracing::info!(member_id = %id, "Member password changed");
        }

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE members SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record member login")?;

        Ok(())
    }

    /// Change a member's role (used when promoting moderators and admins)
    #[tracing::instrument(skip(self))]
    pub async fn set_role(&self, id: Uuid, role: MemberRole) -> Result<Option<Member>> {
        let sql = format!(
            r#"
            UPDATE members
            SET role = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        );
        let member = sqlx::query_as::<Postgres, Member>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update member role")?;

        if member.is_some() {
            tracing::info!(member_id = %id, role = %role, "Member role changed");
        }

        Ok(member)
    }
}

/// Emails are stored lowercased so lookups and the unique constraint are
/// case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.CA "), "ada@example.ca");
        assert_eq!(normalize_email("plain@cas.ca"), "plain@cas.ca");
    }
}
