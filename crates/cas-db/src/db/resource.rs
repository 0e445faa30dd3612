use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use cas_core::models::{FormSubmission, ModerationFilter, NewResource, Resource};

use super::submission::{insert_submission, NewSubmission};

const RESOURCE_COLUMNS: &str = r#"
    id,
    title,
    description,
    category,
    file_name,
    storage_key,
    content_type,
    file_size,
    submitted_by,
    submitter_name,
    submitter_email,
    is_approved,
    is_flagged,
    moderation_note,
    moderated_by,
    moderated_at,
    created_at,
    updated_at
"#;

#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an uploaded resource (unapproved, unflagged) and its CRM submission
    #[tracing::instrument(skip(self, resource, submission), fields(resource_id = %resource.id))]
    pub async fn create_resource_with_submission(
        &self,
        resource: NewResource,
        submission: NewSubmission,
    ) -> Result<(Resource, FormSubmission)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for resource")?;

        let sql = format!(
            r#"
            INSERT INTO resources (
                id, title, description, category, file_name, storage_key, content_type,
                file_size, submitted_by, submitter_name, submitter_email
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );

        let created = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(resource.id)
            .bind(&resource.title)
            .bind(resource.description.as_deref())
            .bind(resource.category.as_deref())
            .bind(&resource.file_name)
            .bind(&resource.storage_key)
            .bind(&resource.content_type)
            .bind(resource.file_size)
            .bind(resource.submitted_by)
            .bind(resource.submitter_name.as_deref())
            .bind(resource.submitter_email.as_deref())
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert resource")?;

        let submission = insert_submission(&mut *tx, &submission).await?;

        tx.commit()
            .await
            .context("Failed to commit resource transaction")?;

        tracing::info!(
            resource_id = %created.id,
            submission_id = %submission.id,
            file_size = created.file_size,
            "Resource uploaded, awaiting moderation"
        );

        Ok((created, submission))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let sql = format!("SELECT {} FROM resources WHERE id = $1", RESOURCE_COLUMNS);
        let resource = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch resource")?;

        Ok(resource)
    }

    /// Publicly visible resources
    #[tracing::instrument(skip(self))]
    pub async fn list_approved(
        &self,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Resource>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM resources
            WHERE is_approved = TRUE
                AND ($1::text IS NULL OR category = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            RESOURCE_COLUMNS
        );
        let resources = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(category)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list approved resources")?;

        Ok(resources)
    }

    /// The moderation queue, oldest first
    #[tracing::instrument(skip(self))]
    pub async fn list_moderation_queue(
        &self,
        filter: ModerationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Resource>> {
        let condition = match filter {
            ModerationFilter::Pending => "WHERE is_approved = FALSE",
            ModerationFilter::Flagged => "WHERE is_approved = FALSE AND is_flagged = TRUE",
            ModerationFilter::All => "",
        };
        let sql = format!(
            r#"
            SELECT {}
            FROM resources
            {}
            ORDER BY created_at ASC
            LIMIT $1 OFFSET $2
            "#,
            RESOURCE_COLUMNS, condition
        );
        let resources = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list moderation queue")?;

        Ok(resources)
    }

    /// Approve a resource. Approving twice leaves it approved; the flag is cleared.
    #[tracing::instrument(skip(self, note))]
    pub async fn approve(
        &self,
        id: Uuid,
        moderator: Uuid,
        note: Option<&str>,
    ) -> Result<Option<Resource>> {
        let sql = format!(
            r#"
            UPDATE resources
            SET is_approved = TRUE,
                is_flagged = FALSE,
                moderation_note = COALESCE($3, moderation_note),
                moderated_by = $2,
                moderated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );
        let resource = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(id)
            .bind(moderator)
            .bind(note)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to approve resource")?;

        if resource.is_some() {
            tracing::info!(resource_id = %id, moderator_id = %moderator, "Resource approved");
        }

        Ok(resource)
    }

    /// Set or clear the flag. Flagging withdraws a prior approval so the
    /// resource goes back to the queue.
    #[tracing::instrument(skip(self, note))]
    pub async fn set_flag(
        &self,
        id: Uuid,
        moderator: Uuid,
        flagged: bool,
        note: Option<&str>,
    ) -> Result<Option<Resource>> {
        let sql = format!(
            r#"
            UPDATE resources
            SET is_flagged = $3,
                is_approved = CASE WHEN $3 THEN FALSE ELSE is_approved END,
                moderation_note = COALESCE($4, moderation_note),
                moderated_by = $2,
                moderated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );
        let resource = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(id)
            .bind(moderator)
            .bind(flagged)
            .bind(note)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update resource flag")?;

        if resource.is_some() {
            tracing::info!(
                resource_id = %id,
                moderator_id = %moderator,
                flagged = flagged,
                "Resource flag updated"
            );
        }

        Ok(resource)
    }

    /// Update moderation note and descriptive fields; absent values are kept
    #[tracing::instrument(skip(self))]
    pub async fn update_metadata(
        &self,
        id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        category: Option<&str>,
        note: Option<&str>,
    ) -> Result<Option<Resource>> {
        let sql = format!(
            r#"
            UPDATE resources
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                moderation_note = COALESCE($5, moderation_note),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );
        let resource = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(id)
            .bind(title)
            .bind(description)
            .bind(category)
            .bind(note)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update resource")?;

        Ok(resource)
    }

    /// Delete a resource row and return it so the caller can remove the file
    #[tracing::instrument(skip(self))]
    pub async fn delete_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let sql = format!("DELETE FROM resources WHERE id = $1 RETURNING {}", RESOURCE_COLUMNS);
        let resource = sqlx::query_as::<Postgres, Resource>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to delete resource")?;

        if resource.is_some() {
            tracing::info!(resource_id = %id, "Resource deleted");
        }

        Ok(resource)
    }
}
