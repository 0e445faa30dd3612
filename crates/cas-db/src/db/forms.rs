use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};

use cas_core::models::{ContactMessage, ContactRequest, FormSubmission, PatientStory, StoryRequest};

use super::submission::{insert_submission, NewSubmission};

/// Contact messages and patient stories. Each insert also queues the
/// matching CRM submission in the same transaction.
#[derive(Clone)]
pub struct FormRepository {
    pool: PgPool,
}

impl FormRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, request, submission))]
    pub async fn create_contact_with_submission(
        &self,
        request: &ContactRequest,
        submission: NewSubmission,
    ) -> Result<(ContactMessage, FormSubmission)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for contact message")?;

        let submission = insert_submission(&mut *tx, &submission).await?;

        let message = sqlx::query_as::<Postgres, ContactMessage>(
            r#"
            INSERT INTO contact_messages (name, email, phone, subject, message, submission_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, phone, subject, message, submission_id, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.phone.as_deref())
        .bind(request.subject.as_deref())
        .bind(&request.message)
        .bind(submission.id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert contact message")?;

        tx.commit()
            .await
            .context("Failed to commit contact message transaction")?;

        tracing::info!(
            contact_id = %message.id,
            submission_id = %submission.id,
            "Contact message stored"
        );

        Ok((message, submission))
    }

    #[tracing::instrument(skip(self, request, submission))]
    pub async fn create_story_with_submission(
        &self,
        request: &StoryRequest,
        submission: NewSubmission,
    ) -> Result<(PatientStory, FormSubmission)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for patient story")?;

        let submission = insert_submission(&mut *tx, &submission).await?;

        let story = sqlx::query_as::<Postgres, PatientStory>(
            r#"
            INSERT INTO patient_stories (
                name, email, relationship, title, story, consent_to_share, submission_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, email, relationship, title, story, consent_to_share,
                      submission_id, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.relationship.as_deref())
        .bind(&request.title)
        .bind(&request.story)
        .bind(request.consent_to_share)
        .bind(submission.id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert patient story")?;

        tx.commit()
            .await
            .context("Failed to commit patient story transaction")?;

        tracing::info!(
            story_id = %story.id,
            submission_id = %submission.id,
            consent_to_share = story.consent_to_share,
            "Patient story stored"
        );

        Ok((story, submission))
    }
}
