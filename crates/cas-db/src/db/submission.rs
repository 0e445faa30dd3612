use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

use cas_core::models::{
    FormCount, FormSubmission, ProcessingStatus, SubmissionLog, SubmissionStats,
};

const SUBMISSION_COLUMNS: &str = r#"
    id,
    form_name,
    data,
    source_ip,
    processing_status,
    sync_status,
    retry_count,
    max_retries,
    zoho_crm_id,
    last_error,
    next_retry_at,
    started_at,
    processed_at,
    created_at,
    updated_at
"#;

/// Values for a new outbox row
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_name: String,
    pub data: serde_json::Value,
    pub source_ip: Option<String>,
    pub max_retries: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionListQuery {
    pub status: Option<ProcessingStatus>,
    pub form_name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Insert a pending submission plus its "received" log entry on an existing
/// connection, so callers can bundle it with their own rows in a transaction.
pub(crate) async fn insert_submission(
    conn: &mut PgConnection,
    new: &NewSubmission,
) -> Result<FormSubmission> {
    let sql = format!(
        r#"
        INSERT INTO form_submissions (form_name, data, source_ip, max_retries)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        SUBMISSION_COLUMNS
    );

    let submission = sqlx::query_as::<Postgres, FormSubmission>(&sql)
        .bind(&new.form_name)
        .bind(&new.data)
        .bind(new.source_ip.as_deref())
        .bind(new.max_retries)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert form submission")?;

    sqlx::query(
        r#"
        INSERT INTO submission_logs (submission_id, attempt, status, message)
        VALUES ($1, 0, 'pending', 'Submission received')
        "#,
    )
    .bind(submission.id)
    .execute(&mut *conn)
    .await
    .context("Failed to insert submission log")?;

    Ok(submission)
}

#[derive(Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a generic form payload with `pending` status
    #[tracing::instrument(skip(self, new), fields(form_name = %new.form_name))]
    pub async fn create_submission(&self, new: NewSubmission) -> Result<FormSubmission> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for submission")?;

        let submission = insert_submission(&mut *tx, &new).await?;

        tx.commit()
            .await
            .context("Failed to commit submission transaction")?;

        tracing::info!(
            submission_id = %submission.id,
            form_name = %submission.form_name,
            "Submission stored"
        );

        Ok(submission)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_submission(&self, id: Uuid) -> Result<Option<FormSubmission>> {
        let sql = format!(
            "SELECT {} FROM form_submissions WHERE id = $1",
            SUBMISSION_COLUMNS
        );
        let submission = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch submission")?;

        Ok(submission)
    }

    /// List submissions with optional filters, newest first
    #[tracing::instrument(skip(self))]
    pub async fn list_submissions(&self, query: SubmissionListQuery) -> Result<Vec<FormSubmission>> {
        let limit = query.limit.unwrap_or(50).clamp(1, 500);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut sql = format!("SELECT {} FROM form_submissions WHERE 1 = 1", SUBMISSION_COLUMNS);
        let mut bind_count = 1;

        if query.status.is_some() {
            sql.push_str(&format!(" AND processing_status = ${}", bind_count));
            bind_count += 1;
        }
        if query.form_name.is_some() {
            sql.push_str(&format!(" AND form_name = ${}", bind_count));
            bind_count += 1;
        }
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            bind_count,
            bind_count + 1
        ));

        let mut query_builder = sqlx::query_as::<Postgres, FormSubmission>(&sql);
        if let Some(status) = query.status {
            query_builder = query_builder.bind(status);
        }
        if let Some(form_name) = query.form_name {
            query_builder = query_builder.bind(form_name);
        }

        let submissions = query_builder
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list submissions")?;

        Ok(submissions)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_logs(&self, submission_id: Uuid) -> Result<Vec<SubmissionLog>> {
        let logs = sqlx::query_as::<Postgres, SubmissionLog>(
            r#"
            SELECT id, submission_id, attempt, status, message, details, created_at
            FROM submission_logs
            WHERE submission_id = $1
            ORDER BY created_at ASC, attempt ASC
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch submission logs")?;

        Ok(logs)
    }

    /// Append one processing-attempt record
    #[tracing::instrument(skip(self, message, details))]
    pub async fn append_log(
        &self,
        submission_id: Uuid,
        attempt: i32,
        status: ProcessingStatus,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<SubmissionLog> {
        let log = sqlx::query_as::<Postgres, SubmissionLog>(
            r#"
            INSERT INTO submission_logs (submission_id, attempt, status, message, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, submission_id, attempt, status, message, details, created_at
            "#,
        )
        .bind(submission_id)
        .bind(attempt)
        .bind(status)
        .bind(message)
        .bind(details)
        .fetch_one(&self.pool)
        .await
        .context("Failed to append submission log")?;

        Ok(log)
    }

    /// Atomically claim the oldest pending submission and mark it `processing`.
    /// Uses FOR UPDATE SKIP LOCKED so several workers can share the table.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_submission(&self) -> Result<Option<FormSubmission>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let next: Option<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT id
            FROM form_submissions
            WHERE processing_status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch next submission")?;

        let Some(id) = next else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'processing',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let claimed = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to update submission status")?;

        tx.commit().await.context("Failed to commit transaction")?;

        tracing::debug!(
            submission_id = %claimed.id,
            form_name = %claimed.form_name,
            retry_count = claimed.retry_count,
            "Submission claimed"
        );

        Ok(Some(claimed))
    }

    /// Mark a submission synced with the CRM record id
    #[tracing::instrument(skip(self))]
    pub async fn mark_completed(&self, id: Uuid, zoho_crm_id: &str) -> Result<FormSubmission> {
        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'completed',
                sync_status = 'synced',
                zoho_crm_id = $2,
                last_error = NULL,
                next_retry_at = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let submission = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(id)
            .bind(zoho_crm_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark submission as completed")?;

        tracing::info!(
            submission_id = %id,
            zoho_crm_id = %zoho_crm_id,
            "Submission synced to CRM"
        );

        Ok(submission)
    }

    /// Mark a submission failed. `next_retry_at = None` means it will never be
    /// picked up by the retry sweep.
    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<FormSubmission> {
        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'failed',
                sync_status = 'sync_failed',
                last_error = $2,
                next_retry_at = $3,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let submission = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(id)
            .bind(error)
            .bind(next_retry_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark submission as failed")?;

        tracing::warn!(
            submission_id = %id,
            retry_count = submission.retry_count,
            max_retries = submission.max_retries,
            retry_scheduled = next_retry_at.is_some(),
            "Submission failed"
        );

        Ok(submission)
    }

    /// Move failed submissions whose retry time has come back to `pending`,
    /// bumping their retry count. Submissions at the ceiling are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn requeue_due_retries(&self, limit: i64) -> Result<Vec<FormSubmission>> {
        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'pending',
                retry_count = retry_count + 1,
                next_retry_at = NULL,
                started_at = NULL,
                updated_at = NOW()
            WHERE id IN (
                SELECT id
                FROM form_submissions
                WHERE processing_status = 'failed'
                    AND next_retry_at IS NOT NULL
                    AND next_retry_at <= NOW()
                    AND retry_count < max_retries
                ORDER BY next_retry_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let requeued = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to requeue submissions for retry")?;

        for submission in &requeued {
            tracing::info!(
                submission_id = %submission.id,
                retry_count = submission.retry_count,
                max_retries = submission.max_retries,
                "Submission retry scheduled"
            );
        }

        Ok(requeued)
    }

    /// Manually put a failed submission back in the queue
    #[tracing::instrument(skip(self))]
    pub async fn requeue_submission(&self, id: Uuid) -> Result<Option<FormSubmission>> {
        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'pending',
                next_retry_at = NULL,
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND processing_status = 'failed'
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let submission = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to requeue submission")?;

        if let Some(ref s) = submission {
            tracing::info!(submission_id = %s.id, "Submission manually requeued");
        }

        Ok(submission)
    }

    /// Fail submissions stuck in `processing` (worker crashed mid-attempt).
    /// Ones with retries left are made due immediately.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_processing(&self, stale_after_secs: i64) -> Result<Vec<FormSubmission>> {
        let sql = format!(
            r#"
            UPDATE form_submissions
            SET processing_status = 'failed',
                sync_status = 'sync_failed',
                last_error = 'Processing timed out',
                next_retry_at = CASE WHEN retry_count < max_retries THEN NOW() ELSE NULL END,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE processing_status = 'processing'
                AND started_at < NOW() - ($1::float8 * INTERVAL '1 second')
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let reaped = sqlx::query_as::<Postgres, FormSubmission>(&sql)
            .bind(stale_after_secs as f64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to reap stale submissions")?;

        if !reaped.is_empty() {
            tracing::warn!(count = reaped.len(), "Reaped stale processing submissions");
        }

        Ok(reaped)
    }

    /// Aggregated outbox statistics. `max_retries` and `in_flight` are filled
    /// in by the caller.
    #[tracing::instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<SubmissionStats> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE processing_status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE processing_status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE processing_status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE processing_status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE sync_status = 'not_synced') AS not_synced,
                COUNT(*) FILTER (WHERE sync_status = 'synced') AS synced,
                COUNT(*) FILTER (WHERE sync_status = 'sync_failed') AS sync_failed,
                COUNT(*) FILTER (
                    WHERE processing_status = 'failed'
                        AND next_retry_at IS NOT NULL
                        AND retry_count < max_retries
                ) AS eligible_for_retry,
                COUNT(*) FILTER (
                    WHERE processing_status = 'failed'
                        AND retry_count >= max_retries
                ) AS exhausted_retries
            FROM form_submissions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch submission stats")?;

        let by_form = sqlx::query(
            r#"
            SELECT form_name, COUNT(*) AS count
            FROM form_submissions
            GROUP BY form_name
            ORDER BY count DESC, form_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch submission counts by form")?
        .into_iter()
        .map(|r| FormCount {
            form_name: r.get("form_name"),
            count: r.get::<Option<i64>, _>("count").unwrap_or(0),
        })
        .collect();

        let count = |name: &str| row.get::<Option<i64>, _>(name).unwrap_or(0);

        Ok(SubmissionStats {
            total: count("total"),
            pending: count("pending"),
            processing: count("processing"),
            completed: count("completed"),
            failed: count("failed"),
            not_synced: count("not_synced"),
            synced: count("synced"),
            sync_failed: count("sync_failed"),
            eligible_for_retry: count("eligible_for_retry"),
            exhausted_retries: count("exhausted_retries"),
            max_retries: 0,
            in_flight: 0,
            by_form,
        })
    }
}
