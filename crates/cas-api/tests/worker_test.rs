//! Submission outbox integration tests: the worker against a mocked Zoho
//! CRM, and the claim, sweep and reaper queries it relies on.
//!
//! Run with: `cargo test -p cas-api --test worker_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use cas_core::models::{FormSubmission, ProcessingStatus, SyncStatus};
use cas_db::{NewSubmission, SubmissionRepository};
use helpers::{api_path, setup_test_app, setup_test_app_with_worker};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

const LEAD_CREATED: &str =
    r#"{"data":[{"code":"SUCCESS","details":{"id":"4150868000001"},"message":"record added","status":"success"}]}"#;

async fn submit_contact(app: &helpers::TestApp) -> Uuid {
    let response = app
        .client()
        .post(&api_path("/contact"))
        .json(&json!({
            "name": "Jane Patient",
            "email": "jane@example.ca",
            "message": "Is there a cardiac amyloidosis clinic in Calgary?"
        }))
        .await;
    assert_eq!(response.status_code(), 201, "contact form");
    let receipt: serde_json::Value = response.json();
    receipt["submissionId"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("submission id")
}

/// Poll until the worker has finished with the submission
async fn wait_until_settled(repository: &SubmissionRepository, id: Uuid) -> FormSubmission {
    for _ in 0..100 {
        let submission = repository
            .get_submission(id)
            .await
            .expect("Failed to load submission")
            .expect("submission exists");
        if matches!(
            submission.processing_status,
            ProcessingStatus::Completed | ProcessingStatus::Failed
        ) {
            return submission;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("submission {} was not processed in time", id);
}

fn new_submission(form_name: &str) -> NewSubmission {
    NewSubmission {
        form_name: form_name.to_string(),
        data: json!({ "firstName": "Pat", "lastName": "Lee", "email": "pat@example.ca" }),
        source_ip: None,
        max_retries: 3,
    }
}

/// Insert a row straight into the failed state so the worker never claims it
async fn insert_failed(pool: &sqlx::PgPool, retry_count: i32) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO form_submissions (
            form_name, data, processing_status, sync_status, retry_count, max_retries,
            last_error, next_retry_at
        )
        VALUES ('contact', '{}'::jsonb, 'failed', 'sync_failed', $1, 3,
                'Zoho API returned 503', NOW() - INTERVAL '1 minute')
        RETURNING id
        "#,
    )
    .bind(retry_count)
    .fetch_one(pool)
    .await
    .expect("Failed to insert failed submission")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_syncs_lead() {
    let mut crm = mockito::Server::new_async().await;
    let lead = crm
        .mock("POST", "/Leads")
        .match_header("authorization", "Zoho-oauthtoken test-token")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(LEAD_CREATED)
        .expect(1)
        .create_async()
        .await;

    let app = setup_test_app_with_worker(&crm.url(), Some("test-token")).await;
    let repository = SubmissionRepository::new(app.pool().clone());
    let id = submit_contact(&app).await;

    let submission = wait_until_settled(&repository, id).await;
    assert_eq!(submission.processing_status, ProcessingStatus::Completed);
    assert_eq!(submission.sync_status, SyncStatus::Synced);
    assert_eq!(submission.zoho_crm_id.as_deref(), Some("4150868000001"));
    assert!(submission.next_retry_at.is_none());
    assert!(submission.processed_at.is_some());
    lead.assert_async().await;

    // The outcome log lands just after the status update
    let mut logs = repository.list_logs(id).await.expect("logs");
    for _ in 0..20 {
        if logs.len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        logs = repository.list_logs(id).await.expect("logs");
    }
    let statuses: Vec<ProcessingStatus> = logs.iter().map(|l| l.status).collect();
    assert_eq!(
        statuses,
        vec![
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed
        ]
    );
    assert!(logs.iter().all(|l| l.attempt == 0), "first attempt is numbered 0");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_schedules_retry_when_crm_unavailable() {
    let mut crm = mockito::Server::new_async().await;
    let _lead = crm
        .mock("POST", "/Leads")
        .with_status(503)
        .with_body(r#"{"code":"SERVICE_UNAVAILABLE"}"#)
        .create_async()
        .await;

    let app = setup_test_app_with_worker(&crm.url(), Some("test-token")).await;
    let repository = SubmissionRepository::new(app.pool().clone());
    let id = submit_contact(&app).await;

    let failed = wait_until_settled(&repository, id).await;
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert_eq!(failed.sync_status, SyncStatus::SyncFailed);
    assert_eq!(failed.retry_count, 0);
    assert!(failed.next_retry_at.is_some(), "recoverable failure is rescheduled");
    assert!(failed.is_eligible_for_retry());
    assert!(failed.last_error.as_deref().unwrap_or_default().contains("503"));

    let exhausted = insert_failed(app.pool(), 3).await;

    // Make the scheduled retry due now
    sqlx::query("UPDATE form_submissions SET next_retry_at = NOW() - INTERVAL '1 second' WHERE id = $1")
        .bind(id)
        .execute(app.pool())
        .await
        .expect("Failed to backdate retry");

    let requeued = repository.requeue_due_retries(10).await.expect("sweep");
    assert_eq!(requeued.len(), 1, "only the submission with retries left");
    assert_eq!(requeued[0].id, id);
    assert_eq!(requeued[0].processing_status, ProcessingStatus::Pending);
    assert_eq!(requeued[0].retry_count, 1);
    assert!(requeued[0].next_retry_at.is_none());

    let untouched = repository
        .get_submission(exhausted)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(untouched.processing_status, ProcessingStatus::Failed);
    assert_eq!(untouched.retry_count, 3);
    assert!(!untouched.is_eligible_for_retry());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_fails_permanently_on_rejected_lead() {
    let mut crm = mockito::Server::new_async().await;
    let lead = crm
        .mock("POST", "/Leads")
        .with_status(400)
        .with_body(r#"{"code":"INVALID_DATA","message":"invalid data"}"#)
        .expect(1)
        .create_async()
        .await;

    let app = setup_test_app_with_worker(&crm.url(), Some("test-token")).await;
    let repository = SubmissionRepository::new(app.pool().clone());
    let id = submit_contact(&app).await;

    let failed = wait_until_settled(&repository, id).await;
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert_eq!(failed.sync_status, SyncStatus::SyncFailed);
    assert!(failed.next_retry_at.is_none(), "4xx is never retried");
    assert!(!failed.is_eligible_for_retry());
    lead.assert_async().await;

    let requeued = repository.requeue_due_retries(10).await.expect("sweep");
    assert!(requeued.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_without_token_fails_permanently() {
    let mut crm = mockito::Server::new_async().await;
    let lead = crm.mock("POST", "/Leads").expect(0).create_async().await;

    let app = setup_test_app_with_worker(&crm.url(), None).await;
    let repository = SubmissionRepository::new(app.pool().clone());
    let id = submit_contact(&app).await;

    let failed = wait_until_settled(&repository, id).await;
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert!(failed.next_retry_at.is_none());
    lead.assert_async().await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_claim_skips_locked_rows() {
    let app = setup_test_app().await;
    let repository = SubmissionRepository::new(app.pool().clone());

    let first = repository
        .create_submission(new_submission("contact"))
        .await
        .expect("create");
    let second = repository
        .create_submission(new_submission("stories"))
        .await
        .expect("create");

    // Another worker holds the oldest row
    let mut other = app.pool().begin().await.expect("begin");
    sqlx::query("SELECT id FROM form_submissions WHERE id = $1 FOR UPDATE")
        .bind(first.id)
        .execute(&mut *other)
        .await
        .expect("lock");

    let claimed = repository
        .claim_next_submission()
        .await
        .expect("claim")
        .expect("second row is free");
    assert_eq!(claimed.id, second.id);
    assert_eq!(claimed.processing_status, ProcessingStatus::Processing);
    assert!(claimed.started_at.is_some());

    assert!(repository.claim_next_submission().await.expect("claim").is_none());

    other.rollback().await.expect("rollback");

    let claimed = repository
        .claim_next_submission()
        .await
        .expect("claim")
        .expect("first row released");
    assert_eq!(claimed.id, first.id);

    let completed = repository
        .mark_completed(first.id, "lead-77")
        .await
        .expect("complete");
    assert_eq!(completed.sync_status, SyncStatus::Synced);
    assert_eq!(completed.zoho_crm_id.as_deref(), Some("lead-77"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reaper_fails_stale_processing() {
    let app = setup_test_app().await;
    let repository = SubmissionRepository::new(app.pool().clone());

    let with_retries = repository
        .create_submission(new_submission("contact"))
        .await
        .expect("create");
    let exhausted = repository
        .create_submission(new_submission("contact"))
        .await
        .expect("create");
    let fresh = repository
        .create_submission(new_submission("contact"))
        .await
        .expect("create");
    for _ in 0..3 {
        repository.claim_next_submission().await.expect("claim");
    }

    sqlx::query(
        r#"
        UPDATE form_submissions
        SET started_at = NOW() - INTERVAL '10 minutes',
            retry_count = CASE WHEN id = $2 THEN max_retries ELSE retry_count END
        WHERE id IN ($1, $2)
        "#,
    )
    .bind(with_retries.id)
    .bind(exhausted.id)
    .execute(app.pool())
    .await
    .expect("Failed to age submissions");

    let reaped = repository.reap_stale_processing(60).await.expect("reap");
    assert_eq!(reaped.len(), 2);

    let retried = reaped.iter().find(|s| s.id == with_retries.id).expect("reaped");
    assert_eq!(retried.processing_status, ProcessingStatus::Failed);
    assert!(retried.next_retry_at.is_some());
    assert_eq!(retried.last_error.as_deref(), Some("Processing timed out"));

    let dead = reaped.iter().find(|s| s.id == exhausted.id).expect("reaped");
    assert!(dead.next_retry_at.is_none());

    let still_running = repository
        .get_submission(fresh.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(still_running.processing_status, ProcessingStatus::Processing);

    let failed = repository
        .mark_failed(fresh.id, "Zoho API returned 400", None)
        .await
        .expect("fail");
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert!(failed.next_retry_at.is_none());
}
