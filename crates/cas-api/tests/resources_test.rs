//! Resource upload and moderation integration tests.
//!
//! Run with: `cargo test -p cas-api --test resources_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use cas_core::models::MemberRole;
use helpers::auth::{register_test_member, register_with_role, TestMember};
use helpers::fixtures::{create_minimal_pdf, resource_form};
use helpers::{api_path, setup_test_app, TestApp, TEST_MAX_UPLOAD_BYTES};
use serde_json::json;

async fn upload(app: &TestApp, member: &TestMember, title: &str) -> serde_json::Value {
    let response = app
        .client()
        .post(&api_path("/resources"))
        .add_header("Authorization", member.bearer())
        .multipart(resource_form(title, "guide.pdf", create_minimal_pdf()))
        .await;
    assert_eq!(response.status_code(), 201, "upload resource");
    response.json()
}

fn ids(list: &serde_json::Value) -> Vec<String> {
    list.as_array()
        .expect("array response")
        .iter()
        .filter_map(|r| r["id"].as_str().map(String::from))
        .collect()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upload_starts_unapproved_and_hidden() {
    let app = setup_test_app().await;
    let client = app.client();
    let member = register_test_member(client, "uploader@example.ca").await;

    let created = upload(&app, &member, "Newly diagnosed guide").await;
    assert_eq!(created["isApproved"], false);
    assert_eq!(created["isFlagged"], false);
    assert_eq!(created["fileName"], "guide.pdf");
    let id = created["id"].as_str().expect("id").to_string();

    let public: serde_json::Value = client.get(&api_path("/resources")).await.json();
    assert!(!ids(&public).contains(&id), "unapproved resources are not listed");

    let anonymous = client.get(&api_path(&format!("/resources/{}", id))).await;
    assert_eq!(anonymous.status_code(), 404);

    let download = client.get(&api_path(&format!("/resources/{}/file", id))).await;
    assert_eq!(download.status_code(), 404);

    let submission_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM form_submissions WHERE form_name = 'resources'")
            .fetch_one(app.pool())
            .await
            .expect("count submissions");
    assert_eq!(submission_count, 1, "upload queues a CRM submission");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upload_requires_session() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/resources"))
        .multipart(resource_form("Guide", "guide.pdf", create_minimal_pdf()))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upload_rejects_disallowed_extension_and_oversized_file() {
    let app = setup_test_app().await;
    let member = register_test_member(app.client(), "bad-upload@example.ca").await;

    let exe = app
        .client()
        .post(&api_path("/resources"))
        .add_header("Authorization", member.bearer())
        .multipart(resource_form("Installer", "setup.exe", vec![0x4d, 0x5a]))
        .await;
    assert_eq!(exe.status_code(), 400);

    let oversized = app
        .client()
        .post(&api_path("/resources"))
        .add_header("Authorization", member.bearer())
        .multipart(resource_form(
            "Huge",
            "huge.pdf",
            vec![b'a'; TEST_MAX_UPLOAD_BYTES + 1],
        ))
        .await;
    assert_eq!(oversized.status_code(), 413);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources")
        .fetch_one(app.pool())
        .await
        .expect("count resources");
    assert_eq!(stored, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_moderation_requires_moderator() {
    let app = setup_test_app().await;
    let member = register_test_member(app.client(), "member@example.ca").await;
    let created = upload(&app, &member, "Guide").await;
    let id = created["id"].as_str().expect("id");

    let queue = app
        .client()
        .get(&api_path("/resources/moderation"))
        .add_header("Authorization", member.bearer())
        .await;
    assert_eq!(queue.status_code(), 403);

    let approve = app
        .client()
        .put(&api_path(&format!("/resources/{}", id)))
        .add_header("Authorization", member.bearer())
        .json(&json!({ "action": "approve" }))
        .await;
    assert_eq!(approve.status_code(), 403);

    let own_view = app
        .client()
        .get(&api_path(&format!("/resources/{}", id)))
        .add_header("Authorization", member.bearer())
        .await;
    assert_eq!(own_view.status_code(), 404, "members cannot see the queue");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_approve_is_idempotent_and_publishes() {
    let app = setup_test_app().await;
    let client = app.client();
    let member = register_test_member(client, "author@example.ca").await;
    let moderator =
        register_with_role(client, app.pool(), "mod@example.ca", MemberRole::Moderator).await;

    let created = upload(&app, &member, "Treatment options").await;
    let id = created["id"].as_str().expect("id").to_string();

    let queue: serde_json::Value = client
        .get(&api_path("/resources/moderation"))
        .add_header("Authorization", moderator.bearer())
        .await
        .json();
    assert!(ids(&queue).contains(&id));

    for _ in 0..2 {
        let approved = client
            .put(&api_path(&format!("/resources/{}", id)))
            .add_header("Authorization", moderator.bearer())
            .json(&json!({ "action": "approve", "moderationNote": "Reviewed" }))
            .await;
        assert_eq!(approved.status_code(), 200);
        let body: serde_json::Value = approved.json();
        assert_eq!(body["isApproved"], true);
        assert_eq!(body["moderationNote"], "Reviewed");
    }

    let public: serde_json::Value = client.get(&api_path("/resources")).await.json();
    assert_eq!(ids(&public), vec![id.clone()]);

    let queue: serde_json::Value = client
        .get(&api_path("/resources/moderation"))
        .add_header("Authorization", moderator.bearer())
        .await
        .json();
    assert!(!ids(&queue).contains(&id), "approved resources leave the queue");

    let download = client.get(&api_path(&format!("/resources/{}/file", id))).await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(download.as_bytes().to_vec(), create_minimal_pdf());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_flag_withdraws_approval() {
    let app = setup_test_app().await;
    let client = app.client();
    let moderator =
        register_with_role(client, app.pool(), "flagger@example.ca", MemberRole::Moderator).await;

    let created = upload(&app, &moderator, "Outdated guide").await;
    let id = created["id"].as_str().expect("id").to_string();
    let path = api_path(&format!("/resources/{}", id));

    client
        .put(&path)
        .add_header("Authorization", moderator.bearer())
        .json(&json!({ "action": "approve" }))
        .await;

    let flagged = client
        .put(&path)
        .add_header("Authorization", moderator.bearer())
        .json(&json!({ "action": "flag", "moderationNote": "Needs citation" }))
        .await;
    assert_eq!(flagged.status_code(), 200);
    let body: serde_json::Value = flagged.json();
    assert_eq!(body["isFlagged"], true);
    assert_eq!(body["isApproved"], false);

    let flagged_queue: serde_json::Value = client
        .get(&api_path("/resources/moderation?filter=flagged"))
        .add_header("Authorization", moderator.bearer())
        .await
        .json();
    assert_eq!(ids(&flagged_queue), vec![id]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_metadata_edit_without_action() {
    let app = setup_test_app().await;
    let client = app.client();
    let moderator =
        register_with_role(client, app.pool(), "editor@example.ca", MemberRole::Admin).await;

    let created = upload(&app, &moderator, "Draft title").await;
    let id = created["id"].as_str().expect("id");

    let edited = client
        .put(&api_path(&format!("/resources/{}", id)))
        .add_header("Authorization", moderator.bearer())
        .json(&json!({ "title": "Final title", "category": "research" }))
        .await;
    assert_eq!(edited.status_code(), 200);
    let body: serde_json::Value = edited.json();
    assert_eq!(body["title"], "Final title");
    assert_eq!(body["category"], "research");
    assert_eq!(body["description"], "Guide for newly diagnosed patients");
    assert_eq!(body["isApproved"], false);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_delete_removes_resource() {
    let app = setup_test_app().await;
    let client = app.client();
    let moderator =
        register_with_role(client, app.pool(), "deleter@example.ca", MemberRole::Moderator).await;

    let created = upload(&app, &moderator, "Spam").await;
    let id = created["id"].as_str().expect("id").to_string();
    let path = api_path(&format!("/resources/{}", id));

    let deleted = client
        .delete(&path)
        .add_header("Authorization", moderator.bearer())
        .await;
    assert_eq!(deleted.status_code(), 204);

    let queue: serde_json::Value = client
        .get(&api_path("/resources/moderation?filter=all"))
        .add_header("Authorization", moderator.bearer())
        .await
        .json();
    assert!(!ids(&queue).contains(&id));

    let again = client
        .delete(&path)
        .add_header("Authorization", moderator.bearer())
        .await;
    assert_eq!(again.status_code(), 404);
}
