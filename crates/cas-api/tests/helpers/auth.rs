use axum_test::TestServer;
use cas_core::models::MemberRole;
use cas_db::MemberRepository;
use serde_json::json;
use uuid::Uuid;

use super::api_path;

pub const TEST_PASSWORD: &str = "Amyloid2024";

/// Member registered through the membership form.
pub struct TestMember {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub token: String,
}

impl TestMember {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Apply for membership and return the member with the session token issued at sign-up.
pub async fn register_test_member(client: &TestServer, email: &str) -> TestMember {
    let response = client
        .post(&api_path("/membership"))
        .json(&json!({
            "firstName": "Test",
            "lastName": "Member",
            "email": email,
            "password": TEST_PASSWORD,
            "institution": "Test Hospital",
            "casMember": true,
            "newsletterOptIn": true
        }))
        .await;
    assert_eq!(response.status_code(), 201, "membership sign-up");

    let body: serde_json::Value = response.json();
    let token = body["token"].as_str().expect("token in response").to_string();
    let id = body["member"]["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("member id in response");

    TestMember {
        id,
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        token,
    }
}

/// Register a member and promote them; the role is read per request so the
/// sign-up token carries the new role immediately.
pub async fn register_with_role(
    client: &TestServer,
    pool: &sqlx::PgPool,
    email: &str,
    role: MemberRole,
) -> TestMember {
    let member = register_test_member(client, email).await;
    MemberRepository::new(pool.clone())
        .set_role(member.id, role)
        .await
        .expect("Failed to set member role")
        .expect("member exists");
    member
}

/// Log in with email and password, returning the new token.
pub async fn login(client: &TestServer, email: &str, password: &str) -> String {
    let response = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), 200, "login");
    let body: serde_json::Value = response.json();
    body["token"].as_str().expect("token in response").to_string()
}
