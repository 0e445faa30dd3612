//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use cas_core::models;

/// Registers the `bearer_auth` scheme referenced by member endpoints
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Canadian Amyloidosis Society API",
        version = "0.1.0",
        description = "Public forms, member portal, resource moderation and the Zoho CRM submission outbox."
    ),
    paths(
        // Forms
        handlers::forms::submit_contact,
        handlers::forms::submit_membership,
        handlers::forms::submit_story,
        // Auth
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        // Members
        handlers::members::get_profile,
        handlers::members::update_profile,
        handlers::members::change_password,
        // Resources
        handlers::resources::upload_resource,
        handlers::resources::list_resources,
        handlers::resources::moderation_queue,
        handlers::resources::get_resource,
        handlers::resources::download_resource,
        handlers::resources::update_resource,
        handlers::resources::delete_resource,
        // Submissions
        handlers::submissions::submit_form,
        handlers::submissions::get_submission_status,
        handlers::submissions::list_submissions,
        handlers::submissions::retry_submission,
        // Monitoring and CRM
        handlers::monitor::get_stats,
        handlers::crm::provision_crm_workflows,
    ),
    components(
        schemas(
            // Forms
            models::ContactRequest,
            models::MembershipApplication,
            models::StoryRequest,
            models::FormReceipt,
            // Members
            models::MemberRole,
            models::MemberProfile,
            models::ProfileUpdate,
            models::ChangePasswordRequest,
            models::LoginRequest,
            models::SessionResponse,
            // Resources
            models::ResourceResponse,
            models::ModerationAction,
            models::ModerationFilter,
            models::UpdateResourceRequest,
            // Submissions
            models::ProcessingStatus,
            models::SyncStatus,
            models::SubmitFormRequest,
            models::SubmissionAccepted,
            models::SubmissionStatusResponse,
            models::SubmissionSummary,
            models::SubmissionLog,
            models::SubmissionStats,
            models::FormCount,
            // CRM
            cas_crm::ProvisioningResult,
            cas_crm::CreatedWorkflow,
            cas_crm::WorkflowError,
            // Error
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "forms", description = "Public contact, membership and patient story forms"),
        (name = "auth", description = "Member sign-in and sessions"),
        (name = "members", description = "Member portal profile and password"),
        (name = "resources", description = "Member-submitted resources and moderation"),
        (name = "submissions", description = "CRM submission outbox"),
        (name = "monitor", description = "Outbox statistics"),
        (name = "crm", description = "Zoho CRM workflow provisioning")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/contact",
            "/api/membership",
            "/api/stories",
            "/api/resources/{id}",
            "/api/submit-form/{id}/retry",
            "/api/monitor/stats",
            "/api/admin/crm/workflows",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
