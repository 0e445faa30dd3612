//! Public intake forms. Each one stores its row and queues a CRM submission
//! in the same transaction, then wakes the submission worker.

use super::auth::start_session;
use crate::auth::password::hash_password_blocking;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;
use axum::{extract::State, http::StatusCode, Json};
use cas_core::models::{
    ContactRequest, FormReceipt, MemberRole, MembershipApplication, NewMember, SessionResponse,
    StoryRequest, CONTACT_FORM, MEMBERSHIP_FORM, STORIES_FORM,
};
use cas_core::AppError;
use cas_db::NewSubmission;
use std::sync::Arc;

fn new_submission(
    state: &AppState,
    form_name: &str,
    data: serde_json::Value,
    client_ip: &ClientIp,
) -> NewSubmission {
    NewSubmission {
        form_name: form_name.to_string(),
        data,
        source_ip: client_ip.known(),
        max_retries: state.submissions.max_retries,
    }
}

#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "forms",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message received", body = FormReceipt),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, client_ip, request))]
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    ValidatedJson(request): ValidatedJson<ContactRequest>,
) -> Result<(StatusCode, Json<FormReceipt>), HttpAppError> {
    let data = serde_json::to_value(&request).map_err(AppError::from)?;
    let submission = new_submission(&state, CONTACT_FORM, data, &client_ip);

    let (message, submission) = state
        .db
        .form_repository
        .create_contact_with_submission(&request, submission)
        .await?;
    state.submissions.queue.notify();

    Ok((
        StatusCode::CREATED,
        Json(FormReceipt {
            id: message.id,
            submission_id: submission.id,
            message: "Thank you for contacting us. We will get back to you soon.".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/membership",
    tag = "forms",
    request_body = MembershipApplication,
    responses(
        (status = 201, description = "Member created and signed in", body = SessionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, client_ip, application))]
pub async fn submit_membership(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    ValidatedJson(application): ValidatedJson<MembershipApplication>,
) -> Result<(StatusCode, Json<SessionResponse>), HttpAppError> {
    let submission = new_submission(
        &state,
        MEMBERSHIP_FORM,
        application.crm_payload(),
        &client_ip,
    );

    let password_hash = hash_password_blocking(application.password).await?;
    let new_member = NewMember {
        email: application.email,
        password_hash,
        first_name: application.first_name,
        last_name: application.last_name,
        discipline: application.discipline,
        institution: application.institution,
        phone: application.phone,
        role: MemberRole::Member,
        cas_member: application.cas_member,
        cann_member: application.cann_member,
        newsletter_opt_in: application.newsletter_opt_in,
        event_notifications: application.event_notifications,
        research_updates: application.research_updates,
    };

    let (member, _submission) = state
        .db
        .member_repository
        .create_member_with_submission(new_member, submission)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("An account with this email already exists".to_string())
        })?;
    state.submissions.queue.notify();

    let session = start_session(&state.auth, member).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/api/stories",
    tag = "forms",
    request_body = StoryRequest,
    responses(
        (status = 201, description = "Story received", body = FormReceipt),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, client_ip, request))]
pub async fn submit_story(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    ValidatedJson(request): ValidatedJson<StoryRequest>,
) -> Result<(StatusCode, Json<FormReceipt>), HttpAppError> {
    let data = serde_json::to_value(&request).map_err(AppError::from)?;
    let submission = new_submission(&state, STORIES_FORM, data, &client_ip);

    let (story, submission) = state
        .db
        .form_repository
        .create_story_with_submission(&request, submission)
        .await?;
    state.submissions.queue.notify();

    Ok((
        StatusCode::CREATED,
        Json(FormReceipt {
            id: story.id,
            submission_id: submission.id,
            message: "Thank you for sharing your story.".to_string(),
        }),
    ))
}
