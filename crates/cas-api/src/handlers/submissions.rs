//! Generic form submissions: intake, status polling and admin retry

use crate::auth::models::MemberContext;
use crate::constants::API_PREFIX;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::{AppState, DbState};
use crate::utils::ip_extraction::ClientIp;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use cas_core::models::{
    ProcessingStatus, SubmissionAccepted, SubmissionStatusResponse, SubmissionSummary,
    SubmitFormRequest,
};
use cas_core::AppError;
use cas_db::{NewSubmission, SubmissionListQuery};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

fn status_url(id: Uuid) -> String {
    format!("{}/submit-form/{}", API_PREFIX, id)
}

#[utoipa::path(
    post,
    path = "/api/submit-form",
    tag = "submissions",
    request_body = SubmitFormRequest,
    responses(
        (status = 202, description = "Submission accepted for CRM sync", body = SubmissionAccepted),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, client_ip, request), fields(form_name = %request.form_name))]
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    client_ip: ClientIp,
    ValidatedJson(request): ValidatedJson<SubmitFormRequest>,
) -> Result<(StatusCode, Json<SubmissionAccepted>), HttpAppError> {
    let submission = state
        .db
        .submission_repository
        .create_submission(NewSubmission {
            form_name: request.form_name,
            data: request.data,
            source_ip: client_ip.known(),
            max_retries: state.submissions.max_retries,
        })
        .await?;
    state.submissions.queue.notify();

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionAccepted {
            id: submission.id,
            processing_status: submission.processing_status,
            sync_status: submission.sync_status,
            status_url: status_url(submission.id),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/submit-form/{id}",
    tag = "submissions",
    params(
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    responses(
        (status = 200, description = "Submission status with its processing log", body = SubmissionStatusResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse)
    )
)]
pub async fn get_submission_status(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionStatusResponse>, HttpAppError> {
    let submission = db
        .submission_repository
        .get_submission(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;
    let logs = db.submission_repository.list_logs(id).await?;

    Ok(Json(SubmissionStatusResponse::new(submission, logs)))
}

#[derive(Deserialize, ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionListParams {
    #[serde(default)]
    pub status: Option<ProcessingStatus>,
    #[serde(default)]
    pub form_name: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[utoipa::path(
    get,
    path = "/api/submit-form",
    tag = "submissions",
    params(SubmissionListParams),
    responses(
        (status = 200, description = "Submissions, newest first", body = Vec<SubmissionSummary>),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_submissions(
    State(db): State<DbState>,
    member_ctx: MemberContext,
    Query(params): Query<SubmissionListParams>,
) -> Result<Json<Vec<SubmissionSummary>>, HttpAppError> {
    member_ctx.require_admin()?;

    let submissions = db
        .submission_repository
        .list_submissions(SubmissionListQuery {
            status: params.status,
            form_name: params.form_name.filter(|f| !f.trim().is_empty()),
            limit: Some(params.limit.clamp(1, 100)),
            offset: Some(params.offset.max(0)),
        })
        .await?;

    Ok(Json(
        submissions.into_iter().map(SubmissionSummary::from).collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/submit-form/{id}/retry",
    tag = "submissions",
    params(
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    responses(
        (status = 202, description = "Submission re-queued", body = SubmissionAccepted),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
        (status = 409, description = "Submission is not in a failed state", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, member_ctx), fields(admin_id = %member_ctx.member_id()))]
pub async fn retry_submission(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmissionAccepted>), HttpAppError> {
    member_ctx.require_admin()?;

    let repository = &state.db.submission_repository;
    let Some(submission) = repository.requeue_submission(id).await? else {
        // Distinguish unknown ids from submissions that are not failed
        return match repository.get_submission(id).await? {
            Some(existing) => Err(AppError::Conflict(format!(
                "Submission is {}, only failed submissions can be retried",
                existing.processing_status
            ))
            .into()),
            None => Err(AppError::NotFound("Submission not found".to_string()).into()),
        };
    };

    repository
        .append_log(
            submission.id,
            submission.retry_count,
            ProcessingStatus::Pending,
            "Manually re-queued by an administrator",
            Some(serde_json::json!({ "adminId": member_ctx.member_id() })),
        )
        .await?;
    state.submissions.queue.notify();

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionAccepted {
            id: submission.id,
            processing_status: submission.processing_status,
            sync_status: submission.sync_status,
            status_url: status_url(submission.id),
        }),
    ))
}
