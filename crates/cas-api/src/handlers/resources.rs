//! Member-submitted resources and their moderation

use crate::auth::models::MemberContext;
use crate::constants::API_PREFIX;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;
use crate::utils::upload::{extract_resource_upload, validate_file_extension, validate_file_size};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use cas_core::models::{
    ModerationAction, ModerationFilter, NewResource, Resource, ResourceResponse,
    UpdateResourceRequest, RESOURCES_FORM,
};
use cas_core::AppError;
use cas_db::NewSubmission;
use cas_storage::resource_storage_key;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

fn not_found() -> AppError {
    AppError::NotFound("Resource not found".to_string())
}

/// Unapproved resources are only visible to moderators. Anyone else gets a
/// 404 so queued uploads do not leak.
async fn visible_resource(
    state: &AppState,
    id: Uuid,
    member_ctx: Option<&MemberContext>,
) -> Result<Resource, AppError> {
    let resource = state
        .db
        .resource_repository
        .get_resource(id)
        .await?
        .ok_or_else(not_found)?;

    let can_moderate = member_ctx.is_some_and(|ctx| ctx.role().can_moderate());
    if !resource.is_approved && !can_moderate {
        return Err(not_found());
    }

    Ok(resource)
}

#[utoipa::path(
    post,
    path = "/api/resources",
    tag = "resources",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Resource uploaded and queued for moderation", body = ResourceResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, member_ctx, client_ip, multipart),
    fields(member_id = %member_ctx.member_id(), operation = "upload_resource")
)]
pub async fn upload_resource(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    client_ip: ClientIp,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResourceResponse>), HttpAppError> {
    let upload = extract_resource_upload(multipart).await?;
    validate_file_size(upload.data.len(), state.resources.max_file_size)?;
    validate_file_extension(&upload.file_name, &state.resources.allowed_extensions)?;

    let resource_id = Uuid::new_v4();
    let storage_key = resource_storage_key(resource_id, &upload.file_name);
    let file_size = upload.data.len() as i64;

    state
        .resources
        .storage
        .upload(&storage_key, &upload.content_type, upload.data)
        .await?;

    let member = &member_ctx.member;
    let new_resource = NewResource {
        id: resource_id,
        title: upload.title,
        description: upload.description,
        category: upload.category,
        file_name: upload.file_name,
        storage_key: storage_key.clone(),
        content_type: upload.content_type,
        file_size,
        submitted_by: Some(member.id),
        submitter_name: Some(member.full_name()),
        submitter_email: Some(member.email.clone()),
    };
    let submission = NewSubmission {
        form_name: RESOURCES_FORM.to_string(),
        data: serde_json::json!({
            "resourceId": new_resource.id,
            "title": new_resource.title,
            "description": new_resource.description,
            "category": new_resource.category,
            "fileName": new_resource.file_name,
            "submitterName": new_resource.submitter_name,
            "submitterEmail": new_resource.submitter_email,
        }),
        source_ip: client_ip.known(),
        max_retries: state.submissions.max_retries,
    };

    let resource = match state
        .db
        .resource_repository
        .create_resource_with_submission(new_resource, submission)
        .await
    {
        Ok((resource, _submission)) => resource,
        Err(e) => {
            // Cleanup storage on database failure
            let storage = state.resources.storage.clone();
            tokio::spawn(async move {
                if let Err(cleanup_err) = storage.delete(&storage_key).await {
                    tracing::debug!(
                        error = %cleanup_err,
                        storage_key = %storage_key,
                        "Failed to cleanup storage file after DB error"
                    );
                }
            });
            return Err(e.into());
        }
    };
    state.submissions.queue.notify();

    Ok((
        StatusCode::CREATED,
        Json(ResourceResponse::from_resource(resource, API_PREFIX)),
    ))
}

#[derive(Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ResourceListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_limit() -> i64 {
    50
}

#[utoipa::path(
    get,
    path = "/api/resources",
    tag = "resources",
    params(ResourceListQuery),
    responses(
        (status = 200, description = "Approved resources", body = Vec<ResourceResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResourceListQuery>,
) -> Result<Json<Vec<ResourceResponse>>, HttpAppError> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let category = query.category.as_deref().filter(|c| !c.trim().is_empty());

    let resources = state
        .db
        .resource_repository
        .list_approved(category, limit, offset)
        .await?;

    Ok(Json(
        resources
            .into_iter()
            .map(|r| ResourceResponse::from_resource(r, API_PREFIX))
            .collect(),
    ))
}

#[derive(Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ModerationQueueQuery {
    #[serde(default)]
    pub filter: ModerationFilter,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[utoipa::path(
    get,
    path = "/api/resources/moderation",
    tag = "resources",
    params(ModerationQueueQuery),
    responses(
        (status = 200, description = "Moderation queue, oldest first", body = Vec<ResourceResponse>),
        (status = 403, description = "Moderator role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn moderation_queue(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    Query(query): Query<ModerationQueueQuery>,
) -> Result<Json<Vec<ResourceResponse>>, HttpAppError> {
    member_ctx.require_moderator()?;

    let resources = state
        .db
        .resource_repository
        .list_moderation_queue(query.filter, query.limit.clamp(1, 100), query.offset.max(0))
        .await?;

    Ok(Json(
        resources
            .into_iter()
            .map(|r| ResourceResponse::from_resource(r, API_PREFIX))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    tag = "resources",
    params(
        ("id" = Uuid, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Resource found", body = ResourceResponse),
        (status = 404, description = "Resource not found", body = ErrorResponse)
    )
)]
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    member_ctx: Option<MemberContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceResponse>, HttpAppError> {
    let resource = visible_resource(&state, id, member_ctx.as_ref()).await?;
    Ok(Json(ResourceResponse::from_resource(resource, API_PREFIX)))
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}/file",
    tag = "resources",
    params(
        ("id" = Uuid, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Resource file", content_type = "application/octet-stream"),
        (status = 404, description = "Resource not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, member_ctx), fields(resource_id = %id, operation = "download_resource"))]
pub async fn download_resource(
    State(state): State<Arc<AppState>>,
    member_ctx: Option<MemberContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resource = visible_resource(&state, id, member_ctx.as_ref()).await?;

    tracing::debug!(
        resource_id = %id,
        storage_key = %resource.storage_key,
        "Serving resource from storage"
    );

    let bytes = state.resources.storage.download(&resource.storage_key).await?;

    let content_disposition = format!("attachment; filename=\"{}\"", resource.file_name);
    // Only public files may be cached by shared caches
    let cache_control = if resource.is_approved {
        "public, max-age=3600"
    } else {
        "no-store, private"
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resource.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[utoipa::path(
    put,
    path = "/api/resources/{id}",
    tag = "resources",
    params(
        ("id" = Uuid, Path, description = "Resource ID")
    ),
    request_body = UpdateResourceRequest,
    responses(
        (status = 200, description = "Resource updated", body = ResourceResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Moderator role required", body = ErrorResponse),
        (status = 404, description = "Resource not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, member_ctx, request),
    fields(resource_id = %id, moderator_id = %member_ctx.member_id(), action = ?request.action)
)]
pub async fn update_resource(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateResourceRequest>,
) -> Result<Json<ResourceResponse>, HttpAppError> {
    member_ctx.require_moderator()?;

    let repository = &state.db.resource_repository;
    let moderator = member_ctx.member_id();
    let note = request.moderation_note.as_deref();

    let mut resource = match request.action {
        Some(ModerationAction::Approve) => repository.approve(id, moderator, note).await?,
        Some(ModerationAction::Flag) => repository.set_flag(id, moderator, true, note).await?,
        Some(ModerationAction::Unflag) => repository.set_flag(id, moderator, false, note).await?,
        None => None,
    };

    // Without an action the note travels with the metadata update
    let metadata_note = if request.action.is_none() { note } else { None };
    if request.has_metadata_changes() || metadata_note.is_some() {
        resource = repository
            .update_metadata(
                id,
                request.title.as_deref(),
                request.description.as_deref(),
                request.category.as_deref(),
                metadata_note,
            )
            .await?;
    } else if request.action.is_none() {
        resource = repository.get_resource(id).await?;
    }

    let resource = resource.ok_or_else(not_found)?;
    Ok(Json(ResourceResponse::from_resource(resource, API_PREFIX)))
}

#[utoipa::path(
    delete,
    path = "/api/resources/{id}",
    tag = "resources",
    params(
        ("id" = Uuid, Path, description = "Resource ID")
    ),
    responses(
        (status = 204, description = "Resource rejected and removed"),
        (status = 403, description = "Moderator role required", body = ErrorResponse),
        (status = 404, description = "Resource not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, member_ctx),
    fields(resource_id = %id, moderator_id = %member_ctx.member_id())
)]
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    member_ctx.require_moderator()?;

    let resource = state
        .db
        .resource_repository
        .delete_resource(id)
        .await?
        .ok_or_else(not_found)?;

    // The row is gone; a leftover file is only logged
    if let Err(e) = state.resources.storage.delete(&resource.storage_key).await {
        tracing::warn!(
            error = %e,
            storage_key = %resource.storage_key,
            "Failed to delete resource file"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
