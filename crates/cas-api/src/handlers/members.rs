//! Member portal: profile and password

use crate::auth::models::MemberContext;
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::{AppState, DbState};
use axum::{extract::State, http::StatusCode, Json};
use cas_core::models::{ChangePasswordRequest, MemberProfile, ProfileUpdate};
use cas_core::AppError;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/members/profile",
    tag = "members",
    responses(
        (status = 200, description = "Member profile", body = MemberProfile),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(member_ctx: MemberContext) -> Json<MemberProfile> {
    Json(MemberProfile::from(member_ctx.member))
}

#[utoipa::path(
    put,
    path = "/api/members/profile",
    tag = "members",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = MemberProfile),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(db, member_ctx, update), fields(member_id = %member_ctx.member_id()))]
pub async fn update_profile(
    State(db): State<DbState>,
    member_ctx: MemberContext,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> Result<Json<MemberProfile>, HttpAppError> {
    if update.is_empty() {
        return Ok(Json(MemberProfile::from(member_ctx.member)));
    }

    let member = db
        .member_repository
        .update_profile(member_ctx.member_id(), &update)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    Ok(Json(MemberProfile::from(member)))
}

#[utoipa::path(
    put,
    path = "/api/members/password",
    tag = "members",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed, other sessions revoked"),
        (status = 400, description = "New password too weak", body = ErrorResponse),
        (status = 401, description = "Current password is wrong", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, member_ctx, request), fields(member_id = %member_ctx.member_id()))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    member_ctx: MemberContext,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, HttpAppError> {
    let verified = verify_password_blocking(
        request.current_password,
        member_ctx.member.password_hash.clone(),
    )
    .await?;
    if !verified {
        return Err(AppError::Unauthorized("Current password is incorrect".to_string()).into());
    }

    let password_hash = hash_password_blocking(request.new_password).await?;
    let updated = state
        .db
        .member_repository
        .update_password(member_ctx.member_id(), &password_hash)
        .await?;
    if !updated {
        return Err(AppError::NotFound("Member not found".to_string()).into());
    }

    state
        .db
        .session_repository
        .revoke_other_sessions(member_ctx.member_id(), member_ctx.session_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
