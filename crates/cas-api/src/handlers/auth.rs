//! Login, logout and the current member

use crate::auth::middleware::AuthState;
use crate::auth::models::MemberContext;
use crate::auth::password::{verify_password_blocking, verify_unknown_member_blocking};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::utils::ip_extraction::ClientIp;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use cas_core::models::{LoginRequest, Member, MemberProfile, SessionResponse};
use cas_core::AppError;
use chrono::Utc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Create a session row for `member` and sign its token
pub(crate) async fn start_session(
    auth: &AuthState,
    member: Member,
) -> Result<SessionResponse, AppError> {
    let issued_at = Utc::now();
    let expires_at = auth.jwt.expires_at(issued_at);
    let session = auth
        .session_repository
        .create_session(member.id, expires_at)
        .await?;
    let token = auth
        .jwt
        .issue(member.id, session.id, member.role, issued_at, session.expires_at)?;

    Ok(SessionResponse {
        token,
        expires_at: session.expires_at,
        member: MemberProfile::from(member),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts")
    )
)]
#[tracing::instrument(skip(auth, client_ip, request), fields(client_ip = %client_ip.as_str()))]
pub async fn login(
    State(auth): State<AuthState>,
    client_ip: ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limiter = &auth.auth_failure_limiter;
    if limiter.is_blocked(client_ip.as_str()).await {
        return Ok((StatusCode::TOO_MANY_REQUESTS, "Too many failed auth attempts").into_response());
    }

    let member = auth.member_repository.find_by_email(&request.email).await?;

    let verified = match &member {
        Some(member) => {
            verify_password_blocking(request.password, member.password_hash.clone()).await?
        }
        None => verify_unknown_member_blocking(request.password).await?,
    };

    let member = match member {
        Some(member) if verified => member,
        _ => {
            limiter.record_failure(client_ip.as_str()).await;
            tracing::info!("Failed login attempt");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()).into());
        }
    };

    limiter.reset(client_ip.as_str()).await;
    auth.member_repository.record_login(member.id).await?;

    let response = start_session(&auth, member).await?;
    tracing::info!(member_id = %response.member.id, "Member signed in");

    Ok(Json(response).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(auth, member_ctx), fields(member_id = %member_ctx.member_id()))]
pub async fn logout(
    State(auth): State<AuthState>,
    member_ctx: MemberContext,
) -> Result<StatusCode, HttpAppError> {
    auth.session_repository
        .revoke_session(member_ctx.session_id)
        .await?;
    tracing::info!(session_id = %member_ctx.session_id, "Member signed out");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current member", body = MemberProfile),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(member_ctx: MemberContext) -> Json<MemberProfile> {
    Json(MemberProfile::from(member_ctx.member))
}
