use crate::auth::jwt::JwtService;
use crate::auth::models::MemberContext;
use crate::error::HttpAppError;
use crate::utils::ip_extraction::{extract_client_ip, trusted_proxy_count, ClientIp};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cas_core::AppError;
use cas_db::{MemberRepository, SessionRepository};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Counts failed authentications per client IP inside a fixed window
#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Record a failure; returns true once the IP reached the limit
    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let (count, reset_at) = guard.entry(ip.to_string()).or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some((count, reset_at)) = guard.get(ip) {
            if Instant::now() >= *reset_at {
                guard.remove(ip);
                return false;
            }
            return *count >= self.max_failures;
        }
        false
    }

    /// A successful login clears the IP's failures
    pub async fn reset(&self, ip: &str) {
        self.inner.lock().await.remove(ip);
    }

    /// Drop entries whose window has passed
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        self.inner
            .lock()
            .await
            .retain(|_, (_, reset_at)| now < *reset_at);
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub member_repository: MemberRepository,
    pub session_repository: SessionRepository,
    pub auth_failure_limiter: Arc<AuthFailureLimiter>,
}

fn too_many_attempts() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, "Too many failed auth attempts").into_response()
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

/// Resolve a bearer token to its member. The token must verify and its
/// session row must be neither revoked nor expired.
pub async fn authenticate(auth_state: &AuthState, token: &str) -> Result<MemberContext, AppError> {
    let claims = auth_state.jwt.decode(token)?;

    let session = auth_state
        .session_repository
        .get_session(claims.jti)
        .await?
        .filter(|s| s.member_id == claims.sub && s.is_active())
        .ok_or_else(|| AppError::Unauthorized("Session has ended, sign in again".to_string()))?;

    let member = auth_state
        .member_repository
        .get_member(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Member no longer exists".to_string()))?;

    Ok(MemberContext {
        session_id: session.id,
        member,
    })
}

fn request_client_ip(request: &Request) -> ClientIp {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    ClientIp(extract_client_ip(
        request.headers(),
        socket_addr.as_ref(),
        trusted_proxy_count(),
    ))
}

/// Require a valid member session
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_ip = request_client_ip(&request);
    let limiter = &auth_state.auth_failure_limiter;
    if limiter.is_blocked(client_ip.as_str()).await {
        return too_many_attempts();
    }

    let result = match bearer_token(request.headers()) {
        Ok(token) => authenticate(&auth_state, token).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(context) => {
            tracing::debug!(
                member_id = %context.member_id(),
                session_id = %context.session_id,
                role = %context.role(),
                "Authenticated member"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err @ AppError::Unauthorized(_)) => {
            if limiter.record_failure(client_ip.as_str()).await {
                tracing::warn!(client_ip = %client_ip.as_str(), "Auth failure limit reached");
                return too_many_attempts();
            }
            HttpAppError(err).into_response()
        }
        Err(err) => HttpAppError(err).into_response(),
    }
}

/// Attach the member when a valid token is present; anonymous requests pass through
pub async fn optional_auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(token) = bearer_token(request.headers()) {
        match authenticate(&auth_state, token).await {
            Ok(context) => {
                request.extensions_mut().insert(context);
            }
            Err(AppError::Unauthorized(_)) => {
                tracing::debug!("Ignoring invalid session token on public route");
            }
            Err(err) => return HttpAppError(err).into_response(),
        }
    }
    next.run(request).await
}
