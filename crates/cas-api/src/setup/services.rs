//! Service initialization and application state setup

use crate::auth::jwt::JwtService;
use crate::auth::middleware::{AuthFailureLimiter, AuthState};
use crate::constants::{LOGIN_FAILURE_WINDOW_SECS, LOGIN_MAX_FAILURES};
use crate::state::{AppState, CrmState, DbState, ResourceConfig, SubmissionState};
use crate::submission_handler::CrmSubmissionHandler;
use anyhow::{Context, Result};
use cas_core::Config;
use cas_crm::{default_workflows, AccessTokenProvider, StaticTokenProvider, ZohoClient};
use cas_db::{
    FormRepository, MemberRepository, ResourceRepository, SessionRepository, SubmissionRepository,
};
use cas_storage::Storage;
use cas_worker::{SubmissionQueue, SubmissionQueueConfig};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// How often expired sessions and stale login-failure entries are purged
const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Initialize all services and repositories, returning the application state
pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let db = DbState {
        pool: pool.clone(),
        member_repository: MemberRepository::new(pool.clone()),
        session_repository: SessionRepository::new(pool.clone()),
        form_repository: FormRepository::new(pool.clone()),
        resource_repository: ResourceRepository::new(pool.clone()),
        submission_repository: SubmissionRepository::new(pool),
    };

    let auth = AuthState {
        jwt: JwtService::new(config.jwt_secret(), config.session_ttl_hours()),
        member_repository: db.member_repository.clone(),
        session_repository: db.session_repository.clone(),
        auth_failure_limiter: Arc::new(AuthFailureLimiter::new(
            LOGIN_MAX_FAILURES,
            LOGIN_FAILURE_WINDOW_SECS,
        )),
    };
    start_session_cleanup(&auth);

    let crm_client = ZohoClient::from_config(config.crm()).context("Failed to build Zoho client")?;
    let token_provider: Arc<dyn AccessTokenProvider> =
        Arc::new(StaticTokenProvider::from_config(config.crm()));
    if config.crm().access_token.is_none() {
        tracing::warn!("ZOHO_ACCESS_TOKEN not set - submissions will fail until a token is configured");
    }

    let queue_config = SubmissionQueueConfig::from(config.submissions());
    let queue = if config.submissions().worker_enabled {
        let handler = Arc::new(CrmSubmissionHandler::new(
            crm_client.clone(),
            token_provider.clone(),
        ));
        tracing::info!(
            max_concurrent = queue_config.max_concurrent,
            max_retries = config.submissions().max_retries,
            retry_base_seconds = queue_config.retry_base_seconds,
            "Submission worker started"
        );
        SubmissionQueue::new(db.submission_repository.clone(), queue_config, handler)
    } else {
        tracing::info!("Submission worker disabled, submissions are only stored");
        SubmissionQueue::new_no_worker(queue_config)
    };

    let state = AppState {
        auth,
        resources: ResourceConfig {
            storage,
            max_file_size: config.max_upload_size_bytes(),
            allowed_extensions: config.allowed_resource_extensions().to_vec(),
        },
        submissions: SubmissionState {
            queue,
            max_retries: config.submissions().max_retries,
        },
        crm: CrmState {
            client: crm_client,
            token_provider,
            workflows: default_workflows(config.crm()),
        },
        db,
        is_production: config.is_production(),
        config: config.clone(),
    };

    Ok(Arc::new(state))
}

fn start_session_cleanup(auth: &AuthState) {
    let sessions = auth.session_repository.clone();
    let limiter = auth.auth_failure_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match sessions.delete_expired().await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, "Expired member sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Failed to remove expired sessions"),
            }
            limiter.cleanup_expired().await;
        }
    });
}
