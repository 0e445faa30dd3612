//! Application state and sub-state extractors.
//!
//! AppState is split into domain sub-states so handlers can extract only what they need
//! via Axum's `FromRef`.

use crate::auth::middleware::AuthState;
use cas_core::Config;
use cas_crm::{AccessTokenProvider, WorkflowConfig, ZohoClient};
use cas_db::{
    FormRepository, MemberRepository, ResourceRepository, SessionRepository, SubmissionRepository,
};
use cas_storage::Storage;
use cas_worker::SubmissionQueue;
use sqlx::PgPool;
use std::sync::Arc;

// ----- Sub-state types -----

/// Database pool and repositories.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub member_repository: MemberRepository,
    pub session_repository: SessionRepository,
    pub form_repository: FormRepository,
    pub resource_repository: ResourceRepository,
    pub submission_repository: SubmissionRepository,
}

/// Storage backend and upload limits for member-submitted resources.
#[derive(Clone)]
pub struct ResourceConfig {
    pub storage: Arc<dyn Storage>,
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

/// Outbox queue and the retry ceiling stamped on new submissions.
#[derive(Clone)]
pub struct SubmissionState {
    pub queue: SubmissionQueue,
    pub max_retries: i32,
}

/// Zoho client, token source and the workflow definitions to provision.
#[derive(Clone)]
pub struct CrmState {
    pub client: ZohoClient,
    pub token_provider: Arc<dyn AccessTokenProvider>,
    pub workflows: Vec<WorkflowConfig>,
}

// ----- AppState -----

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub auth: AuthState,
    pub resources: ResourceConfig,
    pub submissions: SubmissionState,
    pub crm: CrmState,
    pub config: Config,
    pub is_production: bool,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for AuthState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.auth.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for ResourceConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.resources.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for SubmissionState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.submissions.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for CrmState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.crm.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
