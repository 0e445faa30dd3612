//! Domain route groups (forms, members, resources, submissions, CRM).

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn form_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/contact", API_PREFIX), post(handlers::forms::submit_contact))
        .route(
            &format!("{}/membership", API_PREFIX),
            post(handlers::forms::submit_membership),
        )
        .route(&format!("{}/stories", API_PREFIX), post(handlers::forms::submit_story))
        .with_state(state)
}

pub fn public_submission_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/submit-form", API_PREFIX),
            post(handlers::submissions::submit_form),
        )
        .route(
            &format!("{}/submit-form/{{id}}", API_PREFIX),
            get(handlers::submissions::get_submission_status),
        )
        .with_state(state)
}

pub fn login_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/auth/login", API_PREFIX), post(handlers::auth::login))
        .with_state(state)
}

pub fn resource_read_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/resources", API_PREFIX),
            get(handlers::resources::list_resources),
        )
        .route(
            &format!("{}/resources/{{id}}", API_PREFIX),
            get(handlers::resources::get_resource),
        )
        .route(
            &format!("{}/resources/{{id}}/file", API_PREFIX),
            get(handlers::resources::download_resource),
        )
        .with_state(state)
}

pub fn session_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/auth/logout", API_PREFIX), post(handlers::auth::logout))
        .route(&format!("{}/auth/me", API_PREFIX), get(handlers::auth::me))
        .with_state(state)
}

pub fn member_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/members/profile", API_PREFIX),
            get(handlers::members::get_profile).put(handlers::members::update_profile),
        )
        .route(
            &format!("{}/members/password", API_PREFIX),
            put(handlers::members::change_password),
        )
        .with_state(state)
}

pub fn resource_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/resources", API_PREFIX),
            post(handlers::resources::upload_resource),
        )
        .route(
            &format!("{}/resources/moderation", API_PREFIX),
            get(handlers::resources::moderation_queue),
        )
        .route(
            &format!("{}/resources/{{id}}", API_PREFIX),
            put(handlers::resources::update_resource).delete(handlers::resources::delete_resource),
        )
        .with_state(state)
}

pub fn submission_admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/submit-form", API_PREFIX),
            get(handlers::submissions::list_submissions),
        )
        .route(
            &format!("{}/submit-form/{{id}}/retry", API_PREFIX),
            post(handlers::submissions::retry_submission),
        )
        .with_state(state)
}

pub fn monitor_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/monitor/stats", API_PREFIX),
            get(handlers::monitor::get_stats),
        )
        .with_state(state)
}

pub fn crm_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/admin/crm/workflows", API_PREFIX),
            post(handlers::crm::provision_crm_workflows),
        )
        .with_state(state)
}
