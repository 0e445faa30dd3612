//! CAS API Library
//!
//! This crate provides the HTTP API handlers, middleware, and application setup
//! for the public forms, the member portal, resource moderation and the CRM
//! submission outbox.

// Module declarations
mod api_doc;
pub mod constants;
mod handlers;
mod middleware;
pub mod setup;
mod submission_handler;
mod telemetry;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::ErrorResponse;
pub use submission_handler::CrmSubmissionHandler;
