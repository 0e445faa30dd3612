//! CAS Core Library
//!
//! This crate provides core domain models, error types, configuration, and validation
//! that are shared across all CAS backend components.

pub mod config;
pub mod error;
pub mod models;
pub mod sync_error;
pub mod validation;

// Re-export commonly used types
pub use config::{AppConfig, BaseConfig, Config, CrmConfig, StorageConfig, SubmissionConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use sync_error::{SyncError, SyncResultExt};
