//! Data models for the application
//!
//! Each sub-module represents a specific feature area.

mod forms;
mod member;
mod resource;
mod submission;

// Re-export all models for convenient imports
pub use forms::*;
pub use member::*;
pub use resource::*;
pub use submission::*;
