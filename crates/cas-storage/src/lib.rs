//! File storage for uploaded resources.
//!
//! Key format: `resources/{resource_id}/{sanitized_file_name}`. Backends
//! implement [`Storage`]; only the local filesystem backend ships today.

pub mod keys;
pub mod local;
pub mod traits;

pub use keys::{file_extension, resource_storage_key, sanitize_file_name};
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
