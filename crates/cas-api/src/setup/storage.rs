//! Storage setup and initialization

use anyhow::{Context, Result};
use cas_core::Config;
use cas_storage::{LocalStorage, Storage};
use std::sync::Arc;

/// Create the local file store for uploaded resources
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!(
        path = %config.local_storage_path(),
        "Initializing resource storage..."
    );
    let storage = LocalStorage::new(config.local_storage_path())
        .await
        .context("Failed to initialize local storage")?;
    tracing::info!("Resource storage initialized successfully");

    Ok(Arc::new(storage))
}
