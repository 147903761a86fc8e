//! Storage setup and initialization

use anyhow::Result;
use filedrop_core::Config;
use filedrop_services::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage abstraction...");
    let storage = create_storage(config).await?;
    tracing::info!(
        backend = %storage.backend_type(),
        "Storage abstraction initialized successfully"
    );
    Ok(storage)
}
