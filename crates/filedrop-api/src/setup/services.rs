//! Services that live beside the router

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use filedrop_core::{Config, StorageBackend};
use filedrop_services::{ApiKeySet, CleanupService, Storage};
use tokio::task::JoinHandle;

/// Load the upload API keys, if an auth file is configured.
pub async fn load_api_keys(config: &Config) -> Result<Option<Arc<ApiKeySet>>> {
    let Some(path) = config.auth_file.as_deref() else {
        tracing::info!("No auth file configured, uploads are open");
        return Ok(None);
    };

    let keys = ApiKeySet::from_file(path)
        .await
        .with_context(|| format!("Failed to load auth file {}", path))?;
    if keys.is_empty() {
        tracing::warn!(path = %path, "Auth file holds no keys; every upload will be rejected");
    }
    Ok(Some(Arc::new(keys)))
}

/// Start the periodic expiry sweep when configured. Only the local backend
/// is swept; object stores rely on the read path.
pub fn start_cleanup(config: &Config, storage: Arc<dyn Storage>) -> Option<JoinHandle<()>> {
    if config.cleanup_every_minutes == 0 {
        return None;
    }
    if storage.backend_type() != StorageBackend::Local {
        tracing::warn!(
            backend = %storage.backend_type(),
            "Periodic cleanup is only supported for local storage"
        );
        return None;
    }

    let every = Duration::from_secs(config.cleanup_every_minutes.saturating_mul(60));
    tracing::info!(every_minutes = config.cleanup_every_minutes, "Starting cleanup task");
    let service = Arc::new(CleanupService::new(storage, every, config.no_logs));
    Some(service.start())
}
