//! Application setup and initialization
//!
//! Everything `main` needs, split out so tests can build the same router.

pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use filedrop_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(&config.base.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let config = Arc::new(config);
    let storage = storage::setup_storage(&config).await?;
    let api_keys = services::load_api_keys(&config).await?;

    let state = Arc::new(AppState::new(config.clone(), storage));
    let router = routes::setup_routes(&config, state.clone(), api_keys)?;

    Ok((state, router))
}
