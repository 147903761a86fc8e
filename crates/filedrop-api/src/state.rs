//! Application state shared by every handler.

use std::sync::Arc;

use filedrop_core::Config;
use filedrop_services::{ExpiryEnforcer, Storage, UploadPolicy, UploadService};

pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub uploads: UploadService,
    /// Every read goes through here so that stale objects are never served
    pub expiry: ExpiryEnforcer,
}

impl AppState {
    pub fn new(config: Arc<Config>, storage: Arc<dyn Storage>) -> Self {
        let uploads = UploadService::new(storage.clone(), UploadPolicy::from_config(&config));
        let expiry = ExpiryEnforcer::new(storage.clone());
        Self {
            config,
            storage,
            uploads,
            expiry,
        }
    }
}
