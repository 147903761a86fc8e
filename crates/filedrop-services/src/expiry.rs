//! Lazy expiry on read.
//!
//! Readers only ever see a live object or `NotFound`: an expired object is
//! deleted on the read that notices it.

use std::sync::Arc;

use filedrop_core::Metadata;
use filedrop_storage::{ByteStream, Storage, StorageError, StorageResult};

#[derive(Clone)]
pub struct ExpiryEnforcer {
    storage: Arc<dyn Storage>,
}

impl ExpiryEnforcer {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Metadata for a live object.
    ///
    /// Content without metadata is repaired through
    /// [`Storage::regenerate_metadata`] before the expiry check.
    pub async fn check(&self, key: &str) -> StorageResult<Metadata> {
        let metadata = match self.storage.head(key).await {
            Ok(metadata) => metadata,
            Err(StorageError::NotFound(_)) => {
                if !self.storage.exists(key).await? {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                self.storage.regenerate_metadata(key).await?
            }
            Err(e) => return Err(e),
        };

        if metadata.is_expired() {
            match self.storage.delete(key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    tracing::info!(key = %key, "Deleted expired file on access");
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Failed to delete expired file");
                }
            }
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(metadata)
    }

    /// Content of a live object.
    pub async fn get(&self, key: &str) -> StorageResult<(Metadata, ByteStream)> {
        self.check(key).await?;
        self.storage.get(key).await
    }
}
