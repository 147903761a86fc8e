//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filedrop_core::{Expiry, Metadata};
use filedrop_processing::InspectError;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    /// Metadata exists but cannot be parsed
    #[error("Corrupted metadata for {0}")]
    BadMetadata(String),

    #[error("Empty content")]
    EmptyContent,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Inclusive byte range, already checked against the object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Content prepared for delivery
pub struct ServedContent {
    pub total_size: u64,
    pub range: Option<ByteRange>,
    pub body: ByteStream,
}

impl ServedContent {
    /// Number of bytes `body` will yield
    pub fn content_length(&self) -> u64 {
        self.range.map(|r| r.len()).unwrap_or(self.total_size)
    }
}

/// Reject keys that could name anything other than a single stored object.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// Each implementation owns how bytes and metadata are laid out for a key;
/// callers never see provider types.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether content exists for `key`. Expiry is not considered.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Metadata without opening the content.
    async fn head(&self, key: &str) -> StorageResult<Metadata>;

    /// Metadata plus the full content stream.
    async fn get(&self, key: &str) -> StorageResult<(Metadata, ByteStream)>;

    /// Consume `reader` to EOF and store it under `key` with fresh metadata.
    ///
    /// Type, checksum and size are computed from the bytes read; an empty
    /// `delete_key` is replaced by a generated one. Nothing is left behind
    /// on failure, and zero bytes fail with [`StorageError::EmptyContent`].
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        expiry: Expiry,
        delete_key: &str,
        access_key: &str,
    ) -> StorageResult<Metadata>;

    /// Replace the metadata for `key` without touching its content.
    async fn put_metadata(&self, key: &str, metadata: &Metadata) -> StorageResult<()>;

    /// Remove content and metadata together.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Content length in bytes
    async fn size(&self, key: &str) -> StorageResult<u64>;

    /// Open content for delivery, optionally limited to `range`.
    async fn serve_file(&self, key: &str, range: Option<ByteRange>)
        -> StorageResult<ServedContent>;

    /// Every stored key, in no particular order.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Rebuild metadata for content that has none.
    ///
    /// Returns the metadata now stored for `key`. Backends that always write
    /// both halves together report [`StorageError::NotFound`].
    async fn regenerate_metadata(&self, key: &str) -> StorageResult<Metadata> {
        Err(StorageError::NotFound(key.to_string()))
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
