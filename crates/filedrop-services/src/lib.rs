//! Filedrop Services Layer
//!
//! Business logic between the HTTP surface and storage: the upload pipeline,
//! expiry enforcement with metadata repair, the background sweep and the
//! upload API-key set. The API crate depends on this facade only.

pub mod access;
pub mod cleanup;
pub mod expiry;
pub mod upload;

pub use access::api_keys::{hash_api_key, ApiKeyError, ApiKeySet};
pub use cleanup::service::{CleanupReport, CleanupService};
pub use expiry::ExpiryEnforcer;
pub use filedrop_storage::{
    create_storage, ByteRange, ByteStream, ServedContent, Storage, StorageBackend, StorageError,
    StorageResult,
};
#[cfg(feature = "storage-local")]
pub use filedrop_storage::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use filedrop_storage::S3Storage;
pub use upload::{UploadError, UploadPolicy, UploadRequest, UploadService};
