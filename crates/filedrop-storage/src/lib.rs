//! Filedrop Storage Library
//!
//! This crate provides the storage abstraction and its implementations for
//! Filedrop: the [`Storage`] trait, a local filesystem backend and an
//! S3-compatible object store backend.
//!
//! # Keys
//!
//! The filename is the key. A key is a single path segment: it must not be
//! empty, start with `.`, or contain `/`, `\` or `..`. Each backend keeps the
//! bytes and the [`filedrop_core::Metadata`] for a key together and removes
//! them together.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filedrop_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    validate_key, ByteRange, ByteStream, ServedContent, Storage, StorageError, StorageResult,
};
