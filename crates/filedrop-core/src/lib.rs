//! Filedrop Core Library
//!
//! This crate provides the data model, error types, configuration and expiry
//! arithmetic shared by every Filedrop component.

pub mod config;
pub mod error;
pub mod expiry;
pub mod keys;
pub mod metadata;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use expiry::{Expiry, ExpirationChoice};
pub use metadata::{Metadata, Upload};
pub use storage_types::StorageBackend;
