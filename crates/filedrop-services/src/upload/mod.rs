//! Upload pipeline: naming, collision handling, limits and persistence.

pub mod limit;
pub mod naming;
pub mod service;

pub use service::{UploadError, UploadPolicy, UploadRequest, UploadService};
