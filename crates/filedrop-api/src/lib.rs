//! Filedrop API Library
//!
//! HTTP surface of the file-sharing server: upload, delete and read
//! handlers, access-key and API-key checks, and application setup.

pub mod auth;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod telemetry;
pub mod utils;

pub use error::{ErrorResponse, HttpAppError};
