//! Error types module
//!
//! All failures that reach a client are unified under [`AppError`]. Each variant
//! describes its own HTTP presentation through [`ErrorMetadata`], so handlers
//! only decide *which* error happened, never how it is rendered.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for data integrity problems an operator should see
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupted metadata: {0}")]
    BadMetadata(String),

    #[error("Empty file")]
    EmptyContent,

    #[error("File too large: {size} bytes exceeds max {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Prohibited filename: {0}")]
    ProhibitedFilename(String),

    /// Wrong or missing delete, access or API key. The message is logged but
    /// never shown to the client.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name; it may have expired"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadMetadata(_) => (
            500,
            "BAD_METADATA",
            false,
            Some("Contact the site operator"),
            true,
            LogLevel::Warn,
        ),
        AppError::EmptyContent => (
            400,
            "EMPTY_FILE",
            false,
            Some("Upload a non-empty file"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            400,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::ProhibitedFilename(_) => (
            400,
            "PROHIBITED_FILENAME",
            false,
            Some("Choose a different file name"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the key sent with the request"),
            true,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::RangeNotSatisfiable { .. } => (
            416,
            "RANGE_NOT_SATISFIABLE",
            false,
            Some("Request a range inside the file"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::BadMetadata(_) => "BadMetadata",
            AppError::EmptyContent => "EmptyContent",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::ProhibitedFilename(_) => "ProhibitedFilename",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::RangeNotSatisfiable { .. } => "RangeNotSatisfiable",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::NotFound(_) => "File not found".to_string(),
            AppError::BadMetadata(_) => "Corrupted metadata".to_string(),
            AppError::EmptyContent => "Empty file".to_string(),
            AppError::FileTooLarge { max, .. } => {
                format!("File too large (max {} bytes)", max)
            }
            AppError::ProhibitedFilename(name) => format!("Prohibited filename: {}", name),
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::RangeNotSatisfiable { .. } => "Range not satisfiable".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
