//! Turning the different upload request shapes into an [`UploadRequest`]
//! plus a byte source.

use std::io::{self, SeekFrom};

use axum::{
    body::Body,
    extract::Multipart,
    http::{HeaderMap, StatusCode},
};
use filedrop_core::expiry::parse_expiry_secs;
use filedrop_core::AppError;
use filedrop_services::UploadRequest;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use super::request::{is_truthy, option_header};

/// Options carried in headers, shared by every upload route.
pub fn request_from_headers(headers: &HeaderMap) -> UploadRequest {
    UploadRequest {
        delete_key: option_header(headers, "Delete-Key").unwrap_or_default(),
        access_key: option_header(headers, "Access-Key").unwrap_or_default(),
        expiry_secs: option_header(headers, "Expiry").and_then(|v| parse_expiry_secs(&v)),
        randomize: option_header(headers, "Randomize").is_some_and(|v| is_truthy(&v)),
        ..UploadRequest::default()
    }
}

/// Stream a raw request body.
pub fn body_reader(body: Body) -> impl AsyncRead + Send + Unpin + 'static {
    StreamReader::new(body.into_data_stream().map_err(io::Error::other))
}

/// Map a body extraction failure. Running into the buffered body limit is
/// reported as an oversized upload, like every other size failure.
pub fn body_rejection(
    status: StatusCode,
    message: String,
    max_size: u64,
    declared_size: Option<u64>,
) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::FileTooLarge {
            size: declared_size.unwrap_or(max_size.saturating_add(1)),
            max: max_size,
        };
    }
    AppError::BadRequest(message)
}

/// Paste form (`application/x-www-form-urlencoded`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasteForm {
    pub content: String,
    pub filename: String,
    pub extension: String,
    #[serde(alias = "expiry")]
    pub expires: String,
    pub randomize: String,
    pub delete_key: String,
    pub access_key: String,
}

impl PasteForm {
    /// Fold the form into `request`; form values win over headers.
    pub fn apply(&self, request: &mut UploadRequest) {
        let extension = if self.extension.trim().is_empty() {
            "txt"
        } else {
            self.extension.trim()
        };
        request.filename = format!("{}.{}", self.filename.trim(), extension);
        apply_text_field(request, "expires", &self.expires);
        apply_text_field(request, "randomize", &self.randomize);
        apply_text_field(request, "delete_key", &self.delete_key);
        apply_text_field(request, "access_key", &self.access_key);
    }
}

fn apply_text_field(request: &mut UploadRequest, name: &str, value: &str) {
    if value.trim().is_empty() {
        return;
    }
    match name {
        "expires" | "expiry" => {
            if let Some(secs) = parse_expiry_secs(value) {
                request.expiry_secs = Some(secs);
            }
        }
        "randomize" => request.randomize = is_truthy(value),
        "delete_key" => request.delete_key = value.trim().to_string(),
        "access_key" => request.access_key = value.trim().to_string(),
        _ => {}
    }
}

/// Read a multipart upload, spooling the `file` part to an anonymous temp
/// file so that option fields sent after it still apply.
///
/// The spool is capped at `max_size`; larger parts fail without reading
/// the rest of the body.
pub async fn spool_multipart(
    mut multipart: Multipart,
    mut request: UploadRequest,
    max_size: u64,
) -> Result<(UploadRequest, tokio::fs::File), AppError> {
    let mut spooled: Option<tokio::fs::File> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| {
            body_rejection(e.status(), format!("Failed to read multipart: {}", e), max_size, None)
        })?
    {
        let field_name = field.name().map(str::to_string).unwrap_or_default();

        if field_name != "file" {
            let value = field
                .text()
                .await
                .map_err(|e| {
                    body_rejection(e.status(), format!("Failed to read field: {}", e), max_size, None)
                })?;
            apply_text_field(&mut request, &field_name, &value);
            continue;
        }

        if spooled.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }
        request.filename = field.file_name().map(str::to_string).unwrap_or_default();

        let mut file = create_spool_file().await?;
        let mut written: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| {
                body_rejection(e.status(), format!("Failed to read file data: {}", e), max_size, None)
            })?
        {
            written += chunk.len() as u64;
            if written > max_size {
                return Err(AppError::FileTooLarge {
                    size: written,
                    max: max_size,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.seek(SeekFrom::Start(0)).await?;
        spooled = Some(file);
    }

    let file = spooled.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    Ok((request, file))
}

async fn create_spool_file() -> Result<tokio::fs::File, AppError> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| AppError::Internal(format!("Spool task failed: {}", e)))??;
    Ok(tokio::fs::File::from_std(file))
}
