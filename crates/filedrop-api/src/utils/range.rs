//! Single byte-range requests

use axum::http::{header, HeaderMap, HeaderValue};
use filedrop_core::AppError;
use filedrop_services::ByteRange;

/// Parse a `Range` header against an object of `size` bytes.
///
/// Only one `bytes=` range is supported. A suffix range of zero is treated
/// as no range at all.
pub fn parse_range(value: Option<&HeaderValue>, size: u64) -> Result<Option<ByteRange>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = || AppError::BadRequest("invalid Range header".to_string());

    let value = value.to_str().map_err(|_| invalid())?;
    let Some(range) = value.trim().strip_prefix("bytes=") else {
        return Err(invalid());
    };
    if range.contains(',') {
        return Err(AppError::BadRequest("multiple ranges not supported".to_string()));
    }
    if size == 0 {
        return Err(AppError::RangeNotSatisfiable { size });
    }

    let (start_part, end_part) = range.split_once('-').ok_or_else(invalid)?;
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    let (start, end) = if start_part.is_empty() {
        let suffix: u64 = end_part.parse().map_err(|_| invalid())?;
        if suffix == 0 {
            return Ok(None);
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let start: u64 = start_part.parse().map_err(|_| invalid())?;
        let end: u64 = if end_part.is_empty() {
            size - 1
        } else {
            end_part.parse().map_err(|_| invalid())?
        };
        (start, end.min(size - 1))
    };

    if start > end || start >= size {
        return Err(AppError::RangeNotSatisfiable { size });
    }

    Ok(Some(ByteRange { start, end }))
}

/// Whether an `If-Range` precondition allows the range to be honoured.
/// Only entity tags are compared; objects carry no modification time.
pub fn if_range_matches(headers: &HeaderMap, etag: &str) -> bool {
    match headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => value.trim() == etag,
        None => true,
    }
}

/// Whether `If-None-Match` names `etag` (or `*`).
pub fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value.split(',').map(str::trim).any(|tag| {
                tag == "*" || tag == etag || tag.strip_prefix("W/").is_some_and(|t| t == etag)
            })
        })
        .unwrap_or(false)
}
