//! Read-side handlers: object info and content delivery.
//!
//! Every read resolves the object through the expiry enforcer first, then
//! checks its access key, then serves.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::FormRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use filedrop_core::{AppError, Metadata};
use serde::{Deserialize, Serialize};

use crate::auth::access_key::authorize_read;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::range::{if_none_match, if_range_matches, parse_range};
use crate::utils::request::accepts_json;

#[derive(Debug, Default, Deserialize)]
pub struct AccessKeyParam {
    pub access_key: Option<String>,
}

/// Object description for JSON clients
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub direct_url: String,
    pub expiry: String,
    pub size: String,
    pub mimetype: String,
    pub sha256sum: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub archive_files: Vec<String>,
}

impl FileInfo {
    fn new(state: &AppState, filename: &str, metadata: Metadata) -> Self {
        Self {
            filename: filename.to_string(),
            direct_url: state.config.direct_url(filename),
            expiry: metadata.expiry.unix_timestamp().to_string(),
            size: metadata.size.to_string(),
            mimetype: metadata.mimetype,
            sha256sum: metadata.sha256sum,
            archive_files: metadata.archive_files,
        }
    }
}

/// `GET /{name}`: info for JSON clients, otherwise the content
pub async fn display(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    method: Method,
    headers: HeaderMap,
    jar: CookieJar,
    query: Result<Query<AccessKeyParam>, QueryRejection>,
) -> Result<Response, HttpAppError> {
    let query = query.ok().and_then(|Query(q)| q.access_key);
    read(&state, &name, &method, &headers, &jar, None, query).await
}

/// `POST /{name}` with an `access_key` form field
pub async fn display_form(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    query: Result<Query<AccessKeyParam>, QueryRejection>,
    form: Result<Form<AccessKeyParam>, FormRejection>,
) -> Result<Response, HttpAppError> {
    let query = query.ok().and_then(|Query(q)| q.access_key);
    let form = form.ok().and_then(|Form(f)| f.access_key);
    read(
        &state,
        &name,
        &Method::GET,
        &headers,
        &jar,
        form,
        query,
    )
    .await
}

/// `GET|HEAD /{selif}/{name}`: the same answers under the raw path
pub async fn serve_raw(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    method: Method,
    headers: HeaderMap,
    jar: CookieJar,
    query: Result<Query<AccessKeyParam>, QueryRejection>,
) -> Result<Response, HttpAppError> {
    let query = query.ok().and_then(|Query(q)| q.access_key);
    read(&state, &name, &method, &headers, &jar, None, query).await
}

async fn read(
    state: &AppState,
    name: &str,
    method: &Method,
    headers: &HeaderMap,
    jar: &CookieJar,
    form: Option<String>,
    query: Option<String>,
) -> Result<Response, HttpAppError> {
    let metadata = state.expiry.check(name).await?;

    let access = authorize_read(
        &state.config,
        name,
        &metadata,
        jar,
        headers,
        form.as_deref(),
        query.as_deref(),
    );

    let mut response = if !access.granted {
        access_denied(headers)
    } else if accepts_json(headers) {
        Json(FileInfo::new(state, name, metadata)).into_response()
    } else {
        match serve_content(state, name, &metadata, method, headers).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    };

    access.apply(&mut response);
    Ok(response)
}

fn access_denied(headers: &HeaderMap) -> Response {
    if accepts_json(headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid access key" })),
        )
            .into_response();
    }
    HttpAppError(AppError::Unauthorized("invalid access key".to_string())).into_response()
}

fn header_value(value: &str) -> Result<HeaderValue, HttpAppError> {
    HeaderValue::from_str(value)
        .map_err(|_| HttpAppError(AppError::Internal("Failed to build response header".into())))
}

/// Stream the content, honouring `If-None-Match`, `Range` and `If-Range`.
async fn serve_content(
    state: &AppState,
    name: &str,
    metadata: &Metadata,
    method: &Method,
    request_headers: &HeaderMap,
) -> Result<Response, HttpAppError> {
    let etag = format!("\"{}\"", metadata.sha256sum);

    let mut headers = HeaderMap::new();
    headers.insert(header::ETAG, header_value(&etag)?);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, no-cache"),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if if_none_match(request_headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    headers.insert(header::CONTENT_TYPE, header_value(&metadata.mimetype)?);

    if *method == Method::HEAD {
        headers.insert(header::CONTENT_LENGTH, header_value(&metadata.size.to_string())?);
        return Ok((StatusCode::OK, headers, Body::empty()).into_response());
    }

    let range = if if_range_matches(request_headers, &etag) {
        match parse_range(request_headers.get(header::RANGE), metadata.size) {
            Ok(range) => range,
            Err(AppError::RangeNotSatisfiable { size }) => {
                let mut response =
                    HttpAppError(AppError::RangeNotSatisfiable { size }).into_response();
                response
                    .headers_mut()
                    .insert(header::CONTENT_RANGE, header_value(&format!("bytes */{}", size))?);
                return Ok(response);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    let served = state.storage.serve_file(name, range).await?;
    headers.insert(
        header::CONTENT_LENGTH,
        header_value(&served.content_length().to_string())?,
    );

    let status = match served.range {
        Some(range) => {
            tracing::debug!(
                filename = %name,
                start = range.start,
                end = range.end,
                "Serving byte range"
            );
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!(
                    "bytes {}-{}/{}",
                    range.start, range.end, served.total_size
                ))?,
            );
            StatusCode::PARTIAL_CONTENT
        }
        None => StatusCode::OK,
    };

    Ok((status, headers, Body::from_stream(served.body)).into_response())
}
