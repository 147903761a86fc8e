//! Upload handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use filedrop_core::{AppError, Upload};
use filedrop_services::UploadRequest;
use serde::Serialize;

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::request::{accepts_json, content_length};
use crate::utils::upload::{
    body_reader, body_rejection, request_from_headers, spool_multipart, PasteForm,
};

/// Upload result as sent to JSON clients. Every value is a string.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub direct_url: String,
    pub filename: String,
    pub delete_key: String,
    pub access_key: String,
    pub expiry: String,
    pub size: String,
    pub mimetype: String,
    pub sha256sum: String,
}

impl UploadResponse {
    fn new(state: &AppState, upload: &Upload) -> Self {
        let metadata = &upload.metadata;
        Self {
            url: state.config.file_url(&upload.filename),
            direct_url: state.config.direct_url(&upload.filename),
            filename: upload.filename.clone(),
            delete_key: metadata.delete_key.clone(),
            access_key: metadata.access_key.clone(),
            expiry: metadata.expiry.unix_timestamp().to_string(),
            size: metadata.size.to_string(),
            mimetype: metadata.mimetype.clone(),
            sha256sum: metadata.sha256sum.clone(),
        }
    }
}

enum Reply {
    /// Browser form posts are sent on to the new object
    Redirect,
    PlainUrl,
}

fn respond(state: &AppState, headers: &HeaderMap, upload: &Upload, reply: Reply) -> Response {
    if accepts_json(headers) {
        return Json(UploadResponse::new(state, upload)).into_response();
    }
    let url = state.config.file_url(&upload.filename);
    match reply {
        Reply::Redirect => Redirect::to(&url).into_response(),
        Reply::PlainUrl => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            url,
        )
            .into_response(),
    }
}

fn mime_essence(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// `POST /upload`: multipart file, urlencoded paste, or a raw body.
#[tracing::instrument(skip(state, request))]
pub async fn upload_post(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, HttpAppError> {
    let headers = request.headers().clone();
    let mut upload_request = request_from_headers(&headers);
    let max_size = state.uploads.policy().max_size;
    let declared_size = content_length(&headers);

    let upload = match mime_essence(&headers).as_str() {
        "multipart/form-data" => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| body_rejection(e.status(), e.body_text(), max_size, declared_size))?;
            let (upload_request, file) =
                spool_multipart(multipart, upload_request, max_size).await?;
            state.uploads.upload(upload_request, file).await?
        }
        "application/x-www-form-urlencoded" => {
            let Form(paste) = Form::<PasteForm>::from_request(request, &state)
                .await
                .map_err(|e| body_rejection(e.status(), e.body_text(), max_size, declared_size))?;
            if paste.content.is_empty() {
                return Err(AppError::EmptyContent.into());
            }
            paste.apply(&mut upload_request);
            let content = std::io::Cursor::new(paste.content.into_bytes());
            state.uploads.upload(upload_request, content).await?
        }
        _ => {
            upload_request.declared_size = declared_size;
            upload_raw(&state, upload_request, request.into_body()).await?
        }
    };

    Ok(respond(&state, &headers, &upload, Reply::Redirect))
}

/// `PUT /upload`: raw body under a random name.
pub async fn upload_put(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, HttpAppError> {
    let mut upload_request = request_from_headers(&headers);
    upload_request.declared_size = content_length(&headers);
    let upload = upload_raw(&state, upload_request, body).await?;
    Ok(respond(&state, &headers, &upload, Reply::PlainUrl))
}

/// `PUT /upload/{name}`: raw body under a suggested name.
pub async fn upload_put_named(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, HttpAppError> {
    let mut upload_request = request_from_headers(&headers);
    upload_request.filename = name;
    upload_request.declared_size = content_length(&headers);
    let upload = upload_raw(&state, upload_request, body).await?;
    Ok(respond(&state, &headers, &upload, Reply::PlainUrl))
}

async fn upload_raw(
    state: &AppState,
    upload_request: UploadRequest,
    body: Body,
) -> Result<Upload, HttpAppError> {
    Ok(state
        .uploads
        .upload(upload_request, body_reader(body))
        .await?)
}
