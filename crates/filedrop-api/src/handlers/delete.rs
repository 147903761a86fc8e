use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use filedrop_core::AppError;
use filedrop_services::StorageError;
use subtle::ConstantTimeEq;

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::extract_client_ip;
use crate::utils::request::option_header;

/// `DELETE /{name}`
///
/// Needs the object's delete key unless the caller's address is a trusted
/// deleter. A wrong key and a missing key look the same to the client.
#[tracing::instrument(skip(state, request))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    request: Request,
) -> Result<Response, HttpAppError> {
    let metadata = state.expiry.check(&name).await?;

    let supplied = option_header(request.headers(), "Delete-Key")
        .or_else(|| {
            request
                .headers()
                .get("X-Delete-Key")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let key_matches = !supplied.is_empty()
        && supplied.len() == metadata.delete_key.len()
        && bool::from(supplied.as_bytes().ct_eq(metadata.delete_key.as_bytes()));

    let authorized = key_matches || {
        let socket_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client_ip = extract_client_ip(
            request.headers(),
            socket_addr.as_ref(),
            state.config.trusted_proxy_count,
        );
        let trusted = state.config.is_trusted_deleter(&client_ip);
        if trusted {
            tracing::info!(filename = %name, client_ip = %client_ip, "Trusted deleter bypassed delete key");
        }
        trusted
    };

    if !authorized {
        return Err(AppError::Unauthorized("delete key mismatch".to_string()).into());
    }

    match state.storage.delete(&name).await {
        Ok(()) => {}
        // Raced with another delete or the sweep
        Err(StorageError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!(filename = %name, "File deleted");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "DELETED",
    )
        .into_response())
}
