//! Upload API-key check for the write surface.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use filedrop_core::AppError;
use filedrop_services::ApiKeySet;

use crate::error::HttpAppError;

const API_KEY_HEADERS: [&str; 2] = ["Api-Key", "Linx-Api-Key"];

#[derive(Clone)]
pub struct AuthState {
    /// `None` disables the check
    pub api_keys: Option<Arc<ApiKeySet>>,
    pub unauth_methods: Vec<String>,
}

impl AuthState {
    fn is_exempt(&self, method: &str) -> bool {
        self.unauth_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// The key from the API-key headers, or else the basic-auth password.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    API_KEY_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| basic_auth_password(headers))
}

fn basic_auth_password(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_user, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_keys) = auth_state.api_keys.clone() else {
        return next.run(request).await;
    };

    if auth_state.is_exempt(request.method().as_str()) {
        return next.run(request).await;
    }

    let candidate = extract_api_key(request.headers()).unwrap_or_default();

    // Hashing is deliberately slow; keep it off the async workers.
    let valid = tokio::task::spawn_blocking(move || api_keys.check(&candidate))
        .await
        .unwrap_or(false);

    if !valid {
        tracing::debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request without a valid API key"
        );
        let mut response =
            HttpAppError(AppError::Unauthorized("invalid API key".to_string())).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"filedrop\""),
        );
        return response;
    }

    next.run(request).await
}
