//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use filedrop_core::Config;
use filedrop_services::ApiKeySet;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::error::hide_error_details;
use crate::handlers;
use crate::state::AppState;

/// Room for multipart framing and form encoding on top of the size cap.
/// Buffering extractors (paste forms, multipart) are held to this; raw
/// bodies stream through the upload pipeline's own size check.
const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
    api_keys: Option<Arc<ApiKeySet>>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config);
    let auth_state = Arc::new(AuthState {
        api_keys,
        unauth_methods: config.unauth_methods.clone(),
    });

    let protected_routes = protected_routes()
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_uploads));
    let routes = public_routes(config).merge(protected_routes);

    let prefix = config.site_path();
    let prefix = prefix.trim_end_matches('/');
    let routes = if prefix.is_empty() {
        routes
    } else {
        tracing::info!(prefix = %prefix, "Mounting routes under site path");
        Router::new().nest(prefix, routes)
    };

    let body_limit = usize::try_from(config.max_size_bytes.saturating_add(BODY_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    let app = routes
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let app = if config.is_production() {
        app.layer(axum::middleware::from_fn(hide_error_details))
    } else {
        app
    };

    Ok(app.with_state(state))
}

/// Reads, health and helpers; never behind the API key
fn public_routes(config: &Config) -> Router<Arc<AppState>> {
    let selif_route = format!("/{}/{{name}}", config.selif_path());
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/ready", get(handlers::health::ready))
        .route("/expiry-choices", get(handlers::expiry::expiry_choices))
        .route(&selif_route, get(handlers::file::serve_raw))
        .route(
            "/{name}",
            get(handlers::file::display).post(handlers::file::display_form),
        )
}

/// Uploads and deletes
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload_post).put(handlers::upload::upload_put),
        )
        .route("/upload/", post(handlers::upload::upload_post))
        .route("/upload/{name}", put(handlers::upload::upload_put_named))
        .route("/{name}", delete(handlers::delete::delete_file))
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if config.cors_origins().iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
