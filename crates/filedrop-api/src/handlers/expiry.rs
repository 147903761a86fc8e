use std::sync::Arc;

use axum::{extract::State, Json};
use filedrop_core::expiry::expiration_choices;
use filedrop_core::ExpirationChoice;

use crate::state::AppState;

/// `GET /expiry-choices`
pub async fn expiry_choices(State(state): State<Arc<AppState>>) -> Json<Vec<ExpirationChoice>> {
    Json(expiration_choices(state.config.max_expiry_secs))
}
