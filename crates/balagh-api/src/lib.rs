pub mod chat;
pub mod error;
pub mod keys;
pub mod reports;
pub mod sealed;
pub mod sink;
pub mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::state::AppState;

/// All intake routes. Cross-cutting layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit_bytes;

    Router::new()
        .route("/health", get(keys::health))
        .route("/server-pubkey", get(keys::server_pubkey))
        .route("/chat", post(chat::chat))
        .route("/submit-report", post(reports::submit_report))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
