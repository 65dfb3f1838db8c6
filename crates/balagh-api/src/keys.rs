use axum::Json;
use axum::extract::State;

use balagh_types::api::{PublicKeyResponse, StatusResponse};

use crate::state::AppState;

pub async fn server_pubkey(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: state.keys.public_key_base64(),
    })
}

pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}
