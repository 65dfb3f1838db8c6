use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use balagh_crypto::channel::{self, OpenedRequest};
use balagh_crypto::envelope::{self, Envelope, ResponseEnvelope};
use balagh_crypto::session::SessionKeys;
use balagh_types::api::SealedRequest;

use crate::error::ApiError;
use crate::state::AppStateInner;

/// A decrypted, deserialized request and the keys to answer it with.
pub struct Unsealed<T> {
    pub payload: T,
    pub keys: SessionKeys,
}

/// Turn a framework JSON rejection into our 400 body.
pub fn body(
    payload: Result<Json<SealedRequest>, JsonRejection>,
) -> Result<SealedRequest, ApiError> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
    }
}

pub fn envelope_of(req: &SealedRequest) -> Result<Envelope, ApiError> {
    let field = |value: &Option<String>, name: &str| {
        value
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::missing(name))
    };

    Ok(Envelope {
        ephemeral_pub: field(&req.ephemeral_pub, "ephemeral_pub")?,
        nonce: field(&req.nonce, "nonce")?,
        ciphertext: field(&req.ciphertext, "ciphertext")?,
        ts: req.ts,
    })
}

/// Decrypt the envelope and parse its JSON payload.
pub fn unseal<T: DeserializeOwned>(
    state: &AppStateInner,
    req: &SealedRequest,
) -> Result<Unsealed<T>, ApiError> {
    let envelope = envelope_of(req)?;
    let OpenedRequest {
        plaintext,
        keys,
        ts,
    } = channel::open_request(&state.keys, &envelope)?;

    if !envelope::within_replay_window(ts, envelope::unix_now(), state.replay_window_secs) {
        warn!(ts = ?ts, "Envelope timestamp outside replay window");
    }

    let payload = serde_json::from_slice(&plaintext)
        .map_err(|_| ApiError::Validation("malformed payload".into()))?;

    Ok(Unsealed { payload, keys })
}

/// Encrypt a JSON reply under the request's keys.
pub fn seal<T: Serialize>(keys: &SessionKeys, body: &T) -> Result<Json<ResponseEnvelope>, ApiError> {
    let plaintext = serde_json::to_vec(body).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(channel::seal_response(keys, &plaintext)?))
}
