use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use balagh_conversation::pipeline::PipelineError;
use balagh_conversation::store::StoreError;
use balagh_crypto::CryptoError;
use balagh_types::api::ErrorResponse;

/// Every crypto failure gets this exact body so callers cannot tell a bad tag
/// from a bad key or bad encoding.
pub const CRYPTO_FAILURE_MESSAGE: &str = "unable to process request";
pub const PERSISTENCE_FAILURE_MESSAGE: &str = "failed to save report, please retry";
pub const INTERNAL_FAILURE_MESSAGE: &str = "internal error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("persistence failed: {0}")]
    Persistence(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("missing field: {field}"))
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Store(e) => Self::Store(e),
            PipelineError::Persistence(e) => Self::Persistence(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Crypto(e) => {
                debug!(error = %e, "Rejected sealed request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CRYPTO_FAILURE_MESSAGE.to_string(),
                )
            }
            ApiError::Persistence(e) => {
                error!(error = %e, "Persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PERSISTENCE_FAILURE_MESSAGE.to_string(),
                )
            }
            ApiError::Store(_) | ApiError::Internal(_) => {
                error!(error = %self, "Internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_FAILURE_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
