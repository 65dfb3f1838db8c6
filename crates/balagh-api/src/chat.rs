use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::info;

use balagh_crypto::envelope::ResponseEnvelope;
use balagh_types::api::{ChatAnswer, ChatPayload, SealedRequest};

use crate::error::ApiError;
use crate::sealed::{self, Unsealed};
use crate::state::AppState;

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<SealedRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let req = sealed::body(payload)?;
    let session_id = req
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::missing("sessionId"))?;

    let Unsealed { payload, keys } = sealed::unseal::<ChatPayload>(&state, &req)?;
    let prompt = payload.prompt.ok_or_else(|| ApiError::missing("prompt"))?;

    let outcome = state
        .pipeline
        .handle(&session_id, &prompt, &payload.files)
        .await?;

    if let Some(report) = &outcome.report {
        info!(session_id = %session_id, report_id = %report.id, "Chat completed a report");
    }

    sealed::seal(
        &keys,
        &ChatAnswer {
            answer: outcome.answer,
        },
    )
}
