use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Utc;
use tracing::info;

use balagh_conversation::extractor::{RawReport, normalize_report};
use balagh_types::api::{SealedRequest, StatusResponse, SubmitReportPayload};

use crate::error::ApiError;
use crate::sealed::{self, Unsealed};
use crate::state::AppState;

/// Manual form submission. Media goes to the media store first; the report
/// only keeps the returned ids.
pub async fn submit_report(
    State(state): State<AppState>,
    payload: Result<Json<SealedRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = sealed::body(payload)?;
    let Unsealed { payload, .. } = sealed::unseal::<SubmitReportPayload>(&state, &req)?;
    let draft = payload.into_draft();

    // Media and report are separate writes. If the report insert fails the
    // stored media rows stay behind unreferenced; the client retries with a
    // fresh upload and the media table is never cleaned.
    let media = state
        .media
        .store(&draft.media)
        .await
        .map_err(ApiError::Persistence)?;

    let report = normalize_report(
        RawReport {
            title: draft.title,
            category: draft.category,
            address: draft.address,
            date: draft.date,
            description: draft.description,
            media,
        },
        Utc::now(),
    );

    state
        .reports
        .insert(&report)
        .await
        .map_err(ApiError::Persistence)?;

    info!(report_id = %report.id, media = report.media.len(), "Report submitted");
    Ok(Json(StatusResponse::ok()))
}
