//! Raw event dispatch in both modes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use pipeline::RunOutcome;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct EmittedResponse {
    pub event_type: String,
    pub listeners: usize,
}

/// POST /events/{event_type}: notifies the bus and returns immediately.
#[tracing::instrument(skip(state, payload))]
pub async fn emit(
    State(state): State<Arc<AppState>>,
    Path(event_type): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<EmittedResponse>), ApiError> {
    validate_event_type(&event_type)?;

    let delivery = state.executor.emit(&event_type, payload);
    let response = EmittedResponse {
        listeners: delivery.listener_count(),
        event_type,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /events/{event_type}/run: runs the pipeline to completion, then
/// notifies the bus.
#[tracing::instrument(skip(state, payload))]
pub async fn run(
    State(state): State<Arc<AppState>>,
    Path(event_type): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<RunOutcome>, ApiError> {
    validate_event_type(&event_type)?;

    let outcome = state.executor.run_handlers_and_emit(&event_type, payload).await;
    Ok(Json(outcome))
}

fn validate_event_type(event_type: &str) -> Result<(), ApiError> {
    if event_type.trim().is_empty() {
        return Err(ApiError::BadRequest("event_type must not be empty".to_string()));
    }
    Ok(())
}
