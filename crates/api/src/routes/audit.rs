//! Audit trail queries.

use std::sync::Arc;

use audit_store::{AuditId, AuditQuery, AuditRecord, AuditStore};
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;
const MAX_OFFSET: usize = 1_000_000;

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub event_type: Option<String>,
    #[serde(default)]
    pub failed_only: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditParams {
    fn to_query(&self) -> AuditQuery {
        let mut query = AuditQuery::new()
            .limit(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT))
            .offset(self.offset.unwrap_or(0).min(MAX_OFFSET));
        if let Some(event_type) = &self.event_type {
            query = query.event_type(event_type.clone());
        }
        if self.failed_only {
            query = query.failures_only();
        }
        query
    }
}

/// GET /audit: audit records, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let records = state.audit_store.query(params.to_query()).await?;
    Ok(Json(records))
}

/// GET /audit/{id}: one audit record; its id is the run id.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AuditRecord>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid audit id: {e}")))?;

    let record = state
        .audit_store
        .get(AuditId::from_uuid(uuid))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Audit record {id} not found")))?;

    Ok(Json(record))
}
