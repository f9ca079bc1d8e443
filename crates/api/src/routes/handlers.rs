//! Registry introspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use pipeline::{HandlerDescriptor, RegistryStats};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HandlersResponse {
    pub stats: RegistryStats,
    pub sync_only_event_types: Vec<String>,
    pub handlers: Vec<HandlerDescriptor>,
}

/// GET /handlers: registered handlers with their priority and enabled flag.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<HandlersResponse> {
    let registry = state.executor.registry();
    let mut handlers = registry.descriptors();
    handlers.sort_by(|a, b| {
        a.event_type
            .cmp(&b.event_type)
            .then(a.priority.cmp(&b.priority))
    });

    Json(HandlersResponse {
        stats: registry.stats(),
        sync_only_event_types: state
            .executor
            .config()
            .sync_only_event_types
            .iter()
            .cloned()
            .collect(),
        handlers,
    })
}
