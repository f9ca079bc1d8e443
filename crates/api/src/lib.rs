//! HTTP API server with observability for the fulfillment pipeline.
//!
//! Exposes the executor's two dispatch modes over HTTP, sale intake, and the
//! audit trail, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use audit_store::AuditStore;
use axum::Router;
use axum::routing::{get, post};
use fulfillment::{
    FulfillmentServices, FulfillmentSettings, InMemoryServices, SaleRepository, build_executor,
    build_registry, subscribe_confirmation,
};
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::{EventBus, Executor, ExecutorConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub executor: Executor<Arc<dyn AuditStore>>,
    pub audit_store: Arc<dyn AuditStore>,
    pub sales: Arc<dyn SaleRepository>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/handlers", get(routes::handlers::list))
        .route("/events/{event_type}", post(routes::events::emit))
        .route("/events/{event_type}/run", post(routes::events::run))
        .route("/sales", post(routes::sales::create))
        .route("/sales/{id}", get(routes::sales::get))
        .route("/audit", get(routes::audit::list))
        .route("/audit/{id}", get(routes::audit::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires registry, executor and confirmation listener, then subscribes the
/// executor on the bus.
pub fn create_state(
    audit_store: Arc<dyn AuditStore>,
    services: FulfillmentServices,
    settings: &FulfillmentSettings,
    executor_config: ExecutorConfig,
) -> pipeline::Result<Arc<AppState>> {
    let registry = Arc::new(build_registry(&services, settings)?);
    let bus = EventBus::new();

    let executor = build_executor(registry, Arc::clone(&audit_store), bus.clone(), executor_config);
    executor.initialize();
    subscribe_confirmation(&bus, &services);

    Ok(Arc::new(AppState {
        executor,
        audit_store,
        sales: services.sales,
    }))
}

/// Creates the default application state with in-memory collaborators.
///
/// The concrete services are returned so callers can inspect them.
pub fn create_default_state(
    audit_store: Arc<dyn AuditStore>,
    settings: &FulfillmentSettings,
    executor_config: ExecutorConfig,
) -> pipeline::Result<(Arc<AppState>, InMemoryServices)> {
    let in_memory = InMemoryServices::new();
    let state = create_state(audit_store, in_memory.services(), settings, executor_config)?;
    Ok((state, in_memory))
}
