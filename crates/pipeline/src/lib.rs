//! Handler pipeline for business events.
//!
//! This crate runs an ordered chain of independently written handlers against
//! one event occurrence:
//! - [`Handler`] is the contract every pipeline step implements
//! - [`PipelineContext`] carries data forward from earlier handlers to later ones
//! - [`HandlerRegistry`] maps event types to their handlers, built once at startup
//! - [`EventBus`] is the asynchronous "listen and react" channel
//! - [`Executor`] runs handlers in priority order, isolates failures and
//!   writes one audit record per run
//!
//! ```text
//! emit() ──► EventBus ──► PipelineListener ──┐
//!                                            ▼
//! run_handlers_and_emit() ──────────► Executor::execute_handlers
//!         │                                  │ gate ─► filter enabled ─► sort by priority
//!         │                                  │ handler 1 ─► handler 2 ─► … (sequential)
//!         │                                  ▼
//!         │                             AuditStore::append
//!         └──► EventBus::emit_excluding (other listeners, after the run)
//! ```

pub mod bus;
pub mod context;
pub mod error;
pub mod executor;
pub mod gate;
pub mod handler;
pub mod registry;

pub use bus::{BusEvent, Delivery, EventBus, Listener, SubscriptionId};
pub use context::{HandlerData, PipelineContext, RunMetadata};
pub use error::{PipelineError, Result};
pub use executor::{Executor, ExecutorBuilder, ExecutorConfig, RunOutcome, SkipReason};
pub use gate::{GateDecision, RunGate};
pub use handler::{
    BoxError, DEFAULT_PRIORITY, Handler, HandlerDescriptor, HandlerOutput, HandlerResult,
};
pub use registry::{HandlerRegistry, RegistryBuilder, RegistryStats};
