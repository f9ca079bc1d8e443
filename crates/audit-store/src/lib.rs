//! Audit trail for pipeline runs.
//!
//! Every completed pipeline run produces exactly one [`AuditRecord`]. Records
//! are append-only: nothing in this crate updates or deletes them.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use error::{AuditStoreError, Result};
pub use memory::InMemoryAuditStore;
pub use postgres::PostgresAuditStore;
pub use query::AuditQuery;
pub use record::{
    AuditId, AuditRecord, AuditRecordBuilder, ExecutionStats, HandlerExecutionResult,
};
pub use store::{AuditStore, AuditStoreExt};
