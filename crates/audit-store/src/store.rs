use async_trait::async_trait;

use crate::{AuditId, AuditQuery, AuditRecord, Result};

/// Core trait for audit store implementations.
///
/// The store is append-only: records are written once per pipeline run and
/// never updated or deleted. All implementations must be thread-safe.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends a record and returns its ID.
    async fn append(&self, record: AuditRecord) -> Result<AuditId>;

    /// Retrieves a record by ID.
    ///
    /// Returns None if no record has that ID.
    async fn get(&self, id: AuditId) -> Result<Option<AuditRecord>>;

    /// Retrieves records matching a query, newest first.
    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditRecord>>;

    /// Returns the total number of stored records.
    async fn count(&self) -> Result<usize>;
}

/// Extension trait providing convenience methods for audit stores.
#[async_trait]
pub trait AuditStoreExt: AuditStore {
    /// Retrieves every record for an event type, newest first.
    async fn records_for_event_type(&self, event_type: &str) -> Result<Vec<AuditRecord>> {
        self.query(AuditQuery::for_event_type(event_type)).await
    }

    /// Retrieves the most recent record for an event type.
    async fn latest_for_event_type(&self, event_type: &str) -> Result<Option<AuditRecord>> {
        let mut records = self
            .query(AuditQuery::for_event_type(event_type).limit(1))
            .await?;
        Ok(records.pop())
    }
}

// Blanket implementation for all AuditStore implementations
impl<T: AuditStore + ?Sized> AuditStoreExt for T {}

#[async_trait]
impl<T: AuditStore + ?Sized> AuditStore for std::sync::Arc<T> {
    async fn append(&self, record: AuditRecord) -> Result<AuditId> {
        (**self).append(record).await
    }

    async fn get(&self, id: AuditId) -> Result<Option<AuditRecord>> {
        (**self).get(id).await
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditRecord>> {
        (**self).query(query).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }
}
