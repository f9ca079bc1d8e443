use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{AuditId, AuditQuery, AuditRecord, AuditStoreError, Result, store::AuditStore};

/// In-memory audit store implementation for testing and local runs.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    records: Arc<RwLock<Vec<AuditRecord>>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryAuditStore {
    /// Creates a new empty in-memory audit store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns every record in insertion order.
    pub async fn all(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    /// Configures the store to reject appends.
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

fn matches(query: &AuditQuery, record: &AuditRecord) -> bool {
    if let Some(ref event_type) = query.event_type
        && &record.event_type != event_type
    {
        return false;
    }
    if query.failures_only && !record.stats.has_failures() {
        return false;
    }
    if let Some(from) = query.from_timestamp
        && record.recorded_at < from
    {
        return false;
    }
    if let Some(to) = query.to_timestamp
        && record.recorded_at > to
    {
        return false;
    }
    true
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<AuditId> {
        if self.fail_on_append.load(Ordering::SeqCst) {
            return Err(AuditStoreError::Unavailable(
                "in-memory store configured to fail".to_string(),
            ));
        }

        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn get(&self, id: AuditId) -> Result<Option<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;

        // Newest first; insertion order breaks timestamp ties.
        let mut matched: Vec<(usize, &AuditRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches(&query, r))
            .collect();
        matched.sort_by(|(ia, a), (ib, b)| b.recorded_at.cmp(&a.recorded_at).then(ib.cmp(ia)));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
