use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(Uuid);

impl AuditId {
    /// Creates a new random audit ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an audit ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AuditId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Outcome of one handler invocation within a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerExecutionResult {
    /// Name of the handler that ran.
    pub handler_name: String,

    /// Whether the handler returned successfully.
    pub success: bool,

    /// Error message when the handler failed.
    pub error: Option<String>,

    /// Wall-clock time spent inside the handler.
    pub duration_ms: u64,

    /// Context keys the handler added or changed. Empty for failed handlers.
    pub context_diff: serde_json::Value,
}

impl HandlerExecutionResult {
    /// Records a successful invocation.
    pub fn succeeded(
        handler_name: impl Into<String>,
        duration_ms: u64,
        context_diff: serde_json::Value,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            success: true,
            error: None,
            duration_ms,
            context_diff,
        }
    }

    /// Records a failed invocation.
    pub fn failed(handler_name: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            success: false,
            error: Some(error.into()),
            duration_ms,
            context_diff: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Aggregate statistics for one pipeline run.
///
/// `results` preserves execution order, so `results[0]` is the handler that
/// ran first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub results: Vec<HandlerExecutionResult>,
}

impl ExecutionStats {
    /// Builds statistics from the ordered per-handler results.
    pub fn from_results(results: Vec<HandlerExecutionResult>, total_duration_ms: u64) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            executed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            total_duration_ms,
            results,
        }
    }

    /// Returns true if any handler failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns the result recorded for a handler, if it ran.
    pub fn result_for(&self, handler_name: &str) -> Option<&HandlerExecutionResult> {
        self.results.iter().find(|r| r.handler_name == handler_name)
    }

    /// Returns the handler names in the order they executed.
    pub fn execution_order(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.handler_name.as_str()).collect()
    }
}

/// The persisted summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,

    /// The event type that triggered the run (e.g., "sale.created").
    pub event_type: String,

    /// The raw event payload, as received.
    pub payload: serde_json::Value,

    #[serde(flatten)]
    pub stats: ExecutionStats,

    /// Final snapshot of the shared context's handler data.
    pub handler_data: serde_json::Value,

    /// Where the run came from (e.g., "event-bus").
    pub source: String,

    /// What triggered the run (e.g., "system").
    pub triggered_by: String,

    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a new audit record builder.
    pub fn builder() -> AuditRecordBuilder {
        AuditRecordBuilder::default()
    }
}

/// Builder for constructing audit records.
#[derive(Debug, Default)]
pub struct AuditRecordBuilder {
    id: Option<AuditId>,
    event_type: Option<String>,
    payload: Option<serde_json::Value>,
    stats: ExecutionStats,
    handler_data: Option<serde_json::Value>,
    source: Option<String>,
    triggered_by: Option<String>,
    recorded_at: Option<DateTime<Utc>>,
}

impl AuditRecordBuilder {
    /// Sets the record ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: AuditId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn stats(mut self, stats: ExecutionStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn handler_data(mut self, handler_data: serde_json::Value) -> Self {
        self.handler_data = Some(handler_data);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn triggered_by(mut self, triggered_by: impl Into<String>) -> Self {
        self.triggered_by = Some(triggered_by.into());
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Tries to build the record, returning None if the event type is missing.
    ///
    /// Payload and handler data default to `null` and `{}`; source and trigger
    /// default to empty strings.
    pub fn try_build(self) -> Option<AuditRecord> {
        Some(AuditRecord {
            id: self.id.unwrap_or_default(),
            event_type: self.event_type?,
            payload: self.payload.unwrap_or(serde_json::Value::Null),
            stats: self.stats,
            handler_data: self
                .handler_data
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            source: self.source.unwrap_or_default(),
            triggered_by: self.triggered_by.unwrap_or_default(),
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audit_id_new_creates_unique_ids() {
        assert_ne!(AuditId::new(), AuditId::new());
    }

    #[test]
    fn stats_count_successes_and_failures() {
        let stats = ExecutionStats::from_results(
            vec![
                HandlerExecutionResult::failed("a", 3, "boom"),
                HandlerExecutionResult::succeeded("b", 5, json!({"b": {"ok": true}})),
                HandlerExecutionResult::succeeded("c", 1, json!({})),
            ],
            12,
        );

        assert_eq!(stats.executed, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_duration_ms, 12);
        assert!(stats.has_failures());
        assert_eq!(stats.execution_order(), vec!["a", "b", "c"]);
        assert_eq!(
            stats.result_for("a").and_then(|r| r.error.as_deref()),
            Some("boom")
        );
    }

    #[test]
    fn failed_result_has_empty_diff() {
        let result = HandlerExecutionResult::failed("a", 0, "nope");
        assert!(!result.success);
        assert_eq!(result.context_diff, json!({}));
    }

    #[test]
    fn builder_fills_defaults() {
        let record = AuditRecord::builder()
            .event_type("sale.created")
            .try_build()
            .unwrap();

        assert_eq!(record.event_type, "sale.created");
        assert_eq!(record.payload, serde_json::Value::Null);
        assert_eq!(record.handler_data, json!({}));
        assert_eq!(record.stats, ExecutionStats::default());
    }

    #[test]
    fn builder_requires_event_type() {
        assert!(AuditRecord::builder().try_build().is_none());
    }

    #[test]
    fn record_serializes_stats_inline() {
        let record = AuditRecord::builder()
            .event_type("sale.created")
            .stats(ExecutionStats::from_results(
                vec![HandlerExecutionResult::succeeded("a", 1, json!({}))],
                1,
            ))
            .source("event-bus")
            .triggered_by("system")
            .try_build()
            .unwrap();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["executed"], json!(1));
        assert_eq!(value["succeeded"], json!(1));
        assert_eq!(value["source"], json!("event-bus"));
        assert_eq!(value["results"][0]["handler_name"], json!("a"));
    }
}
