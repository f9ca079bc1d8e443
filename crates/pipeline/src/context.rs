//! Per-run shared context.
//!
//! One [`PipelineContext`] is created per pipeline run and passed by mutable
//! reference to each handler in turn. Entries are keyed by handler name and a
//! handler can only write its own entry; once written, an entry stays for
//! the rest of the run even if its handler later fails.

use std::collections::BTreeMap;

use audit_store::AuditId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::handler::HandlerOutput;

/// Immutable description of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    run_id: AuditId,
    event_type: String,
    timestamp: DateTime<Utc>,
    source: String,
    triggered_by: String,
}

impl RunMetadata {
    /// Creates metadata for a run starting now.
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        triggered_by: impl Into<String>,
    ) -> Self {
        Self {
            run_id: AuditId::new(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            source: source.into(),
            triggered_by: triggered_by.into(),
        }
    }

    /// The run's ID; the audit record for the run carries the same ID.
    pub fn run_id(&self) -> AuditId {
        self.run_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn triggered_by(&self) -> &str {
        &self.triggered_by
    }
}

/// Data published by handlers during a run, keyed by handler name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerData(BTreeMap<String, serde_json::Value>);

impl HandlerData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handler: &str) -> Option<&serde_json::Value> {
        self.0.get(handler)
    }

    pub fn contains(&self, handler: &str) -> bool {
        self.0.contains_key(handler)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the entries that were added or changed relative to `before`.
    pub fn diff(&self, before: &HandlerData) -> HandlerData {
        HandlerData(
            self.0
                .iter()
                .filter(|(key, value)| before.0.get(*key) != Some(*value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Converts the data into a JSON object.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn entry_mut(&mut self, handler: &str) -> Option<&mut serde_json::Value> {
        self.0.get_mut(handler)
    }

    fn insert(&mut self, handler: &str, value: serde_json::Value) {
        self.0.insert(handler.to_string(), value);
    }
}

/// Mutable accumulator passed through one pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    metadata: RunMetadata,
    handler_data: HandlerData,
    active: Option<&'static str>,
}

impl PipelineContext {
    /// Creates an empty context for a run.
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            handler_data: HandlerData::new(),
            active: None,
        }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn handler_data(&self) -> &HandlerData {
        &self.handler_data
    }

    /// Returns the name of the handler currently allowed to write.
    pub fn active_handler(&self) -> Option<&'static str> {
        self.active
    }

    /// Marks `handler` as the writer for subsequent publishes.
    ///
    /// The executor calls this before each invocation; tests driving a
    /// handler directly call it themselves.
    pub fn enter(&mut self, handler: &'static str) {
        self.active = Some(handler);
    }

    /// Clears the active writer.
    pub fn exit(&mut self) {
        self.active = None;
    }

    /// Publishes `value` as the active handler's entry, replacing any
    /// previous entry.
    pub fn publish<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let handler = self.active.ok_or(PipelineError::NoActiveHandler)?;
        let value = serde_json::to_value(value)?;
        self.handler_data.insert(handler, value);
        Ok(())
    }

    /// Sets one field on the active handler's entry, creating the entry as an
    /// object when absent.
    pub fn set_field<T: Serialize>(&mut self, field: &str, value: T) -> Result<()> {
        let handler = self.active.ok_or(PipelineError::NoActiveHandler)?;
        let value = serde_json::to_value(value)?;

        match self.handler_data.entry_mut(handler) {
            Some(serde_json::Value::Object(map)) => {
                map.insert(field.to_string(), value);
            }
            Some(_) => return Err(PipelineError::NotAnObject(handler.to_string())),
            None => {
                let mut map = serde_json::Map::new();
                map.insert(field.to_string(), value);
                self.handler_data
                    .insert(handler, serde_json::Value::Object(map));
            }
        }
        Ok(())
    }

    /// Reads the typed output published by `T::SOURCE`.
    ///
    /// Returns `Ok(None)` when that handler has not published anything.
    pub fn read<T: HandlerOutput>(&self) -> Result<Option<T>> {
        self.read_as(T::SOURCE)
    }

    /// Reads the entry published by `handler` as `T`.
    pub fn read_as<T: DeserializeOwned>(&self, handler: &str) -> Result<Option<T>> {
        self.handler_data
            .get(handler)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| {
                    PipelineError::UnexpectedShape {
                        handler: handler.to_string(),
                        source,
                    }
                })
            })
            .transpose()
    }

    /// Returns the raw entry published by `handler`.
    pub fn raw(&self, handler: &str) -> Option<&serde_json::Value> {
        self.handler_data.get(handler)
    }

    /// Consumes the context, returning the accumulated handler data.
    pub fn into_handler_data(self) -> HandlerData {
        self.handler_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Preorder {
        tracking_number: String,
    }

    impl HandlerOutput for Preorder {
        const SOURCE: &'static str = "preorder";
    }

    fn context() -> PipelineContext {
        PipelineContext::new(RunMetadata::new("test.event", "event-bus", "system"))
    }

    #[test]
    fn metadata_is_populated() {
        let ctx = context();
        assert_eq!(ctx.metadata().event_type(), "test.event");
        assert_eq!(ctx.metadata().source(), "event-bus");
        assert_eq!(ctx.metadata().triggered_by(), "system");
        assert!(ctx.handler_data().is_empty());
    }

    #[test]
    fn publish_requires_active_handler() {
        let mut ctx = context();
        let result = ctx.publish(&json!({"a": 1}));
        assert!(matches!(result, Err(PipelineError::NoActiveHandler)));
    }

    #[test]
    fn publish_writes_under_active_handler() {
        let mut ctx = context();
        ctx.enter("preorder");
        ctx.publish(&Preorder {
            tracking_number: "TRACK-0001".to_string(),
        })
        .unwrap();
        ctx.exit();

        let read: Option<Preorder> = ctx.read().unwrap();
        assert_eq!(read.unwrap().tracking_number, "TRACK-0001");
        assert_eq!(ctx.raw("preorder"), Some(&json!({"tracking_number": "TRACK-0001"})));
    }

    #[test]
    fn read_missing_entry_is_none() {
        let ctx = context();
        let read: Option<Preorder> = ctx.read().unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn read_wrong_shape_is_error() {
        let mut ctx = context();
        ctx.enter("preorder");
        ctx.publish(&json!({"unexpected": true})).unwrap();

        let result = ctx.read::<Preorder>();
        assert!(matches!(
            result,
            Err(PipelineError::UnexpectedShape { ref handler, .. }) if handler == "preorder"
        ));
    }

    #[test]
    fn set_field_builds_object_incrementally() {
        let mut ctx = context();
        ctx.enter("export");
        ctx.set_field("rows", 3).unwrap();
        ctx.set_field("path", "exports/sales.csv").unwrap();

        assert_eq!(
            ctx.raw("export"),
            Some(&json!({"rows": 3, "path": "exports/sales.csv"}))
        );
    }

    #[test]
    fn set_field_on_scalar_entry_fails() {
        let mut ctx = context();
        ctx.enter("export");
        ctx.publish(&42).unwrap();
        assert!(matches!(
            ctx.set_field("rows", 3),
            Err(PipelineError::NotAnObject(_))
        ));
    }

    #[test]
    fn diff_contains_only_added_or_changed_keys() {
        let mut ctx = context();
        ctx.enter("a");
        ctx.publish(&json!({"v": 1})).unwrap();
        ctx.enter("b");
        ctx.publish(&json!({"v": 1})).unwrap();

        let before = ctx.handler_data().clone();

        ctx.enter("b");
        ctx.publish(&json!({"v": 2})).unwrap();
        ctx.enter("c");
        ctx.publish(&json!({"v": 3})).unwrap();

        let diff = ctx.handler_data().diff(&before);
        assert_eq!(diff.to_value(), json!({"b": {"v": 2}, "c": {"v": 3}}));
        assert!(!diff.contains("a"));
    }

    #[test]
    fn republishing_identical_value_is_not_a_change() {
        let mut ctx = context();
        ctx.enter("a");
        ctx.publish(&json!({"v": 1})).unwrap();
        let before = ctx.handler_data().clone();
        ctx.publish(&json!({"v": 1})).unwrap();
        assert!(ctx.handler_data().diff(&before).is_empty());
    }
}
