//! Static mapping from event type to handlers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::handler::{Handler, HandlerDescriptor};

/// Aggregate counts for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub event_type_count: usize,
    pub handler_count: usize,
    pub per_event_type: BTreeMap<String, usize>,
}

/// Handlers for each event type, in registration order.
///
/// Built once at startup through [`RegistryBuilder`] and never mutated
/// afterwards; share it as `Arc<HandlerRegistry>`.
#[derive(Default)]
pub struct HandlerRegistry {
    // Event types in first-registration order.
    event_types: Vec<String>,
    handlers: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    /// Creates a new registry builder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the handlers registered for `event_type`, in registration
    /// order. Unknown event types yield an empty slice.
    pub fn handlers_for(&self, event_type: &str) -> &[Arc<dyn Handler>] {
        self.handlers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns every event type with at least one registered handler.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.event_types.iter().map(String::as_str)
    }

    /// Returns descriptors for every registered handler.
    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.event_types
            .iter()
            .flat_map(|event_type| self.handlers_for(event_type))
            .map(|handler| handler.descriptor())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let per_event_type: BTreeMap<String, usize> = self
            .handlers
            .iter()
            .map(|(event_type, handlers)| (event_type.clone(), handlers.len()))
            .collect();

        RegistryStats {
            event_type_count: per_event_type.len(),
            handler_count: per_event_type.values().sum(),
            per_event_type,
        }
    }
}

/// Builder for [`HandlerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    registry: HandlerRegistry,
    names: HashMap<&'static str, &'static str>,
}

impl RegistryBuilder {
    /// Registers a handler under its own event type.
    ///
    /// Handler names must be unique across the whole registry.
    pub fn register(mut self, handler: Arc<dyn Handler>) -> Result<Self> {
        let name = handler.name();
        let event_type = handler.event_type();

        if let Some(existing) = self.names.get(name) {
            return Err(PipelineError::DuplicateHandler {
                name: name.to_string(),
                existing_event_type: existing.to_string(),
            });
        }
        self.names.insert(name, event_type);

        let registry = &mut self.registry;
        if !registry.handlers.contains_key(event_type) {
            registry.event_types.push(event_type.to_string());
        }
        registry
            .handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);

        tracing::debug!(handler = name, event_type, "handler registered");
        Ok(self)
    }

    /// Registers several handlers in order.
    pub fn register_all(
        mut self,
        handlers: impl IntoIterator<Item = Arc<dyn Handler>>,
    ) -> Result<Self> {
        for handler in handlers {
            self = self.register(handler)?;
        }
        Ok(self)
    }

    pub fn build(self) -> HandlerRegistry {
        self.registry
    }
}
