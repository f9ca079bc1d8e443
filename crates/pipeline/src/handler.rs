//! The contract every pipeline step implements.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::PipelineContext;

/// Priority assigned to handlers that do not declare one.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Boxed error returned by handlers. Each handler crate converts its own
/// error type into this with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single handler invocation.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// One independently written step reacting to an event type.
///
/// Handlers run sequentially in ascending [`priority`](Handler::priority)
/// order. A handler may read whatever earlier handlers published in the
/// context, but must tolerate those entries being absent: the producer may be
/// disabled, may have failed, or may not have published anything.
///
/// Returning an error only discards this handler's own contribution; the
/// executor records it and moves on to the next handler. Side effects on
/// external systems are the handler's responsibility and are not rolled back.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Returns the unique name of this handler. Also used as its context key.
    fn name(&self) -> &'static str;

    /// Returns the event type this handler reacts to.
    fn event_type(&self) -> &'static str;

    /// Returns a short human-readable description.
    fn description(&self) -> &'static str {
        ""
    }

    /// Lower values run first. Equal priorities keep registration order.
    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    /// Disabled handlers are left out of a run entirely.
    fn enabled(&self) -> bool {
        true
    }

    /// Performs the handler's side effect.
    async fn execute(
        &self,
        payload: &serde_json::Value,
        ctx: &mut PipelineContext,
    ) -> HandlerResult;

    /// Returns a serializable description of this handler.
    fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor {
            name: self.name().to_string(),
            event_type: self.event_type().to_string(),
            priority: self.priority(),
            enabled: self.enabled(),
            description: self.description().to_string(),
        }
    }
}

/// Serializable registration entry for a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub name: String,
    pub event_type: String,
    pub priority: u32,
    pub enabled: bool,
    pub description: String,
}

/// The typed shape of data a handler publishes to the context.
///
/// `SOURCE` must match the publishing handler's [`Handler::name`]; readers
/// use it to find the entry via [`PipelineContext::read`].
pub trait HandlerOutput: Serialize + DeserializeOwned {
    const SOURCE: &'static str;
}
