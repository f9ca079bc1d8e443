//! Pipeline error types.

use thiserror::Error;

/// Errors raised by the pipeline's own machinery.
///
/// Handler failures never surface here: the executor records them in the
/// run's statistics instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two handlers were registered under the same name.
    #[error("Handler '{name}' is already registered (event type '{existing_event_type}')")]
    DuplicateHandler {
        name: String,
        existing_event_type: String,
    },

    /// A context write happened outside of any handler invocation.
    #[error("No handler is active on this context")]
    NoActiveHandler,

    /// Data published under a handler key does not have the expected shape.
    #[error("Unexpected data shape for handler '{handler}': {source}")]
    UnexpectedShape {
        handler: String,
        #[source]
        source: serde_json::Error,
    },

    /// Incremental field writes require the handler's entry to be an object.
    #[error("Handler '{0}' published a non-object value; cannot set fields on it")]
    NotAnObject(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
