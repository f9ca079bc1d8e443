//! Fulfillment error types.

use common::SaleId;
use thiserror::Error;

/// Errors raised by fulfillment handlers and their collaborators.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The sale does not exist in the repository.
    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    /// The event payload could not be parsed.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// No pre-shipment exists for the sale, so no label can be fetched.
    #[error("No pre-shipment available for sale {0}")]
    MissingPreshipment(SaleId),

    /// A line or sale total does not fit in an `i64` amount of cents.
    #[error("Amount overflow in sale {0}")]
    AmountOverflow(SaleId),

    /// Shipping carrier error.
    #[error("Shipping carrier error: {0}")]
    Carrier(String),

    /// File transfer error.
    #[error("File transfer error: {0}")]
    FileTransfer(String),

    /// Outbound email error.
    #[error("Mailer error: {0}")]
    Mailer(String),

    /// Sale repository error.
    #[error("Sale repository error: {0}")]
    Repository(String),

    /// Context read/write error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
