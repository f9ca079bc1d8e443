//! Shared types for the fulfillment pipeline.

pub mod types;

pub use types::{CustomerId, SaleId};
