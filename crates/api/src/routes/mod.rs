//! HTTP route handlers.

pub mod audit;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod sales;
