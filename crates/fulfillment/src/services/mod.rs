//! External collaborators used by the fulfillment handlers.
//!
//! Each collaborator is a trait with an in-memory implementation that can be
//! told to fail, for tests and for running the service without real
//! integrations.

mod carrier;
mod file_transfer;
mod mailer;
mod sales;

pub use carrier::{InMemoryShippingCarrier, Preshipment, ShippingCarrier};
pub use file_transfer::{FileTransfer, InMemoryFileTransfer};
pub use mailer::{Email, InMemoryMailer, Mailer};
pub use sales::{InMemorySaleRepository, SaleRepository};
