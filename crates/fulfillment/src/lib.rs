//! Order fulfillment pipeline for approved sales.
//!
//! When a sale is created with an approved payment, these handlers run in
//! order against the `sale.created` event:
//! 1. Create a shipping pre-order with the carrier
//! 2. Export accounting rows to the shared spreadsheet
//! 3. Mark invoicing as pending
//! 4. Fetch and publish the shipping label
//!
//! `sale.created` is driven synchronously so the [`ConfirmationListener`] can
//! include the tracking number in the customer email.

pub mod confirmation;
pub mod error;
pub mod events;
pub mod gate;
pub mod handlers;
pub mod sale;
pub mod services;
pub mod wiring;

pub use confirmation::ConfirmationListener;
pub use error::{FulfillmentError, Result};
pub use events::{PAYMENT_APPROVED, SALE_CREATED, SaleCreated};
pub use gate::ApprovedPaymentGate;
pub use handlers::{
    AccountingExportHandler, AccountingExportOutput, InvoicingPendingHandler,
    InvoicingPendingOutput, ShippingLabelsHandler, ShippingLabelsOutput, ShippingPreorderHandler,
    ShippingPreorderOutput,
};
pub use sale::{Customer, InvoicingStatus, Sale, SaleItem, ShippingAddress};
pub use services::{
    Email, FileTransfer, InMemoryFileTransfer, InMemoryMailer, InMemorySaleRepository,
    InMemoryShippingCarrier, Mailer, Preshipment, SaleRepository, ShippingCarrier,
};
pub use wiring::{
    FulfillmentServices, FulfillmentSettings, InMemoryServices, build_executor, build_registry,
    subscribe_confirmation,
};

#[cfg(test)]
pub(crate) mod test_support;
