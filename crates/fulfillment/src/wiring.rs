//! Assembles the fulfillment handlers into a registry and executor.

use std::collections::BTreeSet;
use std::sync::Arc;

use audit_store::AuditStore;
use pipeline::{EventBus, Executor, ExecutorConfig, Handler, HandlerRegistry, SubscriptionId};

use crate::confirmation::ConfirmationListener;
use crate::events::SALE_CREATED;
use crate::gate::ApprovedPaymentGate;
use crate::handlers::{
    AccountingExportHandler, InvoicingPendingHandler, ShippingLabelsHandler,
    ShippingPreorderHandler,
};
use crate::services::{
    FileTransfer, InMemoryFileTransfer, InMemoryMailer, InMemorySaleRepository,
    InMemoryShippingCarrier, Mailer, SaleRepository, ShippingCarrier,
};

/// The collaborators shared by every handler.
#[derive(Clone)]
pub struct FulfillmentServices {
    pub sales: Arc<dyn SaleRepository>,
    pub carrier: Arc<dyn ShippingCarrier>,
    pub files: Arc<dyn FileTransfer>,
    pub mailer: Arc<dyn Mailer>,
}

/// In-memory collaborators, kept concrete so callers can inspect them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServices {
    pub sales: InMemorySaleRepository,
    pub carrier: InMemoryShippingCarrier,
    pub files: InMemoryFileTransfer,
    pub mailer: InMemoryMailer,
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> FulfillmentServices {
        FulfillmentServices {
            sales: Arc::new(self.sales.clone()),
            carrier: Arc::new(self.carrier.clone()),
            files: Arc::new(self.files.clone()),
            mailer: Arc::new(self.mailer.clone()),
        }
    }
}

/// Handler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentSettings {
    /// Remote path of the accounting export.
    pub accounting_export_path: String,
    /// Remote directory receiving shipping labels.
    pub labels_dir: String,
    /// Handler names registered but switched off.
    pub disabled_handlers: BTreeSet<String>,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            accounting_export_path: "exports/sales.csv".to_string(),
            labels_dir: "labels".to_string(),
            disabled_handlers: BTreeSet::new(),
        }
    }
}

impl FulfillmentSettings {
    pub fn is_enabled(&self, handler: &str) -> bool {
        !self.disabled_handlers.contains(handler)
    }
}

/// Registers the four `sale.created` handlers.
pub fn build_registry(
    services: &FulfillmentServices,
    settings: &FulfillmentSettings,
) -> pipeline::Result<HandlerRegistry> {
    let preorder = ShippingPreorderHandler::new(
        Arc::clone(&services.sales),
        Arc::clone(&services.carrier),
    );
    let export = AccountingExportHandler::new(
        Arc::clone(&services.sales),
        Arc::clone(&services.files),
        settings.accounting_export_path.clone(),
    );
    let invoicing = InvoicingPendingHandler::new(Arc::clone(&services.sales));
    let labels = ShippingLabelsHandler::new(
        Arc::clone(&services.sales),
        Arc::clone(&services.carrier),
        Arc::clone(&services.files),
        settings.labels_dir.clone(),
    );

    let handlers: Vec<Arc<dyn Handler>> = vec![
        Arc::new(preorder.with_enabled(settings.is_enabled(crate::handlers::SHIPPING_PREORDER))),
        Arc::new(export.with_enabled(settings.is_enabled(crate::handlers::ACCOUNTING_EXPORT))),
        Arc::new(invoicing.with_enabled(settings.is_enabled(crate::handlers::INVOICING_PENDING))),
        Arc::new(labels.with_enabled(settings.is_enabled(crate::handlers::SHIPPING_LABELS))),
    ];

    Ok(HandlerRegistry::builder().register_all(handlers)?.build())
}

/// Builds the executor with the approved-payment gate on `sale.created`.
///
/// `sale.created` is always sync-only: it must be driven through
/// `run_handlers_and_emit` so the confirmation email sees the final state.
pub fn build_executor<S: AuditStore + 'static>(
    registry: Arc<HandlerRegistry>,
    store: S,
    bus: EventBus,
    config: ExecutorConfig,
) -> Executor<S> {
    Executor::builder(registry, store, bus)
        .gate(SALE_CREATED, ApprovedPaymentGate)
        .config(config.sync_only(SALE_CREATED))
        .build()
}

/// Subscribes the customer confirmation email to `sale.created`.
pub fn subscribe_confirmation(bus: &EventBus, services: &FulfillmentServices) -> SubscriptionId {
    bus.subscribe(
        SALE_CREATED,
        Arc::new(ConfirmationListener::new(
            Arc::clone(&services.sales),
            Arc::clone(&services.mailer),
        )),
    )
}
