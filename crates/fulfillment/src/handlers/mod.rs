//! The `sale.created` handlers, in execution order.

mod accounting_export;
mod invoicing_pending;
mod shipping_labels;
mod shipping_preorder;

pub use accounting_export::{AccountingExportHandler, AccountingExportOutput};
pub use invoicing_pending::{InvoicingPendingHandler, InvoicingPendingOutput};
pub use shipping_labels::{ShippingLabelsHandler, ShippingLabelsOutput};
pub use shipping_preorder::{ShippingPreorderHandler, ShippingPreorderOutput};

use crate::error::{FulfillmentError, Result};
use crate::events::SaleCreated;
use crate::sale::Sale;
use crate::services::SaleRepository;

pub const SHIPPING_PREORDER: &str = "shipping_preorder";
pub const ACCOUNTING_EXPORT: &str = "accounting_export";
pub const INVOICING_PENDING: &str = "invoicing_pending";
pub const SHIPPING_LABELS: &str = "shipping_labels";

/// Parses the payload and loads the current sale.
///
/// The repository copy wins because earlier handlers may have updated it;
/// the sale embedded in the payload is used when the repository has none.
pub(crate) async fn resolve_sale(
    payload: &serde_json::Value,
    sales: &dyn SaleRepository,
) -> Result<(SaleCreated, Sale)> {
    let event = SaleCreated::from_payload(payload)?;
    let sale = match sales.get(event.sale_id).await? {
        Some(sale) => sale,
        None => event
            .sale
            .clone()
            .ok_or(FulfillmentError::SaleNotFound(event.sale_id))?,
    };
    Ok((event, sale))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use pipeline::{Handler, PipelineContext, RunMetadata};

    use crate::events::{PAYMENT_APPROVED, SALE_CREATED, SaleCreated};
    use crate::sale::Sale;

    pub(crate) fn context() -> PipelineContext {
        PipelineContext::new(RunMetadata::new(SALE_CREATED, "test", "test"))
    }

    pub(crate) fn approved_payload(sale: &Sale) -> serde_json::Value {
        SaleCreated::new(sale, PAYMENT_APPROVED).to_payload().unwrap()
    }

    /// Runs one handler the way the executor does.
    pub(crate) async fn run(
        handler: &Arc<dyn Handler>,
        payload: &serde_json::Value,
        ctx: &mut PipelineContext,
    ) -> pipeline::HandlerResult {
        ctx.enter(handler.name());
        let result = handler.execute(payload, ctx).await;
        ctx.exit();
        result
    }
}
