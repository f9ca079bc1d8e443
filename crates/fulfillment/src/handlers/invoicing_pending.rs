use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Handler, HandlerOutput, HandlerResult, PipelineContext};
use serde::{Deserialize, Serialize};

use super::{INVOICING_PENDING, resolve_sale};
use crate::events::SALE_CREATED;
use crate::sale::InvoicingStatus;
use crate::services::SaleRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicingPendingOutput {
    pub previous: InvoicingStatus,
    pub status: InvoicingStatus,
}

impl HandlerOutput for InvoicingPendingOutput {
    const SOURCE: &'static str = INVOICING_PENDING;
}

/// Flags the sale for the invoicing team. An already invoiced sale is left
/// alone.
pub struct InvoicingPendingHandler {
    sales: Arc<dyn SaleRepository>,
    enabled: bool,
}

impl InvoicingPendingHandler {
    pub fn new(sales: Arc<dyn SaleRepository>) -> Self {
        Self {
            sales,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Handler for InvoicingPendingHandler {
    fn name(&self) -> &'static str {
        INVOICING_PENDING
    }

    fn event_type(&self) -> &'static str {
        SALE_CREATED
    }

    fn description(&self) -> &'static str {
        "Marks the sale as pending invoicing"
    }

    fn priority(&self) -> u32 {
        30
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, payload: &serde_json::Value, ctx: &mut PipelineContext) -> HandlerResult {
        let (_, sale) = resolve_sale(payload, self.sales.as_ref()).await?;
        let previous = sale.invoicing_status;

        let status = if previous == InvoicingStatus::Invoiced {
            tracing::debug!(sale_id = %sale.id, "sale already invoiced");
            previous
        } else {
            self.sales
                .set_invoicing_status(sale.id, InvoicingStatus::Pending)
                .await?;
            InvoicingStatus::Pending
        };

        ctx.publish(&InvoicingPendingOutput { previous, status })?;
        Ok(())
    }
}
