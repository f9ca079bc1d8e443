use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Handler, HandlerOutput, HandlerResult, PipelineContext};
use serde::{Deserialize, Serialize};

use super::{SHIPPING_PREORDER, resolve_sale};
use crate::events::SALE_CREATED;
use crate::services::{SaleRepository, ShippingCarrier};

/// What `shipping_preorder` publishes for later handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPreorderOutput {
    pub preshipment_id: String,
    pub tracking_number: String,
}

impl HandlerOutput for ShippingPreorderOutput {
    const SOURCE: &'static str = SHIPPING_PREORDER;
}

/// Registers the parcel with the carrier and stores the tracking number on
/// the sale.
pub struct ShippingPreorderHandler {
    sales: Arc<dyn SaleRepository>,
    carrier: Arc<dyn ShippingCarrier>,
    enabled: bool,
}

impl ShippingPreorderHandler {
    pub fn new(sales: Arc<dyn SaleRepository>, carrier: Arc<dyn ShippingCarrier>) -> Self {
        Self {
            sales,
            carrier,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Handler for ShippingPreorderHandler {
    fn name(&self) -> &'static str {
        SHIPPING_PREORDER
    }

    fn event_type(&self) -> &'static str {
        SALE_CREATED
    }

    fn description(&self) -> &'static str {
        "Creates the carrier pre-shipment and records the tracking number"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, payload: &serde_json::Value, ctx: &mut PipelineContext) -> HandlerResult {
        let (_, sale) = resolve_sale(payload, self.sales.as_ref()).await?;

        let preshipment = self.carrier.create_preshipment(&sale).await?;
        tracing::info!(
            sale_id = %sale.id,
            tracking_number = %preshipment.tracking_number,
            "pre-shipment created"
        );

        // Published before persisting so the labels handler can still use it
        // if the sale update fails.
        ctx.publish(&ShippingPreorderOutput {
            preshipment_id: preshipment.preshipment_id,
            tracking_number: preshipment.tracking_number.clone(),
        })?;

        self.sales
            .set_tracking_number(sale.id, &preshipment.tracking_number)
            .await?;
        Ok(())
    }
}
