use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Handler, HandlerOutput, HandlerResult, PipelineContext};
use serde::{Deserialize, Serialize};

use super::{SHIPPING_LABELS, ShippingPreorderOutput, resolve_sale};
use crate::error::FulfillmentError;
use crate::events::SALE_CREATED;
use crate::services::{FileTransfer, SaleRepository, ShippingCarrier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLabelsOutput {
    pub tracking_number: String,
    pub label_path: String,
    pub size_bytes: usize,
}

impl HandlerOutput for ShippingLabelsOutput {
    const SOURCE: &'static str = SHIPPING_LABELS;
}

/// Downloads the carrier label and stores it under the labels directory.
///
/// Uses the tracking number published by `shipping_preorder` in this run,
/// falling back to the one already on the sale.
pub struct ShippingLabelsHandler {
    sales: Arc<dyn SaleRepository>,
    carrier: Arc<dyn ShippingCarrier>,
    files: Arc<dyn FileTransfer>,
    labels_dir: String,
    enabled: bool,
}

impl ShippingLabelsHandler {
    pub fn new(
        sales: Arc<dyn SaleRepository>,
        carrier: Arc<dyn ShippingCarrier>,
        files: Arc<dyn FileTransfer>,
        labels_dir: impl Into<String>,
    ) -> Self {
        Self {
            sales,
            carrier,
            files,
            labels_dir: labels_dir.into(),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Handler for ShippingLabelsHandler {
    fn name(&self) -> &'static str {
        SHIPPING_LABELS
    }

    fn event_type(&self) -> &'static str {
        SALE_CREATED
    }

    fn description(&self) -> &'static str {
        "Fetches the shipping label and uploads it"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, payload: &serde_json::Value, ctx: &mut PipelineContext) -> HandlerResult {
        let (_, sale) = resolve_sale(payload, self.sales.as_ref()).await?;

        let tracking_number = ctx
            .read::<ShippingPreorderOutput>()?
            .map(|p| p.tracking_number)
            .or_else(|| sale.tracking_number.clone())
            .ok_or(FulfillmentError::MissingPreshipment(sale.id))?;

        let label = self.carrier.fetch_label(&tracking_number).await?;
        let size_bytes = label.len();
        let label_path = format!("{}/{}.pdf", self.labels_dir.trim_end_matches('/'), sale.id);

        self.files.upload(&label_path, label).await?;
        tracing::info!(sale_id = %sale.id, %label_path, size_bytes, "shipping label stored");

        ctx.publish(&ShippingLabelsOutput {
            tracking_number,
            label_path,
            size_bytes,
        })?;
        Ok(())
    }
}
