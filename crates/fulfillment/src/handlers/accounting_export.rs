use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Handler, HandlerOutput, HandlerResult, PipelineContext};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ACCOUNTING_EXPORT, ShippingPreorderOutput, resolve_sale};
use crate::error::{FulfillmentError, Result};
use crate::events::SALE_CREATED;
use crate::sale::{Sale, format_cents};
use crate::services::{FileTransfer, SaleRepository};

const HEADER: &str =
    "date;sale_id;customer;email;sku;description;quantity;unit_price;line_total;tracking_number";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingExportOutput {
    pub path: String,
    pub rows_written: usize,
    /// True when the export file did not exist before this run.
    pub created_file: bool,
}

impl HandlerOutput for AccountingExportOutput {
    const SOURCE: &'static str = ACCOUNTING_EXPORT;
}

/// Appends one row per sale item to the shared accounting export.
///
/// The file is downloaded, extended and uploaded whole; a missing file
/// starts a fresh export with a header row. Existing content is kept byte
/// for byte, whatever its encoding.
///
/// Concurrent runs hold `export_lock` from download to upload, otherwise the
/// later upload would drop the earlier run's rows.
pub struct AccountingExportHandler {
    sales: Arc<dyn SaleRepository>,
    files: Arc<dyn FileTransfer>,
    path: String,
    enabled: bool,
    export_lock: Mutex<()>,
}

impl AccountingExportHandler {
    pub fn new(
        sales: Arc<dyn SaleRepository>,
        files: Arc<dyn FileTransfer>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            sales,
            files,
            path: path.into(),
            enabled: true,
            export_lock: Mutex::new(()),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl Handler for AccountingExportHandler {
    fn name(&self) -> &'static str {
        ACCOUNTING_EXPORT
    }

    fn event_type(&self) -> &'static str {
        SALE_CREATED
    }

    fn description(&self) -> &'static str {
        "Appends the sale to the accounting export file"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn execute(&self, payload: &serde_json::Value, ctx: &mut PipelineContext) -> HandlerResult {
        let (_, sale) = resolve_sale(payload, self.sales.as_ref()).await?;

        let tracking_number = ctx
            .read::<ShippingPreorderOutput>()?
            .map(|p| p.tracking_number)
            .or_else(|| sale.tracking_number.clone());

        let rows = export_rows(&sale, tracking_number.as_deref())?;

        let _guard = self.export_lock.lock().await;

        let existing = self.files.download(&self.path).await?;
        let created_file = existing.is_none();
        let mut contents = existing.unwrap_or_else(|| format!("{HEADER}\n").into_bytes());
        if !contents.is_empty() && !contents.ends_with(b"\n") {
            contents.push(b'\n');
        }
        for row in &rows {
            contents.extend_from_slice(row.as_bytes());
            contents.push(b'\n');
        }

        self.files.upload(&self.path, contents).await?;
        tracing::info!(sale_id = %sale.id, path = %self.path, rows = rows.len(), "accounting export updated");

        ctx.publish(&AccountingExportOutput {
            path: self.path.clone(),
            rows_written: rows.len(),
            created_file,
        })?;
        Ok(())
    }
}

fn export_rows(sale: &Sale, tracking_number: Option<&str>) -> Result<Vec<String>> {
    let date = sale.created_at.format("%Y-%m-%d").to_string();
    sale.items
        .iter()
        .map(|item| {
            let line_total = item
                .line_total_cents()
                .ok_or(FulfillmentError::AmountOverflow(sale.id))?;
            Ok([
                date.clone(),
                sale.id.to_string(),
                cell(&sale.customer.name),
                cell(&sale.customer.email),
                cell(&item.sku),
                cell(&item.description),
                item.quantity.to_string(),
                format_cents(item.unit_price_cents),
                format_cents(line_total),
                tracking_number.map(cell).unwrap_or_default(),
            ]
            .join(";"))
        })
        .collect()
}

// Separators and line breaks would corrupt the row.
fn cell(text: &str) -> String {
    text.replace([';', '\n', '\r'], " ")
}
