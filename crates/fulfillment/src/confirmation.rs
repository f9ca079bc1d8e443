//! Customer confirmation email, sent once the pipeline has settled.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{BusEvent, Listener};

use crate::error::{FulfillmentError, Result};
use crate::events::SaleCreated;
use crate::sale::{Sale, format_cents};
use crate::services::{Email, Mailer, SaleRepository};

/// Independent `sale.created` listener that emails the customer.
///
/// Reads the sale from the repository so the tracking number stored by the
/// pipeline is included. Only approved sales get an email.
pub struct ConfirmationListener {
    sales: Arc<dyn SaleRepository>,
    mailer: Arc<dyn Mailer>,
}

impl ConfirmationListener {
    pub fn new(sales: Arc<dyn SaleRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self { sales, mailer }
    }

    async fn confirm(&self, event: &BusEvent) -> Result<()> {
        let sale_created = SaleCreated::from_payload(&event.payload)?;
        if !sale_created.is_approved() {
            tracing::debug!(
                sale_id = %sale_created.sale_id,
                payment_state = %sale_created.payment_state,
                "payment not approved, no confirmation"
            );
            return Ok(());
        }

        let sale = match self.sales.get(sale_created.sale_id).await? {
            Some(sale) => sale,
            None => sale_created
                .sale
                .ok_or(FulfillmentError::SaleNotFound(sale_created.sale_id))?,
        };

        self.mailer.send(confirmation_email(&sale)?).await?;
        metrics::counter!("fulfillment_confirmations_sent_total").increment(1);
        tracing::info!(sale_id = %sale.id, to = %sale.customer.email, "confirmation sent");
        Ok(())
    }
}

#[async_trait]
impl Listener for ConfirmationListener {
    fn name(&self) -> &str {
        "sale_confirmation"
    }

    async fn on_event(&self, event: &BusEvent) {
        if let Err(e) = self.confirm(event).await {
            metrics::counter!("fulfillment_confirmation_failures_total").increment(1);
            tracing::error!(error = %e, "failed to send sale confirmation");
        }
    }
}

fn confirmation_email(sale: &Sale) -> Result<Email> {
    let total = sale
        .total_cents()
        .ok_or(FulfillmentError::AmountOverflow(sale.id))?;
    let mut body = format!(
        "Hi {},\n\nWe received your order {} ({} items, total {}).\n",
        sale.customer.name,
        sale.id,
        sale.item_count(),
        format_cents(total),
    );
    match &sale.tracking_number {
        Some(tracking) => body.push_str(&format!("Tracking number: {tracking}\n")),
        None => body.push_str("We will send your tracking number as soon as it is available.\n"),
    }

    Ok(Email {
        to: sale.customer.email.clone(),
        subject: format!("Order {} confirmed", sale.id),
        body,
    })
}
