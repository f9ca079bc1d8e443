//! The denormalized sale the fulfillment handlers work on.

use chrono::{DateTime, Utc};
use common::{CustomerId, SaleId};
use serde::{Deserialize, Serialize};

/// Invoicing progress of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoicingStatus {
    /// Nothing has been requested yet.
    #[default]
    NotRequested,

    /// Waiting for the invoicing team.
    Pending,

    /// Invoice issued (terminal state).
    Invoiced,
}

impl InvoicingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoicingStatus::NotRequested => "not_requested",
            InvoicingStatus::Pending => "pending",
            InvoicingStatus::Invoiced => "invoiced",
        }
    }
}

impl std::fmt::Display for InvoicingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

/// A line item on a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl SaleItem {
    pub fn new(
        sku: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price_cents: i64,
    ) -> Self {
        Self {
            sku: sku.into(),
            description: description.into(),
            quantity,
            unit_price_cents,
        }
    }

    /// Returns quantity × unit price, or `None` on overflow.
    pub fn line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// A sale with everything the fulfillment handlers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer: Customer,
    pub shipping_address: ShippingAddress,
    pub items: Vec<SaleItem>,
    pub created_at: DateTime<Utc>,

    /// Set once the carrier pre-shipment exists.
    #[serde(default)]
    pub tracking_number: Option<String>,

    #[serde(default)]
    pub invoicing_status: InvoicingStatus,
}

impl Sale {
    /// Creates a new sale with no items.
    pub fn new(customer: Customer, shipping_address: ShippingAddress) -> Self {
        Self {
            id: SaleId::new(),
            customer,
            shipping_address,
            items: Vec::new(),
            created_at: Utc::now(),
            tracking_number: None,
            invoicing_status: InvoicingStatus::default(),
        }
    }

    /// Adds an item, builder style.
    pub fn with_item(mut self, item: SaleItem) -> Self {
        self.items.push(item);
        self
    }

    /// Sum of line totals, or `None` if any step overflows.
    pub fn total_cents(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0i64, |total, item| total.checked_add(item.line_total_cents()?))
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// Formats cents as a decimal amount with two places, e.g. `-12.50`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}
