//! The `sale.created` event and its payload.

use chrono::{DateTime, Utc};
use common::SaleId;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sale::Sale;

/// Emitted when a sale is recorded, whatever its payment state.
pub const SALE_CREATED: &str = "sale.created";

/// Payment state of a sale whose payment went through.
pub const PAYMENT_APPROVED: &str = "aprobado";

/// Payload of [`SALE_CREATED`].
///
/// `sale` carries the full sale when the emitter has it at hand; handlers
/// fall back to the sale repository otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCreated {
    pub sale_id: SaleId,
    pub payment_state: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale: Option<Sale>,
}

impl SaleCreated {
    /// Builds the payload for `sale`, embedding it.
    pub fn new(sale: &Sale, payment_state: impl Into<String>) -> Self {
        Self {
            sale_id: sale.id,
            payment_state: payment_state.into(),
            timestamp: Utc::now(),
            sale: Some(sale.clone()),
        }
    }

    /// Builds a payload that only references the sale by id.
    pub fn reference(sale_id: SaleId, payment_state: impl Into<String>) -> Self {
        Self {
            sale_id,
            payment_state: payment_state.into(),
            timestamp: Utc::now(),
            sale: None,
        }
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        Ok(Self::deserialize(payload)?)
    }

    pub fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_approved(&self) -> bool {
        self.payment_state == PAYMENT_APPROVED
    }
}
