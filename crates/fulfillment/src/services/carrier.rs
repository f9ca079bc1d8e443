//! Shipping carrier trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::SaleId;

use crate::error::{FulfillmentError, Result};
use crate::sale::Sale;

/// A pre-shipment registered with the carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preshipment {
    pub preshipment_id: String,
    pub tracking_number: String,
}

/// Trait for carrier operations.
#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    /// Registers a pre-shipment for the sale's parcel.
    async fn create_preshipment(&self, sale: &Sale) -> Result<Preshipment>;

    /// Downloads the printable label for a tracking number.
    async fn fetch_label(&self, tracking_number: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    // tracking number -> sale
    preshipments: HashMap<String, SaleId>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_label: bool,
}

/// In-memory carrier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingCarrier {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl InMemoryShippingCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the carrier to reject pre-shipment creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    /// Configures the carrier to fail label downloads.
    pub fn set_fail_on_label(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_label = fail;
    }

    pub fn preshipment_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .preshipments
            .len()
    }
}

#[async_trait]
impl ShippingCarrier for InMemoryShippingCarrier {
    async fn create_preshipment(&self, sale: &Sale) -> Result<Preshipment> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(FulfillmentError::Carrier(
                "Carrier unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let preshipment = Preshipment {
            preshipment_id: format!("PRE-{:04}", state.next_id),
            tracking_number: format!("TRACK-{:04}", state.next_id),
        };
        state
            .preshipments
            .insert(preshipment.tracking_number.clone(), sale.id);

        Ok(preshipment)
    }

    async fn fetch_label(&self, tracking_number: &str) -> Result<Vec<u8>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_label {
            return Err(FulfillmentError::Carrier(
                "Label service unavailable".to_string(),
            ));
        }

        let sale_id = state.preshipments.get(tracking_number).ok_or_else(|| {
            FulfillmentError::Carrier(format!("Unknown tracking number {tracking_number}"))
        })?;

        Ok(format!("%PDF-1.4 label {tracking_number} sale {sale_id}\n").into_bytes())
    }
}
