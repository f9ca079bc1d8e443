//! Run gate for `sale.created`.

use pipeline::{GateDecision, RunGate};

use crate::events::PAYMENT_APPROVED;

/// Lets the pipeline run only for sales whose payment is approved.
///
/// Reads `payment_state` straight from the payload so a malformed payload is
/// skipped rather than fed to every handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovedPaymentGate;

impl RunGate for ApprovedPaymentGate {
    fn evaluate(&self, payload: &serde_json::Value) -> GateDecision {
        match payload.get("payment_state").and_then(|v| v.as_str()) {
            Some(PAYMENT_APPROVED) => GateDecision::Proceed,
            Some(state) => GateDecision::skip(format!("payment state is '{state}', not approved")),
            None => GateDecision::skip("payload has no payment_state"),
        }
    }
}
