//! Conditions deciding whether a run proceeds at all.

/// The verdict of a [`RunGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run the pipeline.
    Proceed,
    /// Skip the whole run. Not an error; the reason is only logged.
    Skip(String),
}

impl GateDecision {
    pub fn skip(reason: impl Into<String>) -> Self {
        GateDecision::Skip(reason.into())
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed)
    }
}

/// A per-event-type precondition evaluated against the payload before any
/// handler runs.
pub trait RunGate: Send + Sync {
    fn evaluate(&self, payload: &serde_json::Value) -> GateDecision;
}

impl<F> RunGate for F
where
    F: Fn(&serde_json::Value) -> GateDecision + Send + Sync,
{
    fn evaluate(&self, payload: &serde_json::Value) -> GateDecision {
        self(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_act_as_gates() {
        let gate = |payload: &serde_json::Value| {
            if payload["go"] == serde_json::json!(true) {
                GateDecision::Proceed
            } else {
                GateDecision::skip("not yet")
            }
        };

        assert!(gate.evaluate(&serde_json::json!({"go": true})).is_proceed());
        assert_eq!(
            gate.evaluate(&serde_json::json!({})),
            GateDecision::Skip("not yet".to_string())
        );
    }
}
