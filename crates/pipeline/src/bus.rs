//! Asynchronous "listen and react" event channel.
//!
//! Emitting never waits for listeners: each listener runs on its own tokio
//! task. Emitting therefore requires a running tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// An event occurrence as seen by listeners.
#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

/// Something that reacts to events on the bus.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Returns the listener's name, used in logs.
    fn name(&self) -> &str;

    /// Reacts to one event. Failures are the listener's own business.
    async fn on_event(&self, event: &BusEvent);
}

/// Identifies one subscription on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    listener: Arc<dyn Listener>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
}

/// In-process event bus. Clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `event_type`.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        listener: Arc<dyn Listener>,
    ) -> SubscriptionId {
        let event_type = event_type.into();
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(%event_type, listener = listener.name(), "listener subscribed");

        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type)
            .or_default()
            .push(Subscription { id, listener });
        id
    }

    /// Returns the number of listeners subscribed to `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Notifies every listener of `event_type` without waiting for them.
    pub fn emit(&self, event_type: impl Into<String>, payload: serde_json::Value) -> Delivery {
        self.emit_excluding(event_type, payload, &[])
    }

    /// Like [`emit`](Self::emit), skipping the given subscriptions.
    pub fn emit_excluding(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        excluded: &[SubscriptionId],
    ) -> Delivery {
        let event = Arc::new(BusEvent {
            event_type: event_type.into(),
            payload,
            emitted_at: Utc::now(),
        });

        let listeners: Vec<Arc<dyn Listener>> = self
            .inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.event_type)
            .map(|subs| {
                subs.iter()
                    .filter(|s| !excluded.contains(&s.id))
                    .map(|s| Arc::clone(&s.listener))
                    .collect()
            })
            .unwrap_or_default();

        metrics::counter!("bus_events_emitted_total", "event_type" => event.event_type.clone())
            .increment(1);
        tracing::debug!(
            event_type = %event.event_type,
            listeners = listeners.len(),
            "event emitted"
        );

        let handles = listeners
            .into_iter()
            .map(|listener| {
                let name = listener.name().to_string();
                let event = Arc::clone(&event);
                let span = tracing::info_span!(
                    "bus_listener",
                    listener = %name,
                    event_type = %event.event_type
                );
                let handle = tokio::spawn(
                    async move { listener.on_event(&event).await }.instrument(span),
                );
                (name, handle)
            })
            .collect();

        Delivery { handles }
    }
}

/// Handle on the listener tasks started by one emit.
///
/// Dropping it detaches the tasks; they keep running.
pub struct Delivery {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Delivery {
    /// Returns how many listeners were notified.
    pub fn listener_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every notified listener to finish.
    ///
    /// A panicking listener is logged; it does not affect the others.
    pub async fn settled(self) {
        let (names, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                tracing::error!(listener = %name, error = %e, "listener task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct Recording {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Listener for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_event(&self, event: &BusEvent) {
            self.seen
                .lock()
                .await
                .push(format!("{}:{}", self.name, event.event_type));
        }
    }

    struct Panicking;

    #[async_trait]
    impl Listener for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn on_event(&self, _event: &BusEvent) {
            panic!("listener blew up");
        }
    }

    #[tokio::test]
    async fn emit_reaches_only_matching_listeners() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            "sale.created",
            Arc::new(Recording {
                name: "a",
                seen: Arc::clone(&seen),
            }),
        );
        bus.subscribe(
            "sale.cancelled",
            Arc::new(Recording {
                name: "b",
                seen: Arc::clone(&seen),
            }),
        );

        let delivery = bus.emit("sale.created", serde_json::json!({}));
        assert_eq!(delivery.listener_count(), 1);
        delivery.settled().await;

        assert_eq!(*seen.lock().await, vec!["a:sale.created".to_string()]);
    }

    #[tokio::test]
    async fn emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        let delivery = bus.emit("nobody.listens", serde_json::json!({}));
        assert_eq!(delivery.listener_count(), 0);
        delivery.settled().await;
    }

    #[tokio::test]
    async fn emit_excluding_skips_subscription() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let skipped = bus.subscribe(
            "sale.created",
            Arc::new(Recording {
                name: "skipped",
                seen: Arc::clone(&seen),
            }),
        );
        bus.subscribe(
            "sale.created",
            Arc::new(Recording {
                name: "kept",
                seen: Arc::clone(&seen),
            }),
        );

        bus.emit_excluding("sale.created", serde_json::json!({}), &[skipped])
            .settled()
            .await;

        assert_eq!(*seen.lock().await, vec!["kept:sale.created".to_string()]);
        assert_eq!(bus.listener_count("sale.created"), 2);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_affect_others() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe("sale.created", Arc::new(Panicking));
        bus.subscribe(
            "sale.created",
            Arc::new(Recording {
                name: "survivor",
                seen: Arc::clone(&seen),
            }),
        );

        bus.emit("sale.created", serde_json::json!({})).settled().await;

        assert_eq!(*seen.lock().await, vec!["survivor:sale.created".to_string()]);
    }

    #[tokio::test]
    async fn clones_share_subscriptions() {
        let bus = EventBus::new();
        let clone = bus.clone();
        clone.subscribe("sale.created", Arc::new(Panicking));
        assert_eq!(bus.listener_count("sale.created"), 1);
    }
}
