//! Turns one event occurrence into a completed, audited pipeline run.

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use audit_store::{AuditId, AuditRecord, AuditStore, ExecutionStats, HandlerExecutionResult};
use futures_util::FutureExt;
use serde::Serialize;

use crate::bus::{BusEvent, Delivery, EventBus, Listener, SubscriptionId};
use crate::context::{PipelineContext, RunMetadata};
use crate::gate::{GateDecision, RunGate};
use crate::handler::Handler;
use crate::registry::HandlerRegistry;

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Event types driven only through
    /// [`run_handlers_and_emit`](Executor::run_handlers_and_emit); the
    /// executor never subscribes to them on the bus.
    pub sync_only_event_types: BTreeSet<String>,

    /// Upper bound on a single handler invocation. `None` waits indefinitely.
    pub handler_timeout: Option<Duration>,

    /// Source tag recorded in each run's metadata.
    pub source: String,

    /// Trigger tag recorded in each run's metadata.
    pub triggered_by: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            sync_only_event_types: BTreeSet::new(),
            handler_timeout: None,
            source: "event-bus".to_string(),
            triggered_by: "system".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an event type as driven only through the synchronous entry point.
    pub fn sync_only(mut self, event_type: impl Into<String>) -> Self {
        self.sync_only_event_types.insert(event_type.into());
        self
    }

    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }
}

/// Why a run did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The event type's gate rejected the payload.
    Gate(String),
    /// No enabled handler is registered for the event type.
    NoHandlers,
}

/// Result of [`Executor::execute_handlers`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every enabled handler ran; one audit record was attempted.
    Completed { run_id: AuditId, stats: ExecutionStats },
    /// Nothing ran and nothing was recorded.
    Skipped { reason: SkipReason },
}

impl RunOutcome {
    pub fn stats(&self) -> Option<&ExecutionStats> {
        match self {
            RunOutcome::Completed { stats, .. } => Some(stats),
            RunOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped { .. })
    }
}

/// The part of the executor a bus listener needs. Holds no reference to the
/// bus itself.
struct PipelineRunner<S: AuditStore> {
    registry: Arc<HandlerRegistry>,
    store: S,
    gates: HashMap<String, Arc<dyn RunGate>>,
    config: ExecutorConfig,
}

impl<S: AuditStore> PipelineRunner<S> {
    #[tracing::instrument(skip(self, payload))]
    async fn run(&self, event_type: &str, payload: &serde_json::Value) -> RunOutcome {
        if let Some(gate) = self.gates.get(event_type)
            && let GateDecision::Skip(reason) = gate.evaluate(payload)
        {
            tracing::info!(%reason, "run skipped by gate");
            metrics::counter!(
                "pipeline_runs_skipped_total",
                "event_type" => event_type.to_string(),
                "reason" => "gate"
            )
            .increment(1);
            return RunOutcome::Skipped {
                reason: SkipReason::Gate(reason),
            };
        }

        let mut handlers: Vec<&Arc<dyn Handler>> = self
            .registry
            .handlers_for(event_type)
            .iter()
            .filter(|h| h.enabled())
            .collect();

        if handlers.is_empty() {
            tracing::info!("no enabled handlers, run skipped");
            metrics::counter!(
                "pipeline_runs_skipped_total",
                "event_type" => event_type.to_string(),
                "reason" => "no_handlers"
            )
            .increment(1);
            return RunOutcome::Skipped {
                reason: SkipReason::NoHandlers,
            };
        }

        // Stable: equal priorities keep registration order.
        handlers.sort_by_key(|h| h.priority());

        let metadata = RunMetadata::new(event_type, &self.config.source, &self.config.triggered_by);
        let run_id = metadata.run_id();
        let mut ctx = PipelineContext::new(metadata);

        metrics::counter!("pipeline_runs_total", "event_type" => event_type.to_string())
            .increment(1);
        tracing::info!(%run_id, handlers = handlers.len(), "pipeline run started");
        let run_start = Instant::now();

        let mut results = Vec::with_capacity(handlers.len());
        for handler in handlers {
            results.push(self.invoke(handler.as_ref(), payload, &mut ctx).await);
        }

        let elapsed = run_start.elapsed();
        let stats = ExecutionStats::from_results(results, millis(elapsed));

        metrics::histogram!("pipeline_run_duration_seconds", "event_type" => event_type.to_string())
            .record(elapsed.as_secs_f64());
        tracing::info!(
            %run_id,
            executed = stats.executed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = stats.total_duration_ms,
            "pipeline run finished"
        );

        self.persist(event_type, payload, &stats, ctx).await;

        RunOutcome::Completed { run_id, stats }
    }

    /// Runs one handler, converting every kind of failure into a result entry.
    async fn invoke(
        &self,
        handler: &dyn Handler,
        payload: &serde_json::Value,
        ctx: &mut PipelineContext,
    ) -> HandlerExecutionResult {
        let name = handler.name();
        let before = ctx.handler_data().clone();

        ctx.enter(name);
        let start = Instant::now();
        let outcome = self.guarded(handler, payload, ctx).await;
        let duration_ms = millis(start.elapsed());
        ctx.exit();

        match outcome {
            Ok(()) => {
                let diff = ctx.handler_data().diff(&before);
                tracing::debug!(handler = name, duration_ms, "handler succeeded");
                HandlerExecutionResult::succeeded(name, duration_ms, diff.to_value())
            }
            Err(message) => {
                tracing::warn!(handler = name, duration_ms, error = %message, "handler failed");
                metrics::counter!("pipeline_handler_failures_total", "handler" => name)
                    .increment(1);
                HandlerExecutionResult::failed(name, duration_ms, message)
            }
        }
    }

    async fn guarded(
        &self,
        handler: &dyn Handler,
        payload: &serde_json::Value,
        ctx: &mut PipelineContext,
    ) -> Result<(), String> {
        let call = AssertUnwindSafe(handler.execute(payload, ctx)).catch_unwind();

        let settled = match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(settled) => settled,
                Err(_) => return Err(format!("timed out after {}ms", limit.as_millis())),
            },
            None => call.await,
        };

        match settled {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("handler panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    async fn persist(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
        stats: &ExecutionStats,
        ctx: PipelineContext,
    ) {
        let metadata = ctx.metadata().clone();
        let Some(record) = AuditRecord::builder()
            .id(metadata.run_id())
            .event_type(event_type)
            .payload(payload.clone())
            .stats(stats.clone())
            .handler_data(ctx.into_handler_data().to_value())
            .source(metadata.source())
            .triggered_by(metadata.triggered_by())
            .try_build()
        else {
            return;
        };

        if let Err(e) = self.store.append(record).await {
            metrics::counter!("audit_append_failures_total").increment(1);
            tracing::error!(run_id = %metadata.run_id(), error = %e, "failed to persist audit record");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Bus listener that drives the pipeline for asynchronously emitted events.
struct PipelineListener<S: AuditStore> {
    runner: Arc<PipelineRunner<S>>,
}

#[async_trait]
impl<S: AuditStore + 'static> Listener for PipelineListener<S> {
    fn name(&self) -> &str {
        "pipeline"
    }

    async fn on_event(&self, event: &BusEvent) {
        self.runner.run(&event.event_type, &event.payload).await;
    }
}

/// Runs the registered handlers for an event type in priority order.
///
/// Handlers run strictly one after another: handler N+1 starts only after
/// handler N has settled. A failing, panicking or timed-out handler is
/// recorded and the run continues. After the last handler, one
/// [`AuditRecord`] is appended; a failure to append is logged only.
///
/// Concurrent runs share nothing but the read-only registry.
pub struct Executor<S: AuditStore> {
    runner: Arc<PipelineRunner<S>>,
    bus: EventBus,
    // None until initialize() runs.
    subscriptions: Mutex<Option<HashMap<String, SubscriptionId>>>,
}

impl<S: AuditStore + 'static> Executor<S> {
    /// Creates a new executor builder.
    pub fn builder(registry: Arc<HandlerRegistry>, store: S, bus: EventBus) -> ExecutorBuilder<S> {
        ExecutorBuilder {
            registry,
            store,
            bus,
            gates: HashMap::new(),
            config: ExecutorConfig::default(),
        }
    }

    /// Subscribes the pipeline on the bus for every event type that has at
    /// least one enabled handler and is not sync-only.
    ///
    /// Returns the number of subscriptions made. A second call logs a warning
    /// and subscribes nothing.
    pub fn initialize(&self) -> usize {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if subscriptions.is_some() {
            tracing::warn!("executor already initialized, ignoring");
            return 0;
        }

        let registry = &self.runner.registry;
        let mut subscribed = HashMap::new();

        for event_type in registry.event_types() {
            if self.runner.config.sync_only_event_types.contains(event_type) {
                tracing::debug!(event_type, "sync-only event type, not subscribing");
                continue;
            }
            if !registry.handlers_for(event_type).iter().any(|h| h.enabled()) {
                tracing::debug!(event_type, "no enabled handlers, not subscribing");
                continue;
            }

            let listener = Arc::new(PipelineListener {
                runner: Arc::clone(&self.runner),
            });
            subscribed.insert(event_type.to_string(), self.bus.subscribe(event_type, listener));
        }

        let count = subscribed.len();
        tracing::info!(
            subscriptions = count,
            sync_only = ?self.runner.config.sync_only_event_types,
            "executor initialized"
        );
        *subscriptions = Some(subscribed);
        count
    }

    /// Returns true once [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs the pipeline for one event occurrence and waits for it to finish.
    ///
    /// Never fails: handler and audit failures are isolated and recorded.
    pub async fn execute_handlers(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> RunOutcome {
        self.runner.run(event_type, payload).await
    }

    /// Runs the pipeline to completion, then notifies the bus so independent
    /// listeners see the event only after every handler has settled.
    ///
    /// The executor's own subscription for the event type (if any) is
    /// skipped, so the pipeline does not run twice for one occurrence.
    #[tracing::instrument(skip(self, payload))]
    pub async fn run_handlers_and_emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> RunOutcome {
        let outcome = self.execute_handlers(event_type, &payload).await;

        let own: Vec<SubscriptionId> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|subs| subs.get(event_type).copied())
            .into_iter()
            .collect();

        let delivery = self.bus.emit_excluding(event_type, payload, &own);
        tracing::debug!(listeners = delivery.listener_count(), "independent listeners notified");

        outcome
    }

    /// The asynchronous entry point: notifies the bus and returns immediately.
    pub fn emit(&self, event_type: &str, payload: serde_json::Value) -> Delivery {
        self.bus.emit(event_type, payload)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.runner.registry
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.runner.config
    }
}

/// Builder for [`Executor`].
pub struct ExecutorBuilder<S: AuditStore> {
    registry: Arc<HandlerRegistry>,
    store: S,
    bus: EventBus,
    gates: HashMap<String, Arc<dyn RunGate>>,
    config: ExecutorConfig,
}

impl<S: AuditStore + 'static> ExecutorBuilder<S> {
    /// Installs the gate for an event type, replacing any previous one.
    pub fn gate(mut self, event_type: impl Into<String>, gate: impl RunGate + 'static) -> Self {
        self.gates.insert(event_type.into(), Arc::new(gate));
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Executor<S> {
        Executor {
            runner: Arc::new(PipelineRunner {
                registry: self.registry,
                store: self.store,
                gates: self.gates,
                config: self.config,
            }),
            bus: self.bus,
            subscriptions: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerResult;
    use audit_store::InMemoryAuditStore;
    use serde_json::json;
    use tokio::sync::Mutex as AsyncMutex;

    /// Configurable handler that records its invocation order.
    struct Step {
        name: &'static str,
        priority: u32,
        enabled: bool,
        fail: bool,
        trace: Arc<AsyncMutex<Vec<&'static str>>>,
    }

    impl Step {
        fn new(name: &'static str, priority: u32, trace: &Arc<AsyncMutex<Vec<&'static str>>>) -> Self {
            Self {
                name,
                priority,
                enabled: true,
                fail: false,
                trace: Arc::clone(trace),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn disabled(mut self) -> Self {
            self.enabled = false;
            self
        }
    }

    #[async_trait]
    impl Handler for Step {
        fn name(&self) -> &'static str {
            self.name
        }

        fn event_type(&self) -> &'static str {
            "test.event"
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn execute(
            &self,
            _payload: &serde_json::Value,
            ctx: &mut PipelineContext,
        ) -> HandlerResult {
            self.trace.lock().await.push(self.name);
            ctx.set_field("ran", true)?;
            if self.fail {
                return Err(format!("{} failed", self.name).into());
            }
            ctx.set_field("done", true)?;
            Ok(())
        }
    }

    fn executor(handlers: Vec<Step>) -> (Executor<InMemoryAuditStore>, InMemoryAuditStore) {
        let registry = handlers
            .into_iter()
            .try_fold(HandlerRegistry::builder(), |b, h| b.register(Arc::new(h)))
            .unwrap()
            .build();
        let store = InMemoryAuditStore::new();
        let executor =
            Executor::builder(Arc::new(registry), store.clone(), EventBus::new()).build();
        (executor, store)
    }

    #[tokio::test]
    async fn runs_in_priority_order_with_stable_ties() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, _) = executor(vec![
            Step::new("late", 50, &trace),
            Step::new("tie_a", 10, &trace),
            Step::new("default", crate::handler::DEFAULT_PRIORITY, &trace),
            Step::new("tie_b", 10, &trace),
            Step::new("first", 1, &trace),
        ]);

        let outcome = executor.execute_handlers("test.event", &json!({})).await;

        assert_eq!(
            *trace.lock().await,
            vec!["first", "tie_a", "tie_b", "late", "default"]
        );
        assert_eq!(
            outcome.stats().unwrap().execution_order(),
            vec!["first", "tie_a", "tie_b", "late", "default"]
        );
    }

    #[tokio::test]
    async fn failure_is_isolated_and_partial_writes_survive() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, store) = executor(vec![
            Step::new("a", 1, &trace).failing(),
            Step::new("b", 2, &trace),
        ]);

        let outcome = executor.execute_handlers("test.event", &json!({})).await;
        let stats = outcome.stats().unwrap();

        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);

        let a = stats.result_for("a").unwrap();
        assert!(!a.success);
        assert_eq!(a.error.as_deref(), Some("a failed"));

        let b = stats.result_for("b").unwrap();
        assert!(b.success);
        assert_eq!(b.context_diff, json!({"b": {"ran": true, "done": true}}));

        let record = store.all().await.pop().unwrap();
        assert_eq!(record.handler_data["a"], json!({"ran": true}));
        assert_eq!(record.handler_data["b"], json!({"ran": true, "done": true}));
    }

    #[tokio::test]
    async fn disabled_handlers_leave_no_result() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, _) = executor(vec![
            Step::new("on", 1, &trace),
            Step::new("off", 2, &trace).disabled(),
        ]);

        let outcome = executor.execute_handlers("test.event", &json!({})).await;
        let stats = outcome.stats().unwrap();

        assert_eq!(stats.executed, 1);
        assert!(stats.result_for("off").is_none());
        assert_eq!(*trace.lock().await, vec!["on"]);
    }

    #[tokio::test]
    async fn all_disabled_is_a_silent_noop() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, store) = executor(vec![Step::new("off", 1, &trace).disabled()]);

        let outcome = executor.execute_handlers("test.event", &json!({})).await;

        assert_eq!(
            outcome,
            RunOutcome::Skipped {
                reason: SkipReason::NoHandlers
            }
        );
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_event_type_is_skipped() {
        let (executor, store) = executor(vec![]);
        let outcome = executor.execute_handlers("unknown", &json!({})).await;
        assert!(outcome.is_skipped());
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn audit_failure_does_not_propagate() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, store) = executor(vec![Step::new("a", 1, &trace)]);
        store.set_fail_on_append(true);

        let outcome = executor.execute_handlers("test.event", &json!({})).await;

        assert_eq!(outcome.stats().unwrap().succeeded, 1);
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn audit_record_matches_run() {
        let trace = Arc::new(AsyncMutex::new(Vec::new()));
        let (executor, store) = executor(vec![Step::new("a", 1, &trace)]);

        let payload = json!({"sale_id": "42"});
        let outcome = executor.execute_handlers("test.event", &payload).await;
        let RunOutcome::Completed { run_id, stats } = outcome else {
            panic!("expected completed run");
        };

        let record = store.get(run_id).await.unwrap().unwrap();
        assert_eq!(record.event_type, "test.event");
        assert_eq!(record.payload, payload);
        assert_eq!(record.stats, stats);
        assert_eq!(record.source, "event-bus");
        assert_eq!(record.triggered_by, "system");
    }

    #[test]
    fn config_builder() {
        let config = ExecutorConfig::new()
            .sync_only("sale.created")
            .handler_timeout(Duration::from_secs(5));
        assert!(config.sync_only_event_types.contains("sale.created"));
        assert_eq!(config.handler_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.source, "event-bus");
        assert_eq!(config.triggered_by, "system");
    }

    #[test]
    fn skipped_outcome_serializes_with_status() {
        let outcome = RunOutcome::Skipped {
            reason: SkipReason::Gate("payment pending".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"status": "skipped", "reason": {"gate": "payment pending"}})
        );
    }
}
