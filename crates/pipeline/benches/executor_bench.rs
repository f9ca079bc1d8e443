use std::sync::Arc;

use async_trait::async_trait;
use audit_store::{AuditId, AuditQuery, AuditRecord, AuditStore};
use criterion::{Criterion, criterion_group, criterion_main};
use pipeline::{EventBus, Executor, Handler, HandlerRegistry, HandlerResult, PipelineContext};

struct Publish {
    name: &'static str,
    priority: u32,
}

#[async_trait]
impl Handler for Publish {
    fn name(&self) -> &'static str {
        self.name
    }

    fn event_type(&self) -> &'static str {
        "bench.event"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn execute(&self, payload: &serde_json::Value, ctx: &mut PipelineContext) -> HandlerResult {
        ctx.set_field("echo", payload["n"].clone())?;
        Ok(())
    }
}

/// Accepts and drops every record so long benchmark runs do not grow memory.
struct DiscardStore;

#[async_trait]
impl AuditStore for DiscardStore {
    async fn append(&self, record: AuditRecord) -> audit_store::Result<AuditId> {
        Ok(record.id)
    }

    async fn get(&self, _id: AuditId) -> audit_store::Result<Option<AuditRecord>> {
        Ok(None)
    }

    async fn query(&self, _query: AuditQuery) -> audit_store::Result<Vec<AuditRecord>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> audit_store::Result<usize> {
        Ok(0)
    }
}

const NAMES: [&str; 8] = ["h0", "h1", "h2", "h3", "h4", "h5", "h6", "h7"];

fn build_executor(handlers: usize) -> Executor<DiscardStore> {
    let mut builder = HandlerRegistry::builder();
    for (i, name) in NAMES.iter().take(handlers).enumerate() {
        builder = builder
            .register(Arc::new(Publish {
                name: *name,
                priority: (handlers - i) as u32,
            }))
            .unwrap();
    }

    Executor::builder(
        Arc::new(builder.build()),
        DiscardStore,
        EventBus::new(),
    )
    .build()
}

fn bench_run_single_handler(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let executor = build_executor(1);
    let payload = serde_json::json!({"n": 1});

    c.bench_function("executor/run_1_handler", |b| {
        b.iter(|| rt.block_on(executor.execute_handlers("bench.event", &payload)));
    });
}

fn bench_run_eight_handlers(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let executor = build_executor(8);
    let payload = serde_json::json!({"n": 1});

    c.bench_function("executor/run_8_handlers", |b| {
        b.iter(|| rt.block_on(executor.execute_handlers("bench.event", &payload)));
    });
}

fn bench_skipped_run(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let executor = build_executor(0);
    let payload = serde_json::json!({});

    c.bench_function("executor/skipped_no_handlers", |b| {
        b.iter(|| rt.block_on(executor.execute_handlers("bench.event", &payload)));
    });
}

criterion_group!(
    benches,
    bench_run_single_handler,
    bench_run_eight_handlers,
    bench_skipped_run
);
criterion_main!(benches);
