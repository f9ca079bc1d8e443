//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need Docker, so they are
//! ignored by default. Run with:
//!
//! ```bash
//! cargo test -p audit-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use audit_store::{
    AuditId, AuditQuery, AuditRecord, AuditStore, AuditStoreExt, ExecutionStats,
    HandlerExecutionResult, PostgresAuditStore,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_audit_records_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresAuditStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE audit_records")
        .execute(&pool)
        .await
        .unwrap();

    PostgresAuditStore::new(pool)
}

fn create_test_record(event_type: &str, failing_handler: Option<&str>) -> AuditRecord {
    let mut results = vec![HandlerExecutionResult::succeeded(
        "shipping_preorder",
        4,
        serde_json::json!({"shipping_preorder": {"tracking_number": "TRACK-0001"}}),
    )];
    if let Some(name) = failing_handler {
        results.push(HandlerExecutionResult::failed(name, 2, "carrier unavailable"));
    }

    AuditRecord::builder()
        .event_type(event_type)
        .payload(serde_json::json!({"sale_id": "abc", "payment_state": "aprobado"}))
        .stats(ExecutionStats::from_results(results, 6))
        .handler_data(serde_json::json!({"shipping_preorder": {"tracking_number": "TRACK-0001"}}))
        .source("event-bus")
        .triggered_by("system")
        .try_build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn append_and_get_roundtrip() {
    let store = get_test_store().await;
    let record = create_test_record("sale.created", Some("shipping_labels"));

    let id = store.append(record.clone()).await.unwrap();
    let loaded = store.get(id).await.unwrap().unwrap();

    assert_eq!(loaded.event_type, "sale.created");
    assert_eq!(loaded.stats.executed, 2);
    assert_eq!(loaded.stats.failed, 1);
    assert_eq!(loaded.stats.results, record.stats.results);
    assert_eq!(loaded.handler_data, record.handler_data);
    assert_eq!(loaded.source, "event-bus");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn get_missing_record() {
    let store = get_test_store().await;
    assert!(store.get(AuditId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn query_by_event_type_and_failures() {
    let store = get_test_store().await;
    store.append(create_test_record("sale.created", None)).await.unwrap();
    store
        .append(create_test_record("sale.created", Some("accounting_export")))
        .await
        .unwrap();
    store.append(create_test_record("sale.cancelled", None)).await.unwrap();

    let created = store.records_for_event_type("sale.created").await.unwrap();
    assert_eq!(created.len(), 2);

    let failures = store
        .query(AuditQuery::new().failures_only())
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stats.failed, 1);

    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn query_pagination() {
    let store = get_test_store().await;
    for _ in 0..4 {
        store.append(create_test_record("sale.created", None)).await.unwrap();
    }

    let page = store
        .query(AuditQuery::for_event_type("sale.created").limit(2).offset(1))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}
