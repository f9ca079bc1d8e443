use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AuditId, AuditQuery, AuditRecord, ExecutionStats, HandlerExecutionResult, Result,
    store::AuditStore,
};

const SELECT_COLUMNS: &str = "SELECT id, event_type, payload, executed, succeeded, failed, \
     total_duration_ms, results, handler_data, source, triggered_by, recorded_at \
     FROM audit_records";

/// PostgreSQL-backed audit store implementation.
#[derive(Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    /// Creates a new PostgreSQL audit store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<AuditRecord> {
        let results_json: serde_json::Value = row.try_get("results")?;
        let results: Vec<HandlerExecutionResult> = serde_json::from_value(results_json)?;

        let stats = ExecutionStats {
            executed: row.try_get::<i32, _>("executed")? as usize,
            succeeded: row.try_get::<i32, _>("succeeded")? as usize,
            failed: row.try_get::<i32, _>("failed")? as usize,
            total_duration_ms: row.try_get::<i64, _>("total_duration_ms")? as u64,
            results,
        };

        Ok(AuditRecord {
            id: AuditId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            stats,
            handler_data: row.try_get("handler_data")?,
            source: row.try_get("source")?,
            triggered_by: row.try_get("triggered_by")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    #[tracing::instrument(skip(self, record), fields(event_type = %record.event_type))]
    async fn append(&self, record: AuditRecord) -> Result<AuditId> {
        let results_json = serde_json::to_value(&record.stats.results)?;

        sqlx::query(
            r#"
            INSERT INTO audit_records (id, event_type, payload, executed, succeeded, failed,
                total_duration_ms, results, handler_data, source, triggered_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(i32::try_from(record.stats.executed).unwrap_or(i32::MAX))
        .bind(i32::try_from(record.stats.succeeded).unwrap_or(i32::MAX))
        .bind(i32::try_from(record.stats.failed).unwrap_or(i32::MAX))
        .bind(i64::try_from(record.stats.total_duration_ms).unwrap_or(i64::MAX))
        .bind(results_json)
        .bind(&record.handler_data)
        .bind(&record.source)
        .bind(&record.triggered_by)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    async fn get(&self, id: AuditId) -> Result<Option<AuditRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditRecord>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COLUMNS);
        builder.push(" WHERE TRUE");

        if let Some(event_type) = query.event_type {
            builder.push(" AND event_type = ").push_bind(event_type);
        }
        if query.failures_only {
            builder.push(" AND failed > 0");
        }
        if let Some(from) = query.from_timestamp {
            builder.push(" AND recorded_at >= ").push_bind(from);
        }
        if let Some(to) = query.to_timestamp {
            builder.push(" AND recorded_at <= ").push_bind(to);
        }

        builder.push(" ORDER BY recorded_at DESC");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(sql_count(limit));
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ").push_bind(sql_count(offset));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

// Postgres counts are BIGINT; anything larger saturates instead of wrapping.
fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
