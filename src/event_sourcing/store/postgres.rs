use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::PayloadKey;
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{
    decode_all, AggregateRef, EventEnvelope, NewEvent, RawEvent, StoredPosition,
};
use super::event_store::EventStore;

// ============================================================================
// PostgreSQL Event Store
// ============================================================================
//
// Sequence and version are allocated inside the inserting transaction while
// holding a transaction-scoped advisory lock, so concurrent appends from any
// number of processes serialize on the log and never share a position.
//
// Payloads are stored as `JSON` (not `JSONB`) to keep the text as written.
// They cross the driver as text in both directions.
//
// ============================================================================

/// Advisory lock key guarding position allocation.
const EVENT_LOG_LOCK: i64 = 0x6576_656e_745f_6c6f;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

const SELECT_EVENTS: &str = r#"
    SELECT id, event_type, aggregate_kind, aggregate_id, sequence, version,
           timestamp, data::text AS data
    FROM events
"#;

const INSERT_EVENT: &str = r#"
    INSERT INTO events
        (sequence, id, event_type, aggregate_kind, aggregate_id, version, data, timestamp)
    VALUES ($1, $2, $3, $4, $5, $6, $7::json, $8)
"#;

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the events table and its indexes if missing.
    pub async fn migrate(&self) -> CoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                sequence BIGINT PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                event_type TEXT NOT NULL,
                aggregate_kind TEXT NOT NULL,
                aggregate_id TEXT NOT NULL,
                version BIGINT NOT NULL,
                data JSON NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                UNIQUE (aggregate_kind, aggregate_id, version)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS events_type_idx ON events (event_type, sequence)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS events_timestamp_idx ON events (timestamp, sequence)",
        )
        .execute(&self.pool)
        .await?;
        for key in PayloadKey::ALL {
            sqlx::query(&key_index_ddl(key))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn fetch(&self, query: PgQuery<'_>) -> CoreResult<Vec<EventEnvelope>> {
        let rows = query.fetch_all(&self.pool).await?;
        let raw = rows
            .iter()
            .map(raw_event_from_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        decode_all(raw)
    }
}

/// Expression index matching the predicate `events_by_key` issues.
fn key_index_ddl(key: PayloadKey) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS events_{}_idx ON events (event_type, (data->>'{}'), sequence)",
        key.field().to_ascii_lowercase(),
        key.field()
    )
}

fn key_lookup_sql(key: PayloadKey) -> String {
    // the field name is spliced in so the planner can match the expression index
    format!(
        "{} WHERE event_type = $1 AND data->>'{}' = $2 ORDER BY sequence",
        SELECT_EVENTS,
        key.field()
    )
}

fn raw_event_from_row(row: &PgRow) -> Result<RawEvent, sqlx::Error> {
    Ok(RawEvent {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        aggregate_kind: row.try_get("aggregate_kind")?,
        aggregate_id: row.try_get("aggregate_id")?,
        sequence: row.try_get("sequence")?,
        version: row.try_get("version")?,
        timestamp: row.try_get("timestamp")?,
        data: row.try_get("data")?,
    })
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, event: &NewEvent) -> CoreResult<StoredPosition> {
        let data = event.encode_payload()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(EVENT_LOG_LOCK)
            .execute(&mut *tx)
            .await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT sequence FROM events WHERE id = $1")
            .bind(&event.id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(CoreError::Duplicate(format!("event {}", event.id)));
        }

        let sequence: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(sequence), 0) + 1 FROM events")
            .fetch_one(&mut *tx)
            .await?;
        let version: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1
            FROM events
            WHERE aggregate_kind = $1 AND aggregate_id = $2
            "#,
        )
        .bind(event.aggregate.kind.as_str())
        .bind(&event.aggregate.id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(INSERT_EVENT)
            .bind(sequence)
            .bind(&event.id)
            .bind(event.event_type())
            .bind(event.aggregate.kind.as_str())
            .bind(&event.aggregate.id)
            .bind(version)
            .bind(&data)
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type(),
            aggregate = %event.aggregate,
            sequence,
            version,
            "Appended event to PostgreSQL log"
        );

        Ok(StoredPosition { sequence, version })
    }

    async fn events_for_aggregate(&self, aggregate: &AggregateRef) -> CoreResult<Vec<EventEnvelope>> {
        let sql = format!(
            "{} WHERE aggregate_kind = $1 AND aggregate_id = $2 ORDER BY sequence",
            SELECT_EVENTS
        );
        self.fetch(
            sqlx::query(&sql)
                .bind(aggregate.kind.as_str())
                .bind(&aggregate.id),
        )
        .await
    }

    async fn events_by_type(&self, event_type: &str) -> CoreResult<Vec<EventEnvelope>> {
        let sql = format!("{} WHERE event_type = $1 ORDER BY sequence", SELECT_EVENTS);
        self.fetch(sqlx::query(&sql).bind(event_type)).await
    }

    async fn events_by_key(
        &self,
        event_type: &str,
        key: PayloadKey,
        value: &str,
    ) -> CoreResult<Vec<EventEnvelope>> {
        let sql = key_lookup_sql(key);
        self.fetch(sqlx::query(&sql).bind(event_type).bind(value))
            .await
    }

    async fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<EventEnvelope>> {
        let sql = format!(
            "{} WHERE timestamp >= $1 AND timestamp <= $2 ORDER BY timestamp, sequence",
            SELECT_EVENTS
        );
        self.fetch(sqlx::query(&sql).bind(start).bind(end)).await
    }

    async fn events_after(&self, sequence: i64, limit: usize) -> CoreResult<Vec<EventEnvelope>> {
        let sql = format!("{} WHERE sequence > $1 ORDER BY sequence LIMIT $2", SELECT_EVENTS);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.fetch(sqlx::query(&sql).bind(sequence).bind(limit)).await
    }

    async fn current_version(&self, aggregate: &AggregateRef) -> CoreResult<i64> {
        let version: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0)
            FROM events
            WHERE aggregate_kind = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate.kind.as_str())
        .bind(&aggregate.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }
}
