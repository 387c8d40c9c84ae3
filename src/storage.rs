use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::store::{EventStore, MemoryEventStore, PostgresEventStore};
use crate::read_model::{MemoryReadModel, PostgresReadModel, ReadModelStore};

/// The pair of stores the core runs on.
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub read_model: Arc<dyn ReadModelStore>,
}

/// Open the configured backend. PostgreSQL tables are created if missing.
pub async fn connect(config: &Config) -> CoreResult<Stores> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Stores {
                events: Arc::new(MemoryEventStore::new()),
                read_model: Arc::new(MemoryReadModel::new()),
            })
        }
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                CoreError::Validation("DATABASE_URL is required for postgres".to_string())
            })?;
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;

            let events = PostgresEventStore::new(pool.clone());
            events.migrate().await?;
            let read_model = PostgresReadModel::new(pool);
            read_model.migrate().await?;

            tracing::info!(
                max_connections = config.database_max_connections,
                "Using PostgreSQL storage"
            );
            Ok(Stores {
                events: Arc::new(events),
                read_model: Arc::new(read_model),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::AggregateRef;

    #[tokio::test]
    async fn test_memory_backend_starts_empty() {
        let config = Config::from_lookup(|_| None).unwrap();
        let stores = connect(&config).await.unwrap();

        let version = stores
            .events
            .current_version(&AggregateRef::of_match("M1"))
            .await
            .unwrap();
        assert_eq!(version, 0);
        assert!(stores.read_model.list_users(false).await.unwrap().is_empty());
    }
}
