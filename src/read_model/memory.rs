use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::{MatchAggregate, PredictionAggregate, UserAggregate};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::{Aggregate, Watermark};
use super::rows::{MatchRow, PredictionRow, ProjectionRow, UserRow};
use super::store::{MatchFilters, PredictionFilters, ReadModelStore};

// ============================================================================
// In-Memory Read Model
// ============================================================================

struct Table<A> {
    rows: HashMap<String, ProjectionRow<A>>,
}

impl<A> Default for Table<A> {
    fn default() -> Self {
        Self { rows: HashMap::new() }
    }
}

impl<A: Aggregate> Table<A> {
    fn create(&mut self, row: &ProjectionRow<A>) -> CoreResult<()> {
        if self.rows.contains_key(row.id()) {
            return Err(CoreError::Duplicate(row.aggregate().to_string()));
        }
        self.rows.insert(row.id().to_string(), row.clone());
        Ok(())
    }

    fn update(&mut self, row: &ProjectionRow<A>, expected: Watermark) -> CoreResult<()> {
        let stored = self
            .rows
            .get_mut(row.id())
            .ok_or_else(|| CoreError::NotFound(row.aggregate().to_string()))?;
        if stored.watermark != expected {
            return Err(CoreError::Conflict {
                aggregate: row.aggregate().to_string(),
                expected: expected.version,
                found: stored.watermark.version,
            });
        }
        *stored = row.clone();
        Ok(())
    }

    fn upsert(&mut self, row: &ProjectionRow<A>) {
        match self.rows.get(row.id()) {
            Some(stored) if stored.watermark.last_sequence > row.watermark.last_sequence => {}
            _ => {
                self.rows.insert(row.id().to_string(), row.clone());
            }
        }
    }

    fn get(&self, id: &str) -> Option<ProjectionRow<A>> {
        self.rows.get(id).cloned()
    }
}

#[derive(Default)]
struct Tables {
    matches: Table<MatchAggregate>,
    predictions: Table<PredictionAggregate>,
    users: Table<UserAggregate>,
    cursors: HashMap<String, i64>,
}

#[derive(Default)]
pub struct MemoryReadModel {
    tables: RwLock<Tables>,
}

impl MemoryReadModel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadModelStore for MemoryReadModel {
    async fn create_match(&self, row: &MatchRow) -> CoreResult<()> {
        self.tables.write().await.matches.create(row)
    }

    async fn update_match(&self, row: &MatchRow, expected: Watermark) -> CoreResult<()> {
        self.tables.write().await.matches.update(row, expected)
    }

    async fn upsert_match(&self, row: &MatchRow) -> CoreResult<()> {
        self.tables.write().await.matches.upsert(row);
        Ok(())
    }

    async fn get_match(&self, id: &str) -> CoreResult<Option<MatchRow>> {
        Ok(self.tables.read().await.matches.get(id))
    }

    async fn list_matches(&self, filters: &MatchFilters) -> CoreResult<Vec<MatchRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MatchRow> = tables
            .matches
            .rows
            .values()
            .filter(|row| filters.matches(&row.data))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.data.date.cmp(&b.data.date).then_with(|| a.data.id.cmp(&b.data.id)));
        Ok(rows)
    }

    async fn create_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        self.tables.write().await.predictions.create(row)
    }

    async fn update_prediction(&self, row: &PredictionRow, expected: Watermark) -> CoreResult<()> {
        self.tables.write().await.predictions.update(row, expected)
    }

    async fn upsert_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        self.tables.write().await.predictions.upsert(row);
        Ok(())
    }

    async fn get_prediction(&self, id: &str) -> CoreResult<Option<PredictionRow>> {
        Ok(self.tables.read().await.predictions.get(id))
    }

    async fn list_predictions(&self, filters: &PredictionFilters) -> CoreResult<Vec<PredictionRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<PredictionRow> = tables
            .predictions
            .rows
            .values()
            .filter(|row| filters.matches(&row.data))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.data
                .created_at
                .cmp(&b.data.created_at)
                .then_with(|| a.data.id.cmp(&b.data.id))
        });
        Ok(rows)
    }

    async fn create_user(&self, row: &UserRow) -> CoreResult<()> {
        self.tables.write().await.users.create(row)
    }

    async fn update_user(&self, row: &UserRow, expected: Watermark) -> CoreResult<()> {
        self.tables.write().await.users.update(row, expected)
    }

    async fn upsert_user(&self, row: &UserRow) -> CoreResult<()> {
        self.tables.write().await.users.upsert(row);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> CoreResult<Option<UserRow>> {
        Ok(self.tables.read().await.users.get(id))
    }

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<UserRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<UserRow> = tables
            .users
            .rows
            .values()
            .filter(|row| !active_only || row.data.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.data
                .created_at
                .cmp(&b.data.created_at)
                .then_with(|| a.data.id.cmp(&b.data.id))
        });
        Ok(rows)
    }

    async fn clear(&self) -> CoreResult<()> {
        *self.tables.write().await = Tables::default();
        tracing::info!("Cleared in-memory read model");
        Ok(())
    }

    async fn load_cursor(&self, consumer: &str) -> CoreResult<i64> {
        Ok(self.tables.read().await.cursors.get(consumer).copied().unwrap_or(0))
    }

    async fn save_cursor(&self, consumer: &str, sequence: i64) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let cursor = tables.cursors.entry(consumer.to_string()).or_insert(0);
        *cursor = (*cursor).max(sequence);
        Ok(())
    }
}
