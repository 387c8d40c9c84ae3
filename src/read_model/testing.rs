use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::Watermark;
use super::memory::MemoryReadModel;
use super::rows::{MatchRow, PredictionRow, UserRow};
use super::store::{MatchFilters, PredictionFilters, ReadModelStore};

/// In-memory read model whose row writes can be switched off.
#[derive(Default)]
pub struct FlakyReadModel {
    inner: MemoryReadModel,
    failing: AtomicBool,
}

impl FlakyReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CoreError::Storage("read model unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReadModelStore for FlakyReadModel {
    async fn create_match(&self, row: &MatchRow) -> CoreResult<()> {
        self.check()?;
        self.inner.create_match(row).await
    }

    async fn update_match(&self, row: &MatchRow, expected: Watermark) -> CoreResult<()> {
        self.check()?;
        self.inner.update_match(row, expected).await
    }

    async fn upsert_match(&self, row: &MatchRow) -> CoreResult<()> {
        self.check()?;
        self.inner.upsert_match(row).await
    }

    async fn get_match(&self, id: &str) -> CoreResult<Option<MatchRow>> {
        self.inner.get_match(id).await
    }

    async fn list_matches(&self, filters: &MatchFilters) -> CoreResult<Vec<MatchRow>> {
        self.inner.list_matches(filters).await
    }

    async fn create_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        self.check()?;
        self.inner.create_prediction(row).await
    }

    async fn update_prediction(&self, row: &PredictionRow, expected: Watermark) -> CoreResult<()> {
        self.check()?;
        self.inner.update_prediction(row, expected).await
    }

    async fn upsert_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        self.check()?;
        self.inner.upsert_prediction(row).await
    }

    async fn get_prediction(&self, id: &str) -> CoreResult<Option<PredictionRow>> {
        self.inner.get_prediction(id).await
    }

    async fn list_predictions(&self, filters: &PredictionFilters) -> CoreResult<Vec<PredictionRow>> {
        self.inner.list_predictions(filters).await
    }

    async fn create_user(&self, row: &UserRow) -> CoreResult<()> {
        self.check()?;
        self.inner.create_user(row).await
    }

    async fn update_user(&self, row: &UserRow, expected: Watermark) -> CoreResult<()> {
        self.check()?;
        self.inner.update_user(row, expected).await
    }

    async fn upsert_user(&self, row: &UserRow) -> CoreResult<()> {
        self.check()?;
        self.inner.upsert_user(row).await
    }

    async fn get_user(&self, id: &str) -> CoreResult<Option<UserRow>> {
        self.inner.get_user(id).await
    }

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<UserRow>> {
        self.inner.list_users(active_only).await
    }

    async fn clear(&self) -> CoreResult<()> {
        self.inner.clear().await
    }

    async fn load_cursor(&self, consumer: &str) -> CoreResult<i64> {
        self.inner.load_cursor(consumer).await
    }

    async fn save_cursor(&self, consumer: &str, sequence: i64) -> CoreResult<()> {
        self.check()?;
        self.inner.save_cursor(consumer, sequence).await
    }
}
