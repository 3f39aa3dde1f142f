use crate::error::{AppError, Result};
use crate::feedback::FeedbackStore;
use crate::models::FeedbackRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory feedback store (for MVP and testing)
#[derive(Clone, Default)]
pub struct InMemoryFeedbackStore {
    records: Arc<DashMap<Uuid, FeedbackRecord>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    fn update<F>(&self, id: &Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut FeedbackRecord),
    {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("feedback {} not found", id)))?;
        f(entry.value_mut());
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn submit(&self, feedback: &FeedbackRecord) -> Result<()> {
        self.records.insert(feedback.id, feedback.clone());
        tracing::debug!(feedback_id = %feedback.id, ticket_id = %feedback.ticket_id, "Feedback saved");
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<FeedbackRecord>> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn list_unconsumed(&self) -> Result<Vec<FeedbackRecord>> {
        let mut pending: Vec<FeedbackRecord> = self
            .records
            .iter()
            .filter(|entry| !entry.value().consumed)
            .map(|entry| entry.value().clone())
            .collect();

        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn mark_consumed(&self, ids: &[Uuid]) -> Result<()> {
        for id in ids {
            self.update(id, |record| record.consumed = true)?;
        }
        Ok(())
    }

    async fn record_helpful(&self, id: &Uuid) -> Result<()> {
        self.update(id, |record| record.helpful_count += 1)
    }

    async fn record_used(&self, id: &Uuid) -> Result<()> {
        self.update(id, |record| record.used_count += 1)
    }
}
