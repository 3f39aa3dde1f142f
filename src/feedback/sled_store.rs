use crate::error::{AppError, Result};
use crate::feedback::FeedbackStore;
use crate::models::FeedbackRecord;
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent feedback store using the Sled embedded database
#[derive(Clone)]
pub struct SledFeedbackStore {
    db: Arc<Db>,
    feedback_tree: sled::Tree,
}

impl SledFeedbackStore {
    /// Open (or create) a Sled store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path)
            .map_err(|e| AppError::Internal(format!("failed to open Sled database: {}", e)))?;

        let feedback_tree = db
            .open_tree("feedback")
            .map_err(|e| AppError::Internal(format!("failed to open feedback tree: {}", e)))?;

        tracing::info!("Initialized feedback store at {:?}", path_str);

        Ok(Self {
            db: Arc::new(db),
            feedback_tree,
        })
    }

    fn serialize(record: &FeedbackRecord) -> Result<Vec<u8>> {
        bincode::serialize(record)
            .map_err(|e| AppError::Serialization(format!("failed to serialize feedback: {}", e)))
    }

    fn deserialize(bytes: &[u8]) -> Result<FeedbackRecord> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("failed to deserialize feedback: {}", e)))
    }

    fn key(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    fn update<F>(&self, id: &Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut FeedbackRecord),
    {
        let key = Self::key(id);
        let existing = self
            .feedback_tree
            .get(&key)
            .map_err(|e| AppError::Internal(format!("failed to read feedback: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("feedback {} not found", id)))?;

        let mut record = Self::deserialize(&existing)?;
        f(&mut record);

        self.feedback_tree
            .insert(&key, Self::serialize(&record)?)
            .map_err(|e| AppError::Internal(format!("failed to update feedback: {}", e)))?;

        Ok(())
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Internal(format!("failed to flush database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for SledFeedbackStore {
    async fn submit(&self, feedback: &FeedbackRecord) -> Result<()> {
        let key = Self::key(&feedback.id);
        let value = Self::serialize(feedback)?;

        self.feedback_tree
            .insert(&key, value)
            .map_err(|e| AppError::Internal(format!("failed to save feedback: {}", e)))?;

        tracing::debug!(
            feedback_id = %feedback.id,
            ticket_id = %feedback.ticket_id,
            "Feedback saved"
        );
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<FeedbackRecord>> {
        let bytes = self
            .feedback_tree
            .get(Self::key(id))
            .map_err(|e| AppError::Internal(format!("failed to read feedback: {}", e)))?;

        bytes.map(|b| Self::deserialize(&b)).transpose()
    }

    async fn list_unconsumed(&self) -> Result<Vec<FeedbackRecord>> {
        let mut pending = Vec::new();

        for entry in self.feedback_tree.iter() {
            let (_, value) =
                entry.map_err(|e| AppError::Internal(format!("failed to scan feedback: {}", e)))?;
            let record = Self::deserialize(&value)?;
            if !record.consumed {
                pending.push(record);
            }
        }

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
