//! User-feedback persistence.
//!
//! Feedback records are row-addressable (submitted one at a time from the
//! web UI, consumed in bulk by the learning merge), so they live in an
//! embedded tree store rather than the single-blob index file.

pub mod memory;
pub mod sled_store;

pub use memory::InMemoryFeedbackStore;
pub use sled_store::SledFeedbackStore;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::models::FeedbackRecord;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Storage abstraction for feedback records
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persist a new feedback record
    async fn submit(&self, feedback: &FeedbackRecord) -> Result<()>;

    /// Fetch a feedback record by id
    async fn get(&self, id: &Uuid) -> Result<Option<FeedbackRecord>>;

    /// List records not yet folded into the index, oldest first
    async fn list_unconsumed(&self) -> Result<Vec<FeedbackRecord>>;

    /// Mark records as consumed by a completed merge
    async fn mark_consumed(&self, ids: &[Uuid]) -> Result<()>;

    /// Increment the helpful counter
    async fn record_helpful(&self, id: &Uuid) -> Result<()>;

    /// Increment the used counter
    async fn record_used(&self, id: &Uuid) -> Result<()>;
}

/// Create the default persistent feedback store
pub fn create_feedback_store(storage: &StorageConfig) -> Result<Arc<dyn FeedbackStore>> {
    let store = SledFeedbackStore::open(storage.feedback_db_path())?;
    Ok(Arc::new(store))
}
