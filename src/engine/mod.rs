//! Retrieval and continuous-learning orchestrator.
//!
//! Owns the staging area and the in-memory historical index. Readers
//! always see either the old complete index or the new complete one:
//! merges build the replacement off to the side and swap a single `Arc`
//! (copy-on-write, no fine-grained locking).

pub mod analyzer;

pub use analyzer::{BatchAnalyzer, EnrichedRecord, PassthroughAnalyzer};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::feedback::FeedbackStore;
use crate::index::{HistoricalIndex, HistoricalIndexer, IndexStorage, VectorizerConfig};
use crate::models::{FeedbackRecord, RankedMatch, TicketRecord};
use crate::normalizer;
use crate::staging::{StagingArea, StagingStore};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Minimum analyzer confidence before a classification is folded into
/// the staged record
const CLASSIFICATION_CONFIDENCE_FLOOR: f64 = 0.5;

/// Outcome of staging an upload batch
#[derive(Debug, Clone, serde::Serialize)]
pub struct StageReport {
    /// Records accepted into the staging area
    pub staged: usize,

    /// Total records now pending merge
    pub pending_total: usize,

    /// Lifetime upload counter
    pub upload_count: u64,
}

/// Outcome of a learning merge
#[derive(Debug, Clone, serde::Serialize)]
pub struct MergeReport {
    /// Staged records folded into the index
    pub merged_records: usize,

    /// Feedback records folded into the index
    pub merged_feedback: usize,

    /// Records skipped because their id was already indexed
    pub skipped_existing: usize,

    /// Same-id, different-content records detected (kept, not dropped)
    pub conflicts: usize,

    /// Records dropped because vectorization failed
    pub skipped_records: usize,

    /// Index size after the merge
    pub total_records: usize,

    /// Whether a rebuild actually happened
    pub rebuilt: bool,
}

/// Outcome of a full rebuild from corpus sources
#[derive(Debug, Clone, serde::Serialize)]
pub struct RebuildReport {
    /// Records indexed
    pub indexed: usize,

    /// Malformed source rows skipped
    pub skipped_rows: usize,

    /// Duplicate source rows dropped
    pub duplicate_rows: usize,

    /// Sources that could not be read
    pub failed_sources: Vec<PathBuf>,
}

/// Ranked matches plus an optional human-readable diagnostic
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResults {
    /// Matches, scores non-increasing
    pub matches: Vec<RankedMatch>,

    /// Set when the result set is empty for an operational reason
    pub diagnostic: Option<String>,
}

impl SearchResults {
    fn empty(diagnostic: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Engine status snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
    /// Records in the historical index
    pub indexed_records: usize,

    /// Vector dimension of the fitted vectorizer
    pub dimension: usize,

    /// When the index was last built
    pub indexed_at: chrono::DateTime<chrono::Utc>,

    /// Records pending merge
    pub pending_staged: usize,

    /// Lifetime upload counter
    pub upload_count: u64,
}

/// Retrieval & continuous-learning orchestrator
pub struct RetrievalEngine {
    indexer: HistoricalIndexer,
    index_storage: IndexStorage,
    staging_store: StagingStore,
    staging: Mutex<StagingArea>,
    feedback_store: Arc<dyn FeedbackStore>,
    analyzer: Arc<dyn BatchAnalyzer>,
    /// Currently visible index; replaced wholesale, never mutated
    current: RwLock<Arc<HistoricalIndex>>,
    /// Single-writer guard for merges and rebuilds
    merge_lock: Mutex<()>,
    max_batch_size: usize,
}

impl RetrievalEngine {
    /// Create the engine, loading persisted state from disk.
    ///
    /// A corrupt index falls back to the newest readable backup, else
    /// the engine starts with an empty index.
    pub fn new(
        config: &Config,
        feedback_store: Arc<dyn FeedbackStore>,
        analyzer: Arc<dyn BatchAnalyzer>,
    ) -> Result<Self> {
        let vectorizer_config = VectorizerConfig::from(&config.indexing);
        let index_storage = IndexStorage::new(&config.storage);
        let staging_store = StagingStore::new(config.storage.staging_path());

        let index = index_storage.load_or_recover(vectorizer_config.clone());
        let staging = staging_store.load();

        info!(
            indexed_records = index.len(),
            pending_staged = staging.len(),
            "Retrieval engine initialized"
        );

        Ok(Self {
            indexer: HistoricalIndexer::new(vectorizer_config),
            index_storage,
            staging_store,
            staging: Mutex::new(staging),
            feedback_store,
            analyzer,
            current: RwLock::new(Arc::new(index)),
            merge_lock: Mutex::new(()),
            max_batch_size: config.learning.max_batch_size,
        })
    }

    /// Snapshot of the currently visible index
    pub fn current_index(&self) -> Arc<HistoricalIndex> {
        self.current.read().clone()
    }

    /// Feedback store handle
    pub fn feedback_store(&self) -> Arc<dyn FeedbackStore> {
        self.feedback_store.clone()
    }

    /// Stage an upload batch for the next learning merge.
    ///
    /// Records are validated, enriched through the batch analyzer and
    /// normalized; the staging file is persisted before returning. The
    /// historical index is not touched.
    pub async fn stage_upload(&self, uploads: Vec<TicketRecord>) -> Result<StageReport> {
        if uploads.is_empty() {
            return Err(AppError::Validation("upload batch is empty".to_string()));
        }
        if uploads.len() > self.max_batch_size {
            return Err(AppError::Validation(format!(
                "upload batch of {} exceeds the configured maximum of {}",
                uploads.len(),
                self.max_batch_size
            )));
        }

        let mut prepared = Vec::with_capacity(uploads.len());
        for record in uploads {
            record.validate()?;
            let mut record = self.enrich(record).await?;
            record.search_text = normalizer::normalize(&record.raw_text());
            prepared.push(record);
        }

        let staged = prepared.len();
        let mut staging = self.staging.lock().await;
        staging.append(prepared);
        self.staging_store.save(&staging)?;

        let report = StageReport {
            staged,
            pending_total: staging.len(),
            upload_count: staging.upload_count,
        };

        info!(
            staged = report.staged,
            pending_total = report.pending_total,
            "Upload batch staged"
        );

        Ok(report)
    }

    async fn enrich(&self, record: TicketRecord) -> Result<TicketRecord> {
        let enriched = self.analyzer.analyze(record).await?;
        let mut record = enriched.record;

        if record.assigned_group.is_empty()
            && enriched.confidence >= CLASSIFICATION_CONFIDENCE_FLOOR
        {
            if let Some(classification) = enriched.classification {
                debug!(
                    ticket_id = %record.id,
                    classification = %classification,
                    confidence = enriched.confidence,
                    "Applying analyzer classification"
                );
                record.assigned_group = classification;
            }
        }

        Ok(record)
    }

    /// Merge staged records and unconsumed feedback into the historical
    /// index with a full re-fit.
    ///
    /// On any failure the previous on-disk index stays valid and the
    /// staging area keeps its records, so the merge simply retries at
    /// the next scheduled run.
    pub async fn merge(&self) -> Result<MergeReport> {
        let _writer = self.merge_lock.lock().await;

        // Snapshot the work; uploads arriving after this point are left
        // for the next merge
        let staged_snapshot: Vec<TicketRecord> = self.staging.lock().await.records.clone();
        let pending_feedback = self.feedback_store.list_unconsumed().await?;

        if staged_snapshot.is_empty() && pending_feedback.is_empty() {
            debug!("Nothing staged and no pending feedback, skipping merge");
            let index = self.current_index();
            return Ok(MergeReport {
                merged_records: 0,
                merged_feedback: 0,
                skipped_existing: 0,
                conflicts: 0,
                skipped_records: 0,
                total_records: index.len(),
                rebuilt: false,
            });
        }

        let index = self.current_index();
        let mut existing_ids: HashSet<String> =
            index.records.iter().map(|r| r.id.clone()).collect();

        let mut additions: Vec<TicketRecord> = Vec::new();
        let mut batch_seen: HashMap<String, String> = HashMap::new();
        let mut skipped_existing = 0usize;
        let mut conflicts = 0usize;

        for record in &staged_snapshot {
            if existing_ids.contains(&record.id) {
                skipped_existing += 1;
                continue;
            }

            let fingerprint = record.content_fingerprint();
            match batch_seen.get(&record.id) {
                Some(seen) if *seen == fingerprint => {
                    // Pure duplicate within the batch
                    skipped_existing += 1;
                    continue;
                }
                Some(_) => {
                    // Same id, different content: keep both, never drop data
                    conflicts += 1;
                    warn!(
                        ticket_id = %record.id,
                        "{}",
                        AppError::MergeConflict(format!(
                            "staged batch contains id {} twice with differing content",
                            record.id
                        ))
                    );
                }
                None => {
                    batch_seen.insert(record.id.clone(), fingerprint);
                }
            }

            additions.push(record.clone());
        }
        let merged_records = additions.len();

        // Fold feedback into synthetic user-corrected records
        let mut consumed_feedback: Vec<Uuid> = Vec::new();
        let mut merged_feedback = 0usize;
        for feedback in &pending_feedback {
            consumed_feedback.push(feedback.id);

            let synthetic_id = feedback.corrected_record_id();
            if existing_ids.contains(&synthetic_id) || batch_seen.contains_key(&synthetic_id) {
                warn!(
                    ticket_id = %feedback.ticket_id,
                    synthetic_id = %synthetic_id,
                    "Correction already indexed, skipping"
                );
                skipped_existing += 1;
                continue;
            }

            let mut synthetic = feedback.to_ticket_record(index.find_record(&feedback.ticket_id));
            synthetic.search_text = normalizer::normalize(&synthetic.raw_text());
            existing_ids.insert(synthetic_id);
            additions.push(synthetic);
            merged_feedback += 1;
        }

        if additions.is_empty() {
            // Everything staged was already indexed; drain the staging
            // area without paying for a rebuild
            self.clear_merged_staging(&staged_snapshot).await?;
            self.feedback_store.mark_consumed(&consumed_feedback).await?;

            info!(
                skipped_existing,
                "All staged records were already indexed, skipping rebuild"
            );
            return Ok(MergeReport {
                merged_records: 0,
                merged_feedback: 0,
                skipped_existing,
                conflicts,
                skipped_records: 0,
                total_records: index.len(),
                rebuilt: false,
            });
        }

        info!(
            staged = staged_snapshot.len(),
            feedback = pending_feedback.len(),
            additions = additions.len(),
            skipped_existing,
            conflicts,
            "Merging into historical index"
        );

        // Full re-fit over the complete record list
        let mut full_records = index.records.clone();
        full_records.extend(additions);
        let outcome = self.indexer.build_index(full_records)?;

        // Backup, persist, then swap the visible index
        self.index_storage.backup_current()?;
        self.index_storage.save(&outcome.index)?;

        let total_records = outcome.index.len();
        *self.current.write() = Arc::new(outcome.index);

        // Only now is it safe to drop staged work
        self.clear_merged_staging(&staged_snapshot).await?;
        self.feedback_store.mark_consumed(&consumed_feedback).await?;

        let report = MergeReport {
            merged_records,
            merged_feedback,
            skipped_existing,
            conflicts,
            skipped_records: outcome.skipped_records,
            total_records,
            rebuilt: true,
        };

        info!(
            merged_records = report.merged_records,
            merged_feedback = report.merged_feedback,
            total_records = report.total_records,
            "Learning merge completed"
        );

        Ok(report)
    }

    /// Remove exactly the merged snapshot from staging, preserving any
    /// uploads that raced with the merge.
    async fn clear_merged_staging(&self, merged: &[TicketRecord]) -> Result<()> {
        let merged_fingerprints: HashSet<String> =
            merged.iter().map(|r| r.content_fingerprint()).collect();

        let mut staging = self.staging.lock().await;
        staging
            .records
            .retain(|r| !merged_fingerprints.contains(&r.content_fingerprint()));
        staging.last_updated = chrono::Utc::now();
        self.staging_store.save(&staging)
    }

    /// Rebuild the index from scratch out of historical corpus sources
    pub async fn rebuild_from_sources(&self, sources: &[PathBuf]) -> Result<RebuildReport> {
        let _writer = self.merge_lock.lock().await;

        let report = self.indexer.load_corpus(sources)?;
        let outcome = self.indexer.build_index(report.records)?;

        self.index_storage.backup_current()?;
        self.index_storage.save(&outcome.index)?;

        let indexed = outcome.index.len();
        *self.current.write() = Arc::new(outcome.index);

        info!(indexed, "Index rebuilt from sources");

        Ok(RebuildReport {
            indexed,
            skipped_rows: report.skipped_rows,
            duplicate_rows: report.duplicate_rows,
            failed_sources: report.failed_sources,
        })
    }

    /// Rank historical tickets by similarity to the query text.
    ///
    /// Never fails: an empty, missing or unusable index yields an empty
    /// result set with a diagnostic instead.
    pub fn semantic_search(&self, query: &str, top_k: usize) -> SearchResults {
        let index = self.current_index();

        if index.is_empty() {
            return SearchResults::empty("historical index is empty; stage and merge data first");
        }

        let normalized = normalizer::normalize(query);
        if normalized.is_empty() {
            return SearchResults::empty("query contained no searchable text");
        }

        let query_vector = match index.vectorizer.transform(&normalized) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Query vectorization failed");
                return SearchResults::empty(format!("query could not be vectorized: {}", e));
            }
        };

        let top_k = top_k.clamp(1, index.len());

        let scores = index.matrix.dot(&query_vector);

        // Stable sort keeps corpus order for tied scores
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let matches: Vec<RankedMatch> = order
            .into_iter()
            .take(top_k)
            .filter(|&i| scores[i] > 0.0)
            .map(|i| RankedMatch {
                score: scores[i].clamp(0.0, 1.0),
                record: index.records[i].clone(),
            })
            .collect();

        debug!(
            query_len = query.len(),
            top_k,
            matches = matches.len(),
            "Semantic search served"
        );

        if matches.is_empty() {
            SearchResults::empty("no related historical tickets found")
        } else {
            SearchResults {
                matches,
                diagnostic: None,
            }
        }
    }

    /// Submit user feedback for a suggested workaround
    pub async fn submit_feedback(&self, feedback: FeedbackRecord) -> Result<FeedbackRecord> {
        if feedback.corrected_workaround.trim().is_empty() {
            return Err(AppError::Validation(
                "corrected workaround must not be empty".to_string(),
            ));
        }

        self.feedback_store.submit(&feedback).await?;
        Ok(feedback)
    }

    /// Engine status snapshot
    pub async fn status(&self) -> EngineStatus {
        let index = self.current_index();
        let staging = self.staging.lock().await;

        EngineStatus {
            indexed_records: index.len(),
            dimension: index.vectorizer.dimension(),
            indexed_at: index.indexed_at,
            pending_staged: staging.len(),
            upload_count: staging.upload_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::InMemoryFeedbackStore;
    use crate::models::{Priority, TicketStatus};
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config
    }

    fn test_engine(dir: &TempDir) -> RetrievalEngine {
        RetrievalEngine::new(
            &test_config(dir),
            Arc::new(InMemoryFeedbackStore::new()),
            Arc::new(PassthroughAnalyzer),
        )
        .unwrap()
    }

    fn ticket(id: &str, description: &str) -> TicketRecord {
        TicketRecord::new(
            id.to_string(),
            description.to_string(),
            Priority::P2,
            TicketStatus::Open,
        )
    }

    #[tokio::test]
    async fn test_stage_then_merge_builds_index() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR1", "login failure"),
                ticket("SR2", "billing error"),
                ticket("SR3", "login timeout"),
            ])
            .await
            .unwrap();

        let report = engine.merge().await.unwrap();
        assert!(report.rebuilt);
        assert_eq!(report.merged_records, 3);
        assert_eq!(report.total_records, 3);

        let status = engine.status().await;
        assert_eq!(status.indexed_records, 3);
        assert_eq!(status.pending_staged, 0);
    }

    #[tokio::test]
    async fn test_scenario_a_login_query_outranks_billing() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR1", "login failure"),
                ticket("SR2", "billing error"),
                ticket("SR3", "login timeout"),
            ])
            .await
            .unwrap();
        engine.merge().await.unwrap();

        let results = engine.semantic_search("cannot login", 2);
        assert_eq!(results.matches.len(), 2);

        let ids: Vec<&str> = results.matches.iter().map(|m| m.record.id.as_str()).collect();
        assert!(ids.contains(&"SR1"));
        assert!(ids.contains(&"SR3"));
        assert!(!ids.contains(&"SR2"));
    }

    #[tokio::test]
    async fn test_scenario_b_second_merge_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR1", "fiber cut on ring"),
                ticket("SR2", "billing mismatch"),
                ticket("SR3", "port flapping"),
                ticket("SR4", "dns resolution slow"),
                ticket("SR5", "voicemail outage"),
            ])
            .await
            .unwrap();

        let first = engine.merge().await.unwrap();
        assert_eq!(first.total_records, 5);

        let second = engine.merge().await.unwrap();
        assert!(!second.rebuilt);
        assert_eq!(second.total_records, 5);
    }

    #[tokio::test]
    async fn test_scenario_c_feedback_becomes_searchable_record() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR100", "service X unresponsive after upgrade"),
                ticket("SR2", "billing mismatch"),
            ])
            .await
            .unwrap();
        engine.merge().await.unwrap();

        engine
            .submit_feedback(FeedbackRecord::new("SR100", "restart service X", "noc"))
            .await
            .unwrap();

        let report = engine.merge().await.unwrap();
        assert_eq!(report.merged_feedback, 1);
        assert_eq!(report.total_records, 3);

        let index = engine.current_index();
        let corrected = index.find_record("SR100_user_corrected").unwrap();
        assert!(corrected.user_corrected);
        assert_eq!(corrected.resolution.as_deref(), Some("restart service X"));

        let results = engine.semantic_search("service X unresponsive", 3);
        assert!(results
            .matches
            .iter()
            .any(|m| m.record.id == "SR100_user_corrected"));
    }

    #[tokio::test]
    async fn test_restaging_same_ids_is_dedupe_safe() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        let batch = vec![ticket("SR1", "login failure"), ticket("SR2", "billing error")];

        engine.stage_upload(batch.clone()).await.unwrap();
        engine.merge().await.unwrap();

        engine.stage_upload(batch).await.unwrap();
        let report = engine.merge().await.unwrap();

        assert_eq!(report.merged_records, 0);
        assert_eq!(report.skipped_existing, 2);
        assert_eq!(report.total_records, 2);
    }

    #[tokio::test]
    async fn test_conflicting_ids_within_batch_are_both_kept() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR1", "login failure"),
                ticket("SR1", "a completely different description"),
            ])
            .await
            .unwrap();

        let report = engine.merge().await.unwrap();
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.merged_records, 2);
        assert_eq!(report.total_records, 2);
    }

    #[tokio::test]
    async fn test_search_results_are_clamped_and_non_increasing() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine
            .stage_upload(vec![
                ticket("SR1", "login failure on portal"),
                ticket("SR2", "login timeout on portal"),
                ticket("SR3", "billing error"),
            ])
            .await
            .unwrap();
        engine.merge().await.unwrap();

        // top_k above corpus size is clamped
        let results = engine.semantic_search("login portal", 50);
        assert!(results.matches.len() <= 3);

        for pair in results.matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        // top_k of zero is clamped up to one
        let results = engine.semantic_search("login portal", 0);
        assert_eq!(results.matches.len(), 1);
    }

    #[tokio::test]
    async fn test_search_on_empty_index_returns_diagnostic() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        let results = engine.semantic_search("anything", 5);
        assert!(results.matches.is_empty());
        assert!(results.diagnostic.is_some());
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.learning.max_batch_size = 2;

        let engine = RetrievalEngine::new(
            &config,
            Arc::new(InMemoryFeedbackStore::new()),
            Arc::new(PassthroughAnalyzer),
        )
        .unwrap();

        let err = engine
            .stage_upload(vec![
                ticket("SR1", "a"),
                ticket("SR2", "b"),
                ticket("SR3", "c"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);

        let err = engine.stage_upload(Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_staging_survives_restart() {
        let dir = TempDir::new().unwrap();

        {
            let engine = test_engine(&dir);
            engine
                .stage_upload(vec![ticket("SR1", "login failure")])
                .await
                .unwrap();
        }

        let engine = test_engine(&dir);
        let status = engine.status().await;
        assert_eq!(status.pending_staged, 1);

        let report = engine.merge().await.unwrap();
        assert_eq!(report.merged_records, 1);
    }

    #[tokio::test]
    async fn test_index_survives_restart() {
        let dir = TempDir::new().unwrap();

        {
            let engine = test_engine(&dir);
            engine
                .stage_upload(vec![ticket("SR1", "login failure")])
                .await
                .unwrap();
            engine.merge().await.unwrap();
        }

        let engine = test_engine(&dir);
        let status = engine.status().await;
        assert_eq!(status.indexed_records, 1);

        let results = engine.semantic_search("login", 1);
        assert_eq!(results.matches.len(), 1);
        assert_eq!(results.matches[0].record.id, "SR1");
    }
}
