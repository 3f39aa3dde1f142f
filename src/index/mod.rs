//! Historical index: fitted vectorizer, vector matrix and ticket
//! metadata, persisted as a single atomic unit.

pub mod builder;
pub mod storage;
pub mod vectorizer;

pub use builder::{BuildOutcome, CorpusLoadReport, HistoricalIndexer};
pub use storage::IndexStorage;
pub use vectorizer::{TfidfVectorizer, VectorizerConfig};

use crate::error::{AppError, Result};
use crate::models::TicketRecord;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current persisted index schema version
pub const SCHEMA_VERSION: u32 = 2;

/// The persisted aggregate: fitted vectorizer, vector matrix, record
/// metadata and a last-indexed timestamp.
///
/// Invariant: `matrix.nrows() == records.len()`. The structure is only
/// ever replaced wholesale, never partially mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalIndex {
    /// Persisted schema version
    pub schema_version: u32,

    /// Fitted vectorizer
    pub vectorizer: TfidfVectorizer,

    /// One L2-normalized row per record
    pub matrix: Array2<f64>,

    /// Ordered record metadata, row i describes matrix row i
    pub records: Vec<TicketRecord>,

    /// When the index was built
    pub indexed_at: DateTime<Utc>,
}

impl HistoricalIndex {
    /// Create an empty index with an unfitted vectorizer
    pub fn empty(config: VectorizerConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            vectorizer: TfidfVectorizer::new(config),
            matrix: Array2::zeros((0, 0)),
            records: Vec::new(),
            indexed_at: Utc::now(),
        }
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Set of indexed record ids
    pub fn id_set(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Look up a record by id
    pub fn find_record(&self, id: &str) -> Option<&TicketRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Check the row-count invariant
    pub fn validate(&self) -> Result<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(AppError::IndexCorrupt(format!(
                "unsupported schema version {} (supported up to {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }

        if self.matrix.nrows() != self.records.len() {
            return Err(AppError::IndexCorrupt(format!(
                "matrix has {} rows but metadata lists {} records",
                self.matrix.nrows(),
                self.records.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TicketStatus};

    #[test]
    fn test_empty_index() {
        let index = HistoricalIndex::empty(VectorizerConfig::default());
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_row_mismatch() {
        let mut index = HistoricalIndex::empty(VectorizerConfig::default());
        index.records.push(TicketRecord::new(
            "SR1".to_string(),
            "login failure".to_string(),
            Priority::P2,
            TicketStatus::Open,
        ));

        let err = index.validate().unwrap_err();
        assert!(matches!(err, AppError::IndexCorrupt(_)));
    }

    #[test]
    fn test_validate_rejects_future_schema() {
        let mut index = HistoricalIndex::empty(VectorizerConfig::default());
        index.schema_version = SCHEMA_VERSION + 1;

        let err = index.validate().unwrap_err();
        assert!(matches!(err, AppError::IndexCorrupt(_)));
    }
}
