use crate::error::{AppError, Result};
use crate::index::{HistoricalIndex, TfidfVectorizer, VectorizerConfig, SCHEMA_VERSION};
use crate::models::{Priority, TicketRecord, TicketStatus};
use crate::normalizer;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Result of loading the historical corpus from disk sources
#[derive(Debug)]
pub struct CorpusLoadReport {
    /// Normalized, deduplicated records
    pub records: Vec<TicketRecord>,

    /// Malformed rows skipped across all sources
    pub skipped_rows: usize,

    /// Duplicate rows dropped across all sources
    pub duplicate_rows: usize,

    /// Sources that could not be read at all
    pub failed_sources: Vec<PathBuf>,
}

/// Result of a full index build
#[derive(Debug)]
pub struct BuildOutcome {
    /// The built index
    pub index: HistoricalIndex,

    /// Records dropped because vectorization failed for them
    pub skipped_records: usize,
}

/// Loose row shape accepted from historical export files. Field names
/// follow the tracking-system export; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawTicketRow {
    #[serde(alias = "sr_id", alias = "sr_number", alias = "ticket_id")]
    id: Option<String>,

    #[serde(alias = "summary", alias = "problem_description")]
    description: Option<String>,

    #[serde(alias = "workaround", alias = "resolution_notes")]
    resolution: Option<String>,

    priority: Option<String>,

    status: Option<String>,

    #[serde(alias = "created", alias = "open_date")]
    created_at: Option<DateTime<Utc>>,

    #[serde(alias = "group", alias = "application")]
    assigned_group: Option<String>,

    source: Option<String>,
}

impl RawTicketRow {
    /// Convert into a ticket record; `None` when required fields are
    /// missing or blank.
    fn into_record(self) -> Option<TicketRecord> {
        let id = self.id?.trim().to_string();
        let description = self.description?.trim().to_string();
        if id.is_empty() || description.is_empty() {
            return None;
        }

        let priority = self
            .priority
            .as_deref()
            .and_then(|p| Priority::from_str(p.trim()).ok())
            .unwrap_or(Priority::P3);
        let status = self
            .status
            .as_deref()
            .and_then(|s| TicketStatus::from_str(s.trim()).ok())
            .unwrap_or(TicketStatus::Open);

        let mut record = TicketRecord::new(id, description, priority, status);
        record.resolution = self.resolution.filter(|r| !r.trim().is_empty());
        record.assigned_group = self.assigned_group.unwrap_or_default();
        record.source = self.source.unwrap_or_default();
        if let Some(created_at) = self.created_at {
            record.created_at = created_at;
        }

        Some(record)
    }
}

/// Builds the searchable historical index from ticket corpora
pub struct HistoricalIndexer {
    config: VectorizerConfig,
}

impl HistoricalIndexer {
    /// Create a new indexer
    pub fn new(config: VectorizerConfig) -> Self {
        Self { config }
    }

    /// Load and deduplicate ticket records from one or more JSON sources.
    ///
    /// Malformed rows are skipped and counted. A source that cannot be
    /// read is logged and skipped; only zero readable sources is fatal.
    pub fn load_corpus(&self, sources: &[PathBuf]) -> Result<CorpusLoadReport> {
        if sources.is_empty() {
            return Err(AppError::DataSource(
                "no historical data sources configured".to_string(),
            ));
        }

        let mut records: Vec<TicketRecord> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_fingerprints: HashSet<String> = HashSet::new();
        let mut skipped_rows = 0usize;
        let mut duplicate_rows = 0usize;
        let mut failed_sources: Vec<PathBuf> = Vec::new();

        for source in sources {
            let rows = match Self::read_rows(source) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(source = %source.display(), error = %e, "Skipping unreadable corpus source");
                    failed_sources.push(source.clone());
                    continue;
                }
            };

            let mut source_loaded = 0usize;
            for row in rows {
                let parsed = serde_json::from_value::<RawTicketRow>(row)
                    .ok()
                    .and_then(RawTicketRow::into_record);

                let Some(mut record) = parsed else {
                    skipped_rows += 1;
                    continue;
                };

                record.search_text = normalizer::normalize(&record.raw_text());

                if !seen_ids.insert(record.id.clone())
                    || !seen_fingerprints.insert(record.content_fingerprint())
                {
                    duplicate_rows += 1;
                    continue;
                }

                records.push(record);
                source_loaded += 1;
            }

            debug!(
                source = %source.display(),
                loaded = source_loaded,
                "Corpus source loaded"
            );
        }

        if failed_sources.len() == sources.len() {
            return Err(AppError::DataSource(format!(
                "none of the {} configured sources were readable",
                sources.len()
            )));
        }

        info!(
            records = records.len(),
            skipped_rows,
            duplicate_rows,
            failed_sources = failed_sources.len(),
            "Historical corpus loaded"
        );

        Ok(CorpusLoadReport {
            records,
            skipped_rows,
            duplicate_rows,
            failed_sources,
        })
    }

    fn read_rows(source: &Path) -> Result<Vec<serde_json::Value>> {
        let raw = std::fs::read_to_string(source)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;

        match value {
            serde_json::Value::Array(rows) => Ok(rows),
            other => Err(AppError::DataSource(format!(
                "expected a JSON array of ticket rows, got {}",
                match other {
                    serde_json::Value::Object(_) => "an object",
                    serde_json::Value::String(_) => "a string",
                    _ => "a scalar",
                }
            ))),
        }
    }

    /// Build a fresh index over the full record list (full re-fit).
    ///
    /// Records whose text cannot be vectorized are skipped and counted,
    /// never fatal. N surviving records yield exactly N matrix rows.
    pub fn build_index(&self, records: Vec<TicketRecord>) -> Result<BuildOutcome> {
        let mut records = records;

        // Normalize any record that arrived without cached search text
        for record in &mut records {
            if record.search_text.is_empty() {
                record.search_text = normalizer::normalize(&record.raw_text());
            }
        }

        let documents: Vec<String> = records.iter().map(|r| r.search_text.clone()).collect();

        let mut vectorizer = TfidfVectorizer::new(self.config.clone());
        vectorizer.fit(&documents)?;

        let mut kept_records = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        let mut skipped_records = 0usize;

        for (record, document) in records.into_iter().zip(documents.iter()) {
            match vectorizer.transform(document) {
                Ok(vector) => {
                    rows.push(vector);
                    kept_records.push(record);
                }
                Err(e) => {
                    warn!(ticket_id = %record.id, error = %e, "Skipping unvectorizable record");
                    skipped_records += 1;
                }
            }
        }

        let dimension = vectorizer.dimension();
        let mut matrix = Array2::zeros((rows.len(), dimension));
        for (i, row) in rows.iter().enumerate() {
            matrix.row_mut(i).assign(row);
        }

        let index = HistoricalIndex {
            schema_version: SCHEMA_VERSION,
            vectorizer,
            matrix,
            records: kept_records,
            indexed_at: Utc::now(),
        };
        index.validate()?;

        info!(
            records = index.len(),
            dimension,
            skipped_records,
            "Historical index built"
        );

        Ok(BuildOutcome {
            index,
            skipped_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn indexer() -> HistoricalIndexer {
        HistoricalIndexer::new(VectorizerConfig::default())
    }

    #[test]
    fn test_load_corpus_parses_and_normalizes() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            "history.json",
            r#"[
                {"id": "SR1", "description": "Customer: Acme; login failure", "priority": "P1", "status": "Resolved"},
                {"id": "SR2", "description": "billing error", "priority": "P3"}
            ]"#,
        );

        let report = indexer().load_corpus(&[source]).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped_rows, 0);
        assert!(!report.records[0].search_text.contains("Acme"));
        assert_eq!(report.records[0].priority, Priority::P1);
        assert_eq!(report.records[1].status, TicketStatus::Open);
    }

    #[test]
    fn test_load_corpus_skips_malformed_rows() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            "history.json",
            r#"[
                {"id": "SR1", "description": "login failure"},
                {"description": "missing id"},
                {"id": "SR3"},
                {"id": "  ", "description": "blank id"},
                42
            ]"#,
        );

        let report = indexer().load_corpus(&[source]).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped_rows, 4);
    }

    #[test]
    fn test_load_corpus_deduplicates_by_id() {
        let dir = TempDir::new().unwrap();
        let a = write_source(
            &dir,
            "a.json",
            r#"[{"id": "SR1", "description": "login failure"}]"#,
        );
        let b = write_source(
            &dir,
            "b.json",
            r#"[{"id": "SR1", "description": "login failure again"},
                {"id": "SR2", "description": "billing error"}]"#,
        );

        let report = indexer().load_corpus(&[a, b]).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.duplicate_rows, 1);
    }

    #[test]
    fn test_load_corpus_tolerates_one_bad_source() {
        let dir = TempDir::new().unwrap();
        let good = write_source(
            &dir,
            "good.json",
            r#"[{"id": "SR1", "description": "login failure"}]"#,
        );
        let missing = dir.path().join("missing.json");

        let report = indexer().load_corpus(&[missing.clone(), good]).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.failed_sources, vec![missing]);
    }

    #[test]
    fn test_load_corpus_fails_when_no_source_readable() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");

        let err = indexer().load_corpus(&[missing]).unwrap_err();
        assert!(matches!(err, AppError::DataSource(_)));

        let err = indexer().load_corpus(&[]).unwrap_err();
        assert!(matches!(err, AppError::DataSource(_)));
    }

    #[test]
    fn test_build_index_row_count_matches_records() {
        let records: Vec<TicketRecord> = [
            ("SR1", "login failure"),
            ("SR2", "billing error"),
            ("SR3", "login timeout"),
        ]
        .iter()
        .map(|(id, text)| {
            TicketRecord::new(
                id.to_string(),
                text.to_string(),
                Priority::P2,
                TicketStatus::Open,
            )
        })
        .collect();

        let outcome = indexer().build_index(records).unwrap();
        assert_eq!(outcome.index.len(), 3);
        assert_eq!(outcome.index.matrix.nrows(), 3);
        assert_eq!(outcome.skipped_records, 0);
        assert!(outcome.index.validate().is_ok());
    }

    #[test]
    fn test_build_index_on_empty_corpus() {
        let outcome = indexer().build_index(Vec::new()).unwrap();
        assert!(outcome.index.is_empty());
        assert_eq!(outcome.index.matrix.nrows(), 0);
    }
}
