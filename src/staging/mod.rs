//! Staging area for newly uploaded, not-yet-merged tickets.

use crate::error::{AppError, Result};
use crate::models::TicketRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Pending records awaiting the next learning merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingArea {
    /// Records staged since the last merge
    pub records: Vec<TicketRecord>,

    /// Total uploads accepted since the staging file was created
    pub upload_count: u64,

    /// Last time the staging area changed
    pub last_updated: DateTime<Utc>,
}

impl StagingArea {
    /// Create an empty staging area
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            upload_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Append an upload batch and bump the counter
    pub fn append(&mut self, records: Vec<TicketRecord>) {
        self.records.extend(records);
        self.upload_count += 1;
        self.last_updated = Utc::now();
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Persists the staging area as a JSON file with atomic replacement
pub struct StagingStore {
    path: PathBuf,
}

impl StagingStore {
    /// Create a store backed by the given file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the staging area; a missing file yields an empty area, a
    /// malformed file is reset to empty (staged data is re-uploadable,
    /// the historical index is not).
    pub fn load(&self) -> StagingArea {
        if !self.path.exists() {
            return StagingArea::empty();
        }

        match fs::read_to_string(&self.path)
            .map_err(AppError::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(AppError::from))
        {
            Ok(area) => area,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Staging file unreadable, resetting");
                StagingArea::empty()
            }
        }
    }

    /// Atomically persist the staging area
    pub fn save(&self, area: &StagingArea) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(area)?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            pending = area.len(),
            upload_count = area.upload_count,
            "Staging area persisted"
        );

        Ok(())
    }

    /// Persist an empty staging area (post-merge)
    pub fn clear(&self) -> Result<()> {
        self.save(&StagingArea::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TicketStatus};
    use tempfile::TempDir;

    fn ticket(id: &str) -> TicketRecord {
        TicketRecord::new(
            id.to_string(),
            format!("description for {}", id),
            Priority::P2,
            TicketStatus::Open,
        )
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path().join("staging.json"));

        let area = store.load();
        assert!(area.is_empty());
        assert_eq!(area.upload_count, 0);
    }

    #[test]
    fn test_append_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path().join("staging.json"));

        let mut area = store.load();
        area.append(vec![ticket("SR1"), ticket("SR2")]);
        area.append(vec![ticket("SR3")]);
        store.save(&area).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.upload_count, 2);
    }

    #[test]
    fn test_clear_persists_empty_area() {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path().join("staging.json"));

        let mut area = store.load();
        area.append(vec![ticket("SR1")]);
        store.save(&area).unwrap();

        store.clear().unwrap();

        let loaded = store.load();
        assert!(loaded.is_empty());
        assert_eq!(loaded.upload_count, 0);
    }

    #[test]
    fn test_malformed_file_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staging.json");
        fs::write(&path, "{not json").unwrap();

        let area = StagingStore::new(path).load();
        assert!(area.is_empty());
    }
}
