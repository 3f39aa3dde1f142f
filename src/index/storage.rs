use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::index::{HistoricalIndex, VectorizerConfig};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Persists the historical index as a single bincode blob.
///
/// Writes go to a temp file in the destination directory, are fsynced,
/// then renamed over the target, so a crash mid-write never corrupts the
/// previously valid index. The previous blob is copied to a timestamped
/// backup before each overwrite.
pub struct IndexStorage {
    index_path: PathBuf,
    backups_dir: PathBuf,
    backup_retention: usize,
}

impl IndexStorage {
    /// Create storage rooted at the configured data directory
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            index_path: storage.index_path(),
            backups_dir: storage.backups_dir(),
            backup_retention: storage.backup_retention,
        }
    }

    /// Whether an index blob exists on disk
    pub fn exists(&self) -> bool {
        self.index_path.exists()
    }

    /// Path of the persisted index blob
    pub fn index_path(&self) -> &PathBuf {
        &self.index_path
    }

    /// Atomically persist the full index structure
    pub fn save(&self, index: &HistoricalIndex) -> Result<()> {
        index.validate()?;

        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = bincode::serialize(index)
            .map_err(|e| AppError::Serialization(format!("failed to serialize index: {}", e)))?;

        let tmp_path = self.index_path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.index_path)?;

        info!(
            path = %self.index_path.display(),
            records = index.len(),
            bytes = bytes.len(),
            "Historical index persisted"
        );

        Ok(())
    }

    /// Load and validate the persisted index.
    ///
    /// A missing file is `NotFound`; an unreadable or malformed blob is
    /// `IndexCorrupt`.
    pub fn load(&self) -> Result<HistoricalIndex> {
        if !self.index_path.exists() {
            return Err(AppError::NotFound(format!(
                "no index at {}",
                self.index_path.display()
            )));
        }

        let bytes = fs::read(&self.index_path)?;
        let index: HistoricalIndex = bincode::deserialize(&bytes)
            .map_err(|e| AppError::IndexCorrupt(format!("failed to deserialize index: {}", e)))?;
        index.validate()?;

        Ok(index)
    }

    /// Load the index, falling back to the newest readable backup, else
    /// an empty index. Never fails on corruption.
    pub fn load_or_recover(&self, config: VectorizerConfig) -> HistoricalIndex {
        match self.load() {
            Ok(index) => index,
            Err(AppError::NotFound(_)) => {
                info!("No persisted index found, starting empty");
                HistoricalIndex::empty(config)
            }
            Err(e) => {
                warn!(error = %e, "Persisted index unreadable, trying backups");
                self.recover_from_backups()
                    .unwrap_or_else(|| HistoricalIndex::empty(config))
            }
        }
    }

    /// Copy the current index blob to a timestamped backup and prune old
    /// ones. Returns the backup path, or `None` when there is nothing to
    /// back up yet.
    pub fn backup_current(&self) -> Result<Option<PathBuf>> {
        if !self.index_path.exists() {
            return Ok(None);
        }

        fs::create_dir_all(&self.backups_dir)?;

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        let backup_path = self
            .backups_dir
            .join(format!("historical_index.{}.bak", stamp));
        fs::copy(&self.index_path, &backup_path)?;

        info!(backup = %backup_path.display(), "Index backup written");

        self.prune_backups();

        Ok(Some(backup_path))
    }

    fn recover_from_backups(&self) -> Option<HistoricalIndex> {
        for path in self.backup_paths_newest_first() {
            match fs::read(&path)
                .ok()
                .and_then(|bytes| bincode::deserialize::<HistoricalIndex>(&bytes).ok())
            {
                Some(index) if index.validate().is_ok() => {
                    warn!(
                        backup = %path.display(),
                        records = index.len(),
                        "Recovered index from backup"
                    );
                    return Some(index);
                }
                _ => {
                    warn!(backup = %path.display(), "Backup unreadable, trying next");
                }
            }
        }

        warn!("No readable backup found, starting empty");
        None
    }

    fn backup_paths_newest_first(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.backups_dir) else {
            return Vec::new();
        };

        // Backup names embed a sortable UTC timestamp
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "bak").unwrap_or(false))
            .collect();
        paths.sort();
        paths.reverse();
        paths
    }

    fn prune_backups(&self) {
        let paths = self.backup_paths_newest_first();
        for stale in paths.iter().skip(self.backup_retention) {
            if let Err(e) = fs::remove_file(stale) {
                warn!(backup = %stale.display(), error = %e, "Failed to prune backup");
            }
        }
    }
}
