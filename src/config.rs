use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage paths and retention
    pub storage: StorageConfig,

    /// Vectorizer / index build configuration
    pub indexing: IndexingConfig,

    /// Continuous-learning merge configuration
    pub learning: LearningConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SR_RETRIEVAL_)
            .add_source(
                config::Environment::with_prefix("SR_RETRIEVAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            indexing: IndexingConfig::default(),
            learning: LearningConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all persisted state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of timestamped index backups to retain
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
}

impl StorageConfig {
    /// Path of the persisted historical index blob
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("historical_index.bin")
    }

    /// Path of the staging area file
    pub fn staging_path(&self) -> PathBuf {
        self.data_dir.join("staging.json")
    }

    /// Path of the embedded feedback database
    pub fn feedback_db_path(&self) -> PathBuf {
        self.data_dir.join("feedback.sled")
    }

    /// Directory holding timestamped index backups
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_retention: default_backup_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Maximum vocabulary size for text features
    #[serde(default = "default_max_vocab_size")]
    pub max_vocab_size: usize,

    /// Minimum document frequency for terms
    #[serde(default = "default_min_doc_freq")]
    pub min_doc_freq: usize,

    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_vocab_size: default_max_vocab_size(),
            min_doc_freq: default_min_doc_freq(),
            ngram_range: default_ngram_range(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Enable the scheduled merge job
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression for the recurring merge (seconds-resolution cron)
    #[serde(default = "default_merge_schedule")]
    pub merge_schedule: String,

    /// Maximum records accepted in a single upload batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merge_schedule: default_merge_schedule(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { json_logs: false }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_backup_retention() -> usize {
    5
}

fn default_max_vocab_size() -> usize {
    5000
}

fn default_min_doc_freq() -> usize {
    1
}

fn default_ngram_range() -> (usize, usize) {
    (1, 2)
}

fn default_true() -> bool {
    true
}

fn default_merge_schedule() -> String {
    // Every day at 02:00
    "0 0 2 * * *".to_string()
}

fn default_max_batch_size() -> usize {
    5000
}
