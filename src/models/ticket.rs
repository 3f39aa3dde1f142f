use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Represents a service request (SR) ticket
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TicketRecord {
    /// Unique ticket identifier (SR number)
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Free-text problem description
    #[validate(length(min = 1))]
    pub description: String,

    /// Free-text resolution / workaround notes
    #[serde(default)]
    pub resolution: Option<String>,

    /// Ordinal priority
    pub priority: Priority,

    /// Current status
    pub status: TicketStatus,

    /// Creation timestamp
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,

    /// Assigned group / application
    #[serde(default)]
    pub assigned_group: String,

    /// Originating system label
    #[serde(default)]
    pub source: String,

    /// Set on synthetic records produced from user feedback
    #[serde(default)]
    pub user_corrected: bool,

    /// Cached normalized text used for vectorization
    #[serde(default)]
    pub search_text: String,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl TicketRecord {
    /// Create a new ticket record
    pub fn new(
        id: String,
        description: String,
        priority: Priority,
        status: TicketStatus,
    ) -> Self {
        Self {
            id,
            description,
            resolution: None,
            priority,
            status,
            created_at: Utc::now(),
            assigned_group: String::new(),
            source: String::new(),
            user_corrected: false,
            search_text: String::new(),
        }
    }

    /// Set resolution notes
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Set assigned group
    pub fn with_assigned_group(mut self, group: impl Into<String>) -> Self {
        self.assigned_group = group.into();
        self
    }

    /// Set originating system label
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Whether the ticket carries a usable workaround
    pub fn has_workaround(&self) -> bool {
        self.resolution
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false)
    }

    /// Raw text fed to the normalizer: description plus resolution notes
    pub fn raw_text(&self) -> String {
        match self.resolution.as_deref() {
            Some(resolution) if !resolution.trim().is_empty() => {
                format!("{} {}", self.description, resolution)
            }
            _ => self.description.clone(),
        }
    }

    /// Generate a content fingerprint for deduplication
    pub fn content_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.description.as_bytes());
        if let Some(ref resolution) = self.resolution {
            hasher.update(resolution.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, EnumString, Display,
)]
pub enum Priority {
    P0, // Critical - immediate action
    P1, // High - < 1 hour
    P2, // Medium - < 24 hours
    P3, // Low - < 1 week
    P4, // Informational
}

impl Priority {
    /// Get numeric priority (lower is more urgent)
    pub fn rank(&self) -> u8 {
        match self {
            Priority::P0 => 0,
            Priority::P1 => 1,
            Priority::P2 => 2,
            Priority::P3 => 3,
            Priority::P4 => 4,
        }
    }

    /// Check if priority requires immediate attention
    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::P0 | Priority::P1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum TicketStatus {
    Open,
    Resolved,
}

impl TicketStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, TicketStatus::Resolved)
    }
}

/// A scored search hit returned by semantic search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMatch {
    /// Cosine similarity in [0.0, 1.0]
    pub score: f64,

    /// The matched historical ticket
    pub record: TicketRecord,
}
