use crate::models::{Priority, TicketRecord, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Suffix appended to a ticket id when feedback is folded into the corpus
pub const USER_CORRECTED_SUFFIX: &str = "_user_corrected";

/// A user correction to a suggested workaround
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Id of the ticket the correction applies to
    pub ticket_id: String,

    /// Corrected workaround text supplied by the user
    pub corrected_workaround: String,

    /// Identity of the corrector
    pub corrected_by: String,

    /// Times the correction was marked helpful
    pub helpful_count: u32,

    /// Times the correction was applied
    pub used_count: u32,

    /// Set once the learning merge has folded this record into the index
    pub consumed: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Create a new feedback record
    pub fn new(
        ticket_id: impl Into<String>,
        corrected_workaround: impl Into<String>,
        corrected_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id: ticket_id.into(),
            corrected_workaround: corrected_workaround.into(),
            corrected_by: corrected_by.into(),
            helpful_count: 0,
            used_count: 0,
            consumed: false,
            created_at: Utc::now(),
        }
    }

    /// Id the synthetic corpus record will carry
    pub fn corrected_record_id(&self) -> String {
        format!("{}{}", self.ticket_id, USER_CORRECTED_SUFFIX)
    }

    /// Convert into a synthetic read-only ticket record for indexing.
    ///
    /// The original ticket's description is carried over when available so
    /// the correction stays retrievable by the same query text.
    pub fn to_ticket_record(&self, original: Option<&TicketRecord>) -> TicketRecord {
        let description = original
            .map(|t| t.description.clone())
            .unwrap_or_else(|| self.corrected_workaround.clone());
        let priority = original.map(|t| t.priority).unwrap_or(Priority::P3);

        let mut record = TicketRecord::new(
            self.corrected_record_id(),
            description,
            priority,
            TicketStatus::Resolved,
        )
        .with_resolution(self.corrected_workaround.clone())
        .with_source("user_feedback");
        record.user_corrected = true;
        record.created_at = self.created_at;

        if let Some(original) = original {
            record.assigned_group = original.assigned_group.clone();
        }

        record
    }
}
