use crate::error::Result;
use crate::models::TicketRecord;
use async_trait::async_trait;

/// A ticket enriched by the upstream batch analyzer
#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    /// The (possibly adjusted) ticket
    pub record: TicketRecord,

    /// Suggested owning group / application
    pub classification: Option<String>,

    /// Suggested workaround text
    pub suggested_workaround: Option<String>,

    /// Analyzer confidence in [0.0, 1.0]
    pub confidence: f64,
}

/// Opaque upstream collaborator that enriches uploaded tickets.
///
/// The engine only depends on this contract; the real analyzer lives
/// outside this subsystem.
#[async_trait]
pub trait BatchAnalyzer: Send + Sync {
    async fn analyze(&self, record: TicketRecord) -> Result<EnrichedRecord>;
}

/// Default analyzer that passes records through unchanged
pub struct PassthroughAnalyzer;

#[async_trait]
impl BatchAnalyzer for PassthroughAnalyzer {
    async fn analyze(&self, record: TicketRecord) -> Result<EnrichedRecord> {
        Ok(EnrichedRecord {
            record,
            classification: None,
            suggested_workaround: None,
            confidence: 0.0,
        })
    }
}
