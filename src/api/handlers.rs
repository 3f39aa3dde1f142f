use crate::api::AppState;
use crate::engine::{EngineStatus, MergeReport, SearchResults, StageReport};
use crate::error::Result;
use crate::models::{FeedbackRecord, Priority, TicketRecord, TicketStatus};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Engine status snapshot
pub async fn engine_status(State(state): State<AppState>) -> Result<Json<EngineStatus>> {
    Ok(Json(state.engine.status().await))
}

/// Stage an upload batch for the next learning merge
pub async fn upload_tickets(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<StageReport>> {
    request.validate()?;

    let records: Vec<TicketRecord> = request.records.into_iter().map(Into::into).collect();
    let report = state.engine.stage_upload(records).await?;

    Ok(Json(report))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(nested)]
    pub records: Vec<TicketUploadRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketUploadRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    #[validate(length(min = 1))]
    pub description: String,

    pub resolution: Option<String>,

    pub priority: Priority,

    #[serde(default)]
    pub status: Option<TicketStatus>,

    #[serde(default)]
    pub assigned_group: Option<String>,

    #[serde(default)]
    pub source: Option<String>,
}

impl From<TicketUploadRequest> for TicketRecord {
    fn from(request: TicketUploadRequest) -> Self {
        let mut record = TicketRecord::new(
            request.id,
            request.description,
            request.priority,
            request.status.unwrap_or(TicketStatus::Open),
        );
        record.resolution = request.resolution.filter(|r| !r.trim().is_empty());
        record.assigned_group = request.assigned_group.unwrap_or_default();
        record.source = request.source.unwrap_or_default();
        record
    }
}

/// Rank historical tickets by similarity to the query
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResults>> {
    request.validate()?;

    let results = state.engine.semantic_search(&request.query, request.top_k);
    Ok(Json(results))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1))]
    pub query: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

/// Manually trigger a learning merge
pub async fn trigger_merge(State(state): State<AppState>) -> Result<Json<MergeReport>> {
    let report = state.engine.merge().await?;
    Ok(Json(report))
}

/// Submit a workaround correction
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackSubmission>,
) -> Result<Json<FeedbackAckResponse>> {
    request.validate()?;

    let feedback = FeedbackRecord::new(
        request.ticket_id,
        request.corrected_workaround,
        request.corrected_by,
    );
    let feedback = state.engine.submit_feedback(feedback).await?;

    Ok(Json(FeedbackAckResponse {
        feedback_id: feedback.id,
        ticket_id: feedback.ticket_id,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackSubmission {
    #[validate(length(min = 1, max = 64))]
    pub ticket_id: String,

    #[validate(length(min = 1))]
    pub corrected_workaround: String,

    #[validate(length(min = 1))]
    pub corrected_by: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackAckResponse {
    pub feedback_id: Uuid,
    pub ticket_id: String,
}

/// Mark a correction as helpful
pub async fn feedback_helpful(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.engine.feedback_store().record_helpful(&id).await?;
    Ok(Json(serde_json::json!({ "acknowledged": true })))
}

/// Mark a correction as used
pub async fn feedback_used(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.engine.feedback_store().record_used(&id).await?;
    Ok(Json(serde_json::json!({ "acknowledged": true })))
}
