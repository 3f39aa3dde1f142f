//! Recurring learning-merge scheduling.

use crate::config::LearningConfig;
use crate::engine::RetrievalEngine;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Execution statistics for a scheduled job
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    /// Job identifier
    pub id: Uuid,

    /// Human-readable job name
    pub name: String,

    /// Cron expression
    pub schedule: String,

    /// Number of times the job has run
    pub run_count: u64,

    /// Number of successful runs
    pub success_count: u64,

    /// Number of failed runs
    pub failure_count: u64,

    /// When the job last ran
    pub last_run: Option<DateTime<Utc>>,
}

impl JobStats {
    fn new(id: Uuid, name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            schedule: schedule.into(),
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            last_run: None,
        }
    }

    fn record_run(&mut self, success: bool) {
        self.run_count += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.last_run = Some(Utc::now());
    }
}

/// Drives the recurring learning merge on a cron schedule
pub struct MergeScheduler {
    config: LearningConfig,
    scheduler: JobScheduler,
    jobs: Arc<DashMap<Uuid, JobStats>>,
}

impl MergeScheduler {
    /// Create a new scheduler
    pub async fn new(config: LearningConfig) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("failed to create scheduler: {}", e)))?;

        Ok(Self {
            config,
            scheduler,
            jobs: Arc::new(DashMap::new()),
        })
    }

    /// Register the recurring merge job against the engine
    pub async fn register_merge_job(&self, engine: Arc<RetrievalEngine>) -> Result<Uuid> {
        let schedule = self.config.merge_schedule.clone();
        let job_id = Uuid::new_v4();

        self.jobs
            .insert(job_id, JobStats::new(job_id, "learning-merge", &schedule));

        let jobs = self.jobs.clone();
        let cron_job =
            tokio_cron_scheduler::Job::new_async(schedule.as_str(), move |_uuid, _lock| {
                let engine = engine.clone();
                let jobs = jobs.clone();
                Box::pin(async move {
                    let start = std::time::Instant::now();
                    let result = engine.merge().await;
                    let duration = start.elapsed();

                    let success = result.is_ok();
                    if let Some(mut stats) = jobs.get_mut(&job_id) {
                        stats.record_run(success);
                    }

                    match result {
                        Ok(report) => {
                            info!(
                                merged_records = report.merged_records,
                                merged_feedback = report.merged_feedback,
                                total_records = report.total_records,
                                duration_ms = duration.as_millis(),
                                "Scheduled merge completed"
                            );
                        }
                        Err(e) => {
                            // Staged data is untouched on failure; the next
                            // scheduled run retries
                            error!(
                                error = %e,
                                duration_ms = duration.as_millis(),
                                "Scheduled merge failed"
                            );
                        }
                    }
                })
            })
            .map_err(|e| AppError::Scheduler(format!("invalid merge schedule: {}", e)))?;

        self.scheduler
            .add(cron_job)
            .await
            .map_err(|e| AppError::Scheduler(format!("failed to add merge job: {}", e)))?;

        info!(job_id = %job_id, schedule = %self.config.merge_schedule, "Merge job registered");

        Ok(job_id)
    }

    /// Start the scheduler
    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            warn!("Learning merge scheduler is disabled in configuration");
            return Ok(());
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("failed to start scheduler: {}", e)))?;

        info!("Merge scheduler started");
        Ok(())
    }

    /// Stop the scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("failed to shut down scheduler: {}", e)))?;

        info!("Merge scheduler shut down");
        Ok(())
    }

    /// Snapshot of all job statistics
    pub fn job_stats(&self) -> Vec<JobStats> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }
}
