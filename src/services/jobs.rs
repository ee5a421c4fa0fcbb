// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background sync jobs.
//!
//! A job moves PENDING -> RUNNING -> DONE | ERROR. While running it imports
//! activities, recomputes every persisted window for runs and rides, and
//! optionally sweeps run streams for exact all-time records. Progress from
//! each phase is written to the job row as it arrives.

use crate::analytics::{rolling_range, window_range};
use crate::config::SyncSettings;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{JobStatus, SportType, SyncJob, WindowType};
use crate::services::progress::{ProgressReporter, SyncProgress};
use crate::services::records::{RecordsService, PHASE_ALL_TIME};
use crate::services::strava::ActivitySource;
use crate::services::sync::{SyncOptions, SyncOrchestrator};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

pub const PHASE_STARTING: &str = "Starting";
pub const PHASE_RECORDS: &str = "Computing records";
pub const PHASE_COMPLETE: &str = "Complete";
pub const PHASE_ERROR: &str = "Error";

/// Length of the supplementary rolling week recomputed alongside WEEK.
const ROLLING_WEEK_DAYS: u32 = 7;
const RECORD_SPORTS: [SportType; 2] = [SportType::Run, SportType::Ride];

/// Parameters of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub job_id: String,
    pub athlete_id: u64,
    pub full: bool,
    pub details: bool,
    pub streams: bool,
}

#[derive(Clone)]
pub struct SyncJobRunner {
    store: Arc<dyn Store>,
    orchestrator: SyncOrchestrator,
    records: RecordsService,
    settings: SyncSettings,
}

impl SyncJobRunner {
    pub fn new(store: Arc<dyn Store>, api: Arc<dyn ActivitySource>, settings: SyncSettings) -> Self {
        Self {
            orchestrator: SyncOrchestrator::new(store.clone(), api.clone(), settings),
            records: RecordsService::new(store.clone(), api, settings),
            store,
            settings,
        }
    }

    pub fn records(&self) -> &RecordsService {
        &self.records
    }

    /// Create and persist a PENDING job.
    pub async fn enqueue(&self, athlete_id: u64) -> Result<SyncJob, AppError> {
        let job = SyncJob::queued(athlete_id, Utc::now());
        self.store.put_sync_job(&job).await?;
        tracing::info!(job_id = %job.id, athlete_id, "Sync job queued");
        Ok(job)
    }

    /// Run a job in the background. The outcome is recorded on the job row.
    pub fn spawn(&self, request: JobRequest) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let job_id = request.job_id.clone();
            if let Err(e) = runner.run_sync_job(request).await {
                tracing::error!(job_id = %job_id, error = %e, "Sync job could not be recorded");
            }
        })
    }

    /// Drive a queued job to a terminal state.
    ///
    /// Failures inside the job mark it ERROR and are not returned; `Err` means
    /// the job row itself could not be loaded or written.
    pub async fn run_sync_job(&self, request: JobRequest) -> Result<SyncJob, AppError> {
        let mut job = self
            .store
            .get_sync_job(&request.job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sync job {}", request.job_id)))?;

        let now = Utc::now();
        job.status = JobStatus::Running;
        job.phase = PHASE_STARTING.to_string();
        job.started_at = Some(now);
        job.updated_at = now;
        self.store.put_sync_job(&job).await?;

        tracing::info!(
            job_id = %job.id,
            athlete_id = request.athlete_id,
            full = request.full,
            details = request.details,
            streams = request.streams,
            "Sync job started"
        );

        let outcome = self.execute(&request, &mut job).await;

        let now = Utc::now();
        job.finished_at = Some(now);
        job.updated_at = now;
        match outcome {
            Ok(()) => {
                job.status = JobStatus::Done;
                job.phase = PHASE_COMPLETE.to_string();
                tracing::info!(
                    job_id = %job.id,
                    athlete_id = request.athlete_id,
                    detail_fetched = job.detail_fetched,
                    "Sync job complete"
                );
            }
            Err(e) => {
                job.status = JobStatus::Error;
                job.phase = PHASE_ERROR.to_string();
                job.error_message = Some(failure_message(&e));
                tracing::error!(
                    job_id = %job.id,
                    athlete_id = request.athlete_id,
                    rate_limited = e.is_rate_limited(),
                    token_error = e.is_strava_token_error(),
                    error = %e,
                    "Sync job failed"
                );
            }
        }

        self.store.put_sync_job(&job).await?;
        Ok(job)
    }

    async fn execute(&self, request: &JobRequest, job: &mut SyncJob) -> Result<(), AppError> {
        let athlete_id = request.athlete_id;
        if self.store.get_user(athlete_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let options = SyncOptions {
            full: request.full,
            details: request.details,
            max_detail: None,
        };
        let orchestrator = &self.orchestrator;
        let synced = self
            .with_progress(job, |reporter| async move {
                orchestrator
                    .sync_activities(athlete_id, options, &reporter)
                    .await
            })
            .await?;
        job.detail_fetched = synced.detail_fetched;

        self.recompute_windows(athlete_id, job).await?;

        if request.streams {
            job.phase = PHASE_ALL_TIME.to_string();
            job.processed_steps = 0;
            job.total_steps = None;
            self.write_progress(job).await;

            let tokens = self.orchestrator.ensure_fresh_token(athlete_id).await?;
            let records = &self.records;
            self.with_progress(job, |reporter| async move {
                records
                    .compute_all_time_from_streams(athlete_id, &tokens.access_token, &reporter)
                    .await
            })
            .await?;
        }

        Ok(())
    }

    /// Recompute every persisted window for runs and rides, plus the
    /// rolling week.
    async fn recompute_windows(&self, athlete_id: u64, job: &mut SyncJob) -> Result<(), AppError> {
        let now = Utc::now();
        let mut windows: Vec<_> = WindowType::ALL
            .into_iter()
            .filter(WindowType::uses_persisted_summary)
            .map(|w| (w, window_range(w, now, self.settings.tz_offset_minutes)))
            .collect();
        windows.push((WindowType::Week, rolling_range(ROLLING_WEEK_DAYS, now)));

        job.phase = PHASE_RECORDS.to_string();
        job.processed_steps = 0;
        job.total_steps = u32::try_from(windows.len() * RECORD_SPORTS.len()).ok();
        self.write_progress(job).await;

        for (window_type, range) in &windows {
            for sport in RECORD_SPORTS {
                self.records
                    .recompute_window(athlete_id, *window_type, range, sport)
                    .await?;
                job.processed_steps += 1;
                self.write_progress(job).await;
            }
        }
        Ok(())
    }

    /// Run `work` with a connected reporter, writing each update to the job
    /// row until the work finishes and drops its reporter.
    async fn with_progress<F, Fut, T>(&self, job: &mut SyncJob, work: F) -> Result<T, AppError>
    where
        F: FnOnce(ProgressReporter) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let (reporter, rx) = ProgressReporter::channel();
        let (result, ()) = tokio::join!(work(reporter), self.forward_progress(job, rx));
        result
    }

    async fn forward_progress(&self, job: &mut SyncJob, mut rx: UnboundedReceiver<SyncProgress>) {
        while let Some(progress) = rx.recv().await {
            apply_progress(job, progress);
            self.write_progress(job).await;
        }
    }

    async fn write_progress(&self, job: &mut SyncJob) {
        job.updated_at = Utc::now();
        if let Err(e) = self.store.put_sync_job(job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to write job progress");
        }
    }
}

/// Job error text, with the user's next step for Strava auth and quota failures.
fn failure_message(error: &AppError) -> String {
    if error.is_rate_limited() {
        format!("{error}. Strava limits requests per 15 minutes; try again later")
    } else if error.is_strava_token_error() {
        format!("{error}. Reconnect Strava to resume syncing")
    } else {
        error.to_string()
    }
}

fn apply_progress(job: &mut SyncJob, progress: SyncProgress) {
    job.phase = progress.phase;
    job.processed_steps = progress.processed_steps;
    job.total_steps = progress.total_steps;
    if progress.total_activities.is_some() {
        job.total_activities = progress.total_activities;
    }
    job.detail_fetched = job.detail_fetched.max(progress.detail_fetched);
}
