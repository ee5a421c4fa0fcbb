// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity sync from Strava.
//!
//! Handles:
//! - Token refresh before any API call (at most once per sync)
//! - Fetch range selection: full history, or an overlapping incremental
//!   window plus one backfill page of older history
//! - Activity upserts and budgeted best-effort detail fetches for runs
//! - Progress reporting

use crate::config::SyncSettings;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{EffortCacheEntry, SportType, UserTokens};
use crate::services::pacing::RequestPacer;
use crate::services::progress::{ProgressReporter, SyncProgress};
use crate::services::strava::{ActivityQuery, ActivitySource, StravaActivitySummary};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Refresh the access token if it expires within this margin.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
/// Incremental syncs re-read this much history to pick up edits.
const INCREMENTAL_OVERLAP_DAYS: i64 = 14;
const PER_PAGE: u32 = 100;
/// Progress is reported each time this many more steps complete.
const PROGRESS_INTERVAL: u32 = 20;

pub const PHASE_FETCHING: &str = "Fetching activities";
pub const PHASE_FETCHING_DETAILS: &str = "Fetching activities + best efforts";
pub const PHASE_FINISHING: &str = "Finishing";

/// Per-athlete locks serializing token refreshes across concurrent jobs.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Options for one sync invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Fetch the full history instead of the incremental window.
    pub full: bool,
    /// Fetch best-effort details for every run without a budget.
    pub details: bool,
    /// Detail fetch budget; defaults depend on `full`.
    pub max_detail: Option<u32>,
}

/// Counts returned from a completed sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub total_upserted: u32,
    pub detail_fetched: u32,
}

/// Time range requested from the activity list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub after: i64,
    pub before: Option<i64>,
    /// Start of known history; one extra page older than this is fetched.
    pub backfill_before: Option<i64>,
}

impl FetchPlan {
    /// `bounds` are the earliest and latest stored activity start dates.
    pub fn new(
        full: bool,
        bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Self {
        if full {
            return Self {
                after: 0,
                before: Some(now.timestamp()),
                backfill_before: None,
            };
        }
        match bounds {
            Some((earliest, latest)) => Self {
                after: (latest - Duration::days(INCREMENTAL_OVERLAP_DAYS))
                    .timestamp()
                    .max(0),
                before: Some(now.timestamp()),
                backfill_before: Some(earliest.timestamp()),
            },
            None => Self {
                after: 0,
                before: Some(now.timestamp()),
                backfill_before: None,
            },
        }
    }
}

/// Running counters for one sync.
#[derive(Debug, Default)]
struct SyncCounters {
    total_upserted: u32,
    detail_fetched: u32,
    processed_steps: u32,
    total_steps: Option<u32>,
    total_activities: Option<u32>,
    last_reported_bucket: u32,
}

impl SyncCounters {
    fn snapshot(&self, phase: &str) -> SyncProgress {
        SyncProgress {
            phase: phase.to_string(),
            processed_steps: self.processed_steps,
            total_steps: self.total_steps,
            total_activities: self.total_activities,
            detail_fetched: self.detail_fetched,
        }
    }

    /// Report if another `PROGRESS_INTERVAL` steps have completed.
    fn maybe_report(&mut self, phase: &str, reporter: &ProgressReporter) {
        let bucket = self.processed_steps / PROGRESS_INTERVAL;
        if bucket > self.last_reported_bucket {
            self.last_reported_bucket = bucket;
            reporter.report(self.snapshot(phase));
        }
    }
}

/// Pulls activities and best efforts from Strava into the store.
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    api: Arc<dyn ActivitySource>,
    settings: SyncSettings,
    refresh_locks: RefreshLocks,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn Store>, api: Arc<dyn ActivitySource>, settings: SyncSettings) -> Self {
        Self {
            store,
            api,
            settings,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Stored tokens, refreshed and persisted if they expire within a minute.
    pub async fn ensure_fresh_token(&self, athlete_id: u64) -> Result<UserTokens, AppError> {
        let now = Utc::now();
        let tokens = self.load_tokens(athlete_id).await?;
        if !tokens.expires_within(now, TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(tokens);
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another job may have refreshed while we waited.
        let tokens = self.load_tokens(athlete_id).await?;
        if !tokens.expires_within(Utc::now(), TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(tokens);
        }

        tracing::info!(athlete_id, "Access token expiring, refreshing");
        let refreshed = self.api.refresh_token(&tokens.refresh_token).await?;
        let expires_at = DateTime::from_timestamp(refreshed.expires_at, 0).ok_or_else(|| {
            AppError::Validation(format!("invalid token expiry {}", refreshed.expires_at))
        })?;

        let updated = UserTokens {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at,
        };
        self.store.set_tokens(athlete_id, &updated).await?;

        tracing::info!(athlete_id, expires_at = %expires_at, "Token refreshed and stored");
        Ok(updated)
    }

    async fn load_tokens(&self, athlete_id: u64) -> Result<UserTokens, AppError> {
        self.store
            .get_tokens(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tokens for athlete {}", athlete_id)))
    }

    /// Detail fetch budget; `None` is unlimited.
    fn detail_budget(&self, options: SyncOptions) -> Option<u32> {
        if options.details {
            return None;
        }
        Some(options.max_detail.unwrap_or(if options.full {
            0
        } else {
            self.settings.detail_budget
        }))
    }

    /// Sync one athlete's activities and best efforts.
    ///
    /// Any API, schema or storage failure aborts the sync; rows written
    /// before the failure stay in place.
    pub async fn sync_activities(
        &self,
        athlete_id: u64,
        options: SyncOptions,
        reporter: &ProgressReporter,
    ) -> Result<SyncResult, AppError> {
        let tokens = self.ensure_fresh_token(athlete_id).await?;

        let bounds = self.store.activity_date_bounds(athlete_id).await?;
        let plan = FetchPlan::new(options.full, bounds, Utc::now());

        let mut run = SyncRun {
            orchestrator: self,
            athlete_id,
            access_token: &tokens.access_token,
            options,
            budget: self.detail_budget(options),
            pacer: RequestPacer::new(self.settings.pacing),
            phase: if options.details {
                PHASE_FETCHING_DETAILS
            } else {
                PHASE_FETCHING
            },
            reporter,
            counters: SyncCounters::default(),
        };

        tracing::info!(
            athlete_id,
            full = options.full,
            details = options.details,
            after = plan.after,
            detail_budget = ?run.budget,
            "Starting activity sync"
        );

        if options.full {
            run.size_from_athlete_stats().await?;
        }

        let mut page = 1;
        loop {
            let query = ActivityQuery {
                after: Some(plan.after),
                before: plan.before,
                page,
                per_page: PER_PAGE,
            };
            let batch = self.api.list_activities(run.access_token, query).await?;
            if batch.is_empty() {
                break;
            }
            tracing::debug!(athlete_id, page, count = batch.len(), "Fetched activity page");
            run.ingest_page(batch).await?;
            page += 1;
        }

        if let Some(before) = plan.backfill_before {
            let query = ActivityQuery {
                after: None,
                before: Some(before),
                page: 1,
                per_page: PER_PAGE,
            };
            let batch = self.api.list_activities(run.access_token, query).await?;
            tracing::debug!(athlete_id, count = batch.len(), "Fetched backfill page");
            run.ingest_page(batch).await?;
        }

        reporter.report(run.counters.snapshot(PHASE_FINISHING));

        tracing::info!(
            athlete_id,
            total_upserted = run.counters.total_upserted,
            detail_fetched = run.counters.detail_fetched,
            "Activity sync complete"
        );

        Ok(SyncResult {
            total_upserted: run.counters.total_upserted,
            detail_fetched: run.counters.detail_fetched,
        })
    }
}

/// State of one in-flight sync.
struct SyncRun<'a> {
    orchestrator: &'a SyncOrchestrator,
    athlete_id: u64,
    access_token: &'a str,
    options: SyncOptions,
    /// Detail fetch budget; `None` is unlimited.
    budget: Option<u32>,
    pacer: RequestPacer,
    phase: &'static str,
    reporter: &'a ProgressReporter,
    counters: SyncCounters,
}

impl SyncRun<'_> {
    /// Size progress totals from the athlete's lifetime counts.
    async fn size_from_athlete_stats(&mut self) -> Result<(), AppError> {
        let stats = self
            .orchestrator
            .api
            .get_athlete_stats(self.access_token, self.athlete_id)
            .await?;
        let runs = stats.all_run_totals.count;
        let total = runs + stats.all_ride_totals.count + stats.all_swim_totals.count;
        self.counters.total_activities = Some(total);
        self.counters.total_steps = Some(total + if self.options.details { runs } else { 0 });
        self.reporter.report(self.counters.snapshot(self.phase));
        Ok(())
    }

    async fn ingest_page(&mut self, batch: Vec<StravaActivitySummary>) -> Result<(), AppError> {
        let store = &self.orchestrator.store;

        for summary in batch {
            let activity = summary.into_activity(self.athlete_id)?;
            store.upsert_activity(&activity).await?;
            self.counters.total_upserted += 1;
            self.counters.processed_steps += 1;

            let within_budget = self
                .budget
                .map_or(true, |max| self.counters.detail_fetched < max);
            if activity.sport_type == SportType::Run && within_budget {
                let cached = store.get_effort_cache(self.athlete_id, &activity.id).await?;
                if cached.is_none() {
                    self.pacer.acquire().await;
                    let detail = self
                        .orchestrator
                        .api
                        .get_activity(self.access_token, &activity.id)
                        .await?;
                    let entry = EffortCacheEntry::best_efforts(
                        self.athlete_id,
                        &activity.id,
                        detail.into_best_efforts(),
                    );
                    store.put_effort_cache(&entry).await?;
                    self.counters.detail_fetched += 1;
                    tracing::debug!(
                        athlete_id = self.athlete_id,
                        activity_id = %activity.id,
                        efforts = entry.payload.best_efforts().len(),
                        "Cached best efforts"
                    );
                }
                if self.options.details {
                    self.counters.processed_steps += 1;
                }
            }

            self.counters.maybe_report(self.phase, self.reporter);
        }
        Ok(())
    }
}
