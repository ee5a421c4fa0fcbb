// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Window totals and personal-record computation over stored activities.

use crate::analytics::{
    best_activity_ids, best_effort_seconds, best_records, candidate_for, compute_totals,
    merge_distance_records, RecordSet, WindowRange,
};
use crate::config::SyncSettings;
use crate::db::Store;
use crate::error::AppError;
use crate::models::{
    cached_best_efforts, DistanceRecord, PeriodSummary, RecordCandidate, SportType, WindowType,
    DISTANCE_TARGETS,
};
use crate::services::pacing::RequestPacer;
use crate::services::progress::{ProgressReporter, SyncProgress};
use crate::services::strava::ActivitySource;
use serde::Serialize;
use std::sync::Arc;

/// Key under which stream-derived all-time records are stored.
pub const ALL_TIME_KEY: &str = "all-time";
pub const PHASE_ALL_TIME: &str = "Computing all-time PRs";
/// Stream sweep progress is reported every this many runs.
const SWEEP_PROGRESS_INTERVAL: usize = 10;

/// Summary and records for one window and sport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub summary: PeriodSummary,
    pub records: Vec<DistanceRecord>,
}

/// Outcome of a stream sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepResult {
    pub processed: usize,
    pub with_streams: usize,
    pub records_written: usize,
}

#[derive(Clone)]
pub struct RecordsService {
    store: Arc<dyn Store>,
    api: Arc<dyn ActivitySource>,
    settings: SyncSettings,
}

impl RecordsService {
    pub fn new(store: Arc<dyn Store>, api: Arc<dyn ActivitySource>, settings: SyncSettings) -> Self {
        Self {
            store,
            api,
            settings,
        }
    }

    /// Totals and best-per-target records for a window, without persisting.
    ///
    /// Records are only derived for runs; other sports get totals only.
    pub async fn compute_window(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        range: &WindowRange,
        sport: SportType,
    ) -> Result<WindowReport, AppError> {
        let activities = self
            .store
            .activities_in_range(athlete_id, sport, range.start, range.end)
            .await?;

        let summary = PeriodSummary {
            athlete_id,
            period_type: window_type,
            period_key: range.key.clone(),
            sport_type: sport,
            totals: compute_totals(&activities),
            best_activity_ids: best_activity_ids(&activities),
        };

        if sport != SportType::Run {
            return Ok(WindowReport {
                summary,
                records: Vec::new(),
            });
        }

        let mut candidates: Vec<RecordCandidate> = Vec::new();
        for activity in &activities {
            let cache = self
                .store
                .get_effort_cache(athlete_id, &activity.id)
                .await?;
            let efforts = cached_best_efforts(cache.as_ref());
            candidates.extend(
                DISTANCE_TARGETS
                    .iter()
                    .filter_map(|&target| candidate_for(activity, efforts, target)),
            );
        }

        let records = to_records(athlete_id, window_type, &range.key, sport, best_records(candidates));
        Ok(WindowReport { summary, records })
    }

    /// Compute a window and persist its summary and complete record set.
    ///
    /// Targets that no longer have a candidate lose their stored record.
    pub async fn recompute_window(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        range: &WindowRange,
        sport: SportType,
    ) -> Result<WindowReport, AppError> {
        let report = self
            .compute_window(athlete_id, window_type, range, sport)
            .await?;

        self.store.upsert_period_summary(&report.summary).await?;
        self.store
            .replace_distance_records(athlete_id, window_type, &range.key, sport, &report.records)
            .await?;

        tracing::debug!(
            athlete_id,
            window = %window_type,
            key = %range.key,
            sport = %sport,
            activities = report.summary.totals.activity_count,
            records = report.records.len(),
            "Window recomputed"
        );
        Ok(report)
    }

    /// Persisted summary and records for a window.
    pub async fn stored_window(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        key: &str,
        sport: SportType,
    ) -> Result<(Option<PeriodSummary>, Vec<DistanceRecord>), AppError> {
        let summary = self
            .store
            .get_period_summary(athlete_id, window_type, key, sport)
            .await?;
        let records = self
            .store
            .distance_records(athlete_id, window_type, key, sport)
            .await?;
        Ok((summary, records))
    }

    /// Exact all-time run records from raw distance/time streams.
    ///
    /// Sweeps the most recent runs, one paced stream fetch at a time, and
    /// upserts an ALL_TIME record for every target some run covered. Targets
    /// no stream reached keep whatever record they already had.
    pub async fn compute_all_time_from_streams(
        &self,
        athlete_id: u64,
        access_token: &str,
        reporter: &ProgressReporter,
    ) -> Result<SweepResult, AppError> {
        let runs = self
            .store
            .recent_activities(athlete_id, SportType::Run, self.settings.stream_sweep_limit)
            .await?;
        let total = runs.len();
        let pacer = RequestPacer::new(self.settings.pacing);
        let progress = |processed: usize| SyncProgress {
            phase: PHASE_ALL_TIME.to_string(),
            processed_steps: u32::try_from(processed).unwrap_or(u32::MAX),
            total_steps: u32::try_from(total).ok(),
            total_activities: None,
            detail_fetched: 0,
        };

        tracing::info!(athlete_id, runs = total, "Starting stream sweep");

        let mut best = RecordSet::new();
        let mut result = SweepResult::default();

        for run in &runs {
            pacer.acquire().await;
            let streams = self.api.get_streams(access_token, &run.id).await?;

            if let Some((distance, time)) = streams.distance_and_time() {
                result.with_streams += 1;
                for &target in &DISTANCE_TARGETS {
                    if let Some(seconds) = best_effort_seconds(distance, time, target) {
                        best = merge_distance_records(
                            best,
                            RecordCandidate {
                                distance_target: target,
                                best_time_seconds: seconds,
                                activity_id: run.id.clone(),
                                achieved_at: run.start_date,
                            },
                        );
                    }
                }
            }

            result.processed += 1;
            if result.processed % SWEEP_PROGRESS_INTERVAL == 0 {
                reporter.report(progress(result.processed));
            }
        }
        reporter.report(progress(result.processed));

        let records = to_records(athlete_id, WindowType::AllTime, ALL_TIME_KEY, SportType::Run, best);
        self.store.upsert_distance_records(&records).await?;
        result.records_written = records.len();

        tracing::info!(
            athlete_id,
            processed = result.processed,
            with_streams = result.with_streams,
            records = result.records_written,
            "Stream sweep complete"
        );
        Ok(result)
    }
}

fn to_records(
    athlete_id: u64,
    window_type: WindowType,
    key: &str,
    sport: SportType,
    set: RecordSet,
) -> Vec<DistanceRecord> {
    set.into_values()
        .map(|candidate| DistanceRecord::from_candidate(athlete_id, window_type, key, sport, candidate))
        .collect()
}
