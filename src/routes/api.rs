// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::analytics::{window_range, DistanceQuery, DistanceScope, DistanceSeries};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    DistanceRecord, JobStatusSnapshot, PeriodSummary, SportType, SyncJob, WindowType,
};
use crate::services::JobRequest;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync", post(start_sync))
        .route("/api/sync/status", get(get_sync_status))
        .route("/api/sync/latest", get(get_latest_sync))
        .route("/api/records", get(get_records))
        .route("/api/distance", get(get_distance))
}

// ─── Sync Jobs ───────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct StartSyncQuery {
    full: Option<String>,
    details: Option<String>,
    streams: Option<String>,
}

/// Query flags are on when given as `1` or `true`.
fn flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v == "1" || v.eq_ignore_ascii_case("true"))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StartSyncResponse {
    pub job_id: String,
}

/// Queue a sync job and run it in the background.
async fn start_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<StartSyncQuery>,
) -> Result<Json<StartSyncResponse>> {
    let job = state.jobs.enqueue(user.athlete_id).await?;

    let request = JobRequest {
        job_id: job.id.clone(),
        athlete_id: user.athlete_id,
        full: flag(params.full.as_deref()),
        details: flag(params.details.as_deref()),
        streams: flag(params.streams.as_deref()),
    };
    tracing::info!(
        athlete_id = user.athlete_id,
        job_id = %job.id,
        full = request.full,
        details = request.details,
        streams = request.streams,
        "Sync requested"
    );
    state.jobs.spawn(request);

    Ok(Json(StartSyncResponse { job_id: job.id }))
}

#[derive(Deserialize)]
struct SyncStatusQuery {
    id: String,
}

/// Status snapshot of one of the caller's jobs.
async fn get_sync_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SyncStatusQuery>,
) -> Result<Json<JobStatusSnapshot>> {
    if uuid::Uuid::parse_str(&params.id).is_err() {
        return Err(AppError::BadRequest("Invalid job id".to_string()));
    }

    let job = state
        .store
        .get_sync_job(&params.id)
        .await?
        .filter(|job| job.athlete_id == user.athlete_id)
        .ok_or_else(|| AppError::NotFound(format!("Sync job {}", params.id)))?;

    Ok(Json(job.snapshot()))
}

#[derive(Serialize)]
pub struct LatestSyncResponse {
    pub all_time_ready: bool,
    pub latest_all_time_synced_at: Option<String>,
    pub latest_job: Option<SyncJob>,
}

/// Most recent job, and whether a completed full import exists.
async fn get_latest_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LatestSyncResponse>> {
    let latest_job = state.store.latest_sync_job(user.athlete_id).await?;
    let all_time = state.store.latest_all_time_job(user.athlete_id).await?;

    Ok(Json(LatestSyncResponse {
        all_time_ready: all_time.is_some(),
        latest_all_time_synced_at: all_time
            .map(|job| format_utc_rfc3339(job.finished_at.unwrap_or(job.updated_at))),
        latest_job,
    }))
}

// ─── Records ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RecordsQuery {
    #[serde(default = "default_window_type")]
    window_type: WindowType,
    #[serde(default = "default_sport_type")]
    sport_type: SportType,
    /// Stored window key; defaults to the current window. Use `rolling-7d`
    /// with WEEK for the rolling week.
    key: Option<String>,
}

fn default_window_type() -> WindowType {
    WindowType::Month
}
fn default_sport_type() -> SportType {
    SportType::Run
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub window_type: WindowType,
    pub window_key: String,
    pub summary: Option<PeriodSummary>,
    pub records: Vec<DistanceRecord>,
}

/// Totals and records for one window.
async fn get_records(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>> {
    let range = window_range(
        params.window_type,
        Utc::now(),
        state.config.sync.tz_offset_minutes,
    );

    if !params.window_type.uses_persisted_summary() {
        let report = state
            .jobs
            .records()
            .compute_window(user.athlete_id, params.window_type, &range, params.sport_type)
            .await?;
        return Ok(Json(RecordsResponse {
            window_type: params.window_type,
            window_key: range.key,
            summary: Some(report.summary),
            records: report.records,
        }));
    }

    let key = params.key.unwrap_or(range.key);
    let (summary, records) = state
        .jobs
        .records()
        .stored_window(user.athlete_id, params.window_type, &key, params.sport_type)
        .await?;

    Ok(Json(RecordsResponse {
        window_type: params.window_type,
        window_key: key,
        summary,
        records,
    }))
}

// ─── Distance Series ─────────────────────────────────────────

/// Run distance bucketed by month, week, day or activity.
async fn get_distance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DistanceQuery>,
) -> Result<Json<DistanceSeries>> {
    let scope = DistanceScope::from_query(&params).map_err(AppError::BadRequest)?;

    let range = match scope.fetch_range() {
        Some(range) => Some(range),
        None => state
            .store
            .activity_date_bounds(user.athlete_id)
            .await?
            .map(|(earliest, latest)| (earliest, latest + Duration::seconds(1))),
    };
    let runs = match range {
        Some((start, end)) => {
            state
                .store
                .activities_in_range(user.athlete_id, SportType::Run, start, end)
                .await?
        }
        None => Vec::new(),
    };

    let series = scope.series(&runs);
    tracing::debug!(
        athlete_id = user.athlete_id,
        granularity = ?series.granularity,
        runs = runs.len(),
        points = series.points.len(),
        "Distance series built"
    );
    Ok(Json(series))
}
