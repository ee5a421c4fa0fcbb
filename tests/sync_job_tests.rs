// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end sync job tests against the in-memory store and a scripted
//! Strava source.

use chrono::{Duration, Utc};
use pr_tracker::config::SyncSettings;
use pr_tracker::db::{MemoryStore, Store};
use pr_tracker::models::{JobStatus, SportType, SyncJob, WindowType};
use pr_tracker::services::{JobRequest, SyncJobRunner};
use std::sync::Arc;

mod common;
use common::{best_effort, constant_pace_streams, seed_user, stats, summary, ScriptedSource};

const ATHLETE: u64 = 1001;

fn settings(detail_budget: u32) -> SyncSettings {
    SyncSettings {
        detail_budget,
        pacing: std::time::Duration::ZERO,
        ..SyncSettings::default()
    }
}

fn runner(store: &Arc<MemoryStore>, source: &Arc<ScriptedSource>, detail_budget: u32) -> SyncJobRunner {
    SyncJobRunner::new(store.clone(), source.clone(), settings(detail_budget))
}

async fn run_job(runner: &SyncJobRunner, full: bool, details: bool, streams: bool) -> SyncJob {
    let job = runner.enqueue(ATHLETE).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    runner
        .run_sync_job(JobRequest {
            job_id: job.id,
            athlete_id: ATHLETE,
            full,
            details,
            streams,
        })
        .await
        .unwrap()
}

fn long_lived() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::hours(6)
}

#[tokio::test]
async fn test_failure_on_second_page_marks_error_and_keeps_first_page() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![
        summary(1, "Run", now - Duration::days(2), 5000.0, 1500),
        summary(2, "Ride", now - Duration::days(3), 20000.0, 3600),
    ]]);
    source.fail_on_page = Some(2);
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.phase, "Error");
    let message = job.error_message.clone().unwrap();
    assert!(!message.is_empty());
    assert!(message.contains("page 2"));
    assert!(job.finished_at.is_some());

    let persisted = store.get_sync_job(&job.id).await.unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Error);

    let ids: Vec<String> = store.activities_for(ATHLETE).into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_malformed_page_marks_error_and_keeps_first_page() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![
        summary(1, "Run", now - Duration::days(2), 5000.0, 1500),
        summary(2, "Run", now - Duration::days(4), 8000.0, 2500),
    ]]);
    source.malformed_page = Some(2);
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.phase, "Error");
    assert!(job
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Invalid Strava payload"));
    assert!(job.finished_at.is_some());
    assert_eq!(
        store.get_sync_job(&job.id).await.unwrap().unwrap().status,
        JobStatus::Error
    );

    let ids: Vec<String> = store.activities_for(ATHLETE).into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_rejected_token_refresh_marks_error_and_keeps_prior_rows() {
    let now = Utc::now();
    let source = Arc::new(ScriptedSource::with_pages(vec![vec![summary(
        3,
        "Run",
        now - Duration::days(1),
        5000.0,
        1500,
    )]]));
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;
    let runner = runner(&store, &source, 25);

    let first = run_job(&runner, false, false, false).await;
    assert_eq!(first.status, JobStatus::Done);

    // Tokens now expire within the refresh margin and Strava refuses to refresh.
    seed_user(store.as_ref(), ATHLETE, now + Duration::seconds(10)).await;
    source
        .reject_refresh
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let job = run_job(&runner, false, false, false).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.phase, "Error");
    let message = job.error_message.clone().unwrap();
    assert!(message.contains("HTTP 401"));
    assert!(message.contains("Reconnect Strava"));
    assert_eq!(source.refreshes(), 1);
    assert_eq!(
        store.get_sync_job(&job.id).await.unwrap().unwrap().status,
        JobStatus::Error
    );

    // Stored tokens are left as they were.
    let tokens = store.get_tokens(ATHLETE).await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "stored-access");
    let ids: Vec<String> = store.activities_for(ATHLETE).into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["3".to_string()]);
}

#[tokio::test]
async fn test_exhausted_detail_budget_is_still_done() {
    let now = Utc::now();
    let runs = (1..=5)
        .map(|i| summary(i, "Run", now - Duration::days(i as i64), 5000.0, 1500))
        .collect();
    let source = Arc::new(ScriptedSource::with_pages(vec![runs]));
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;
    let runner = runner(&store, &source, 2);

    let job = run_job(&runner, false, false, false).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.phase, "Complete");
    assert_eq!(job.detail_fetched, 2);
    assert_eq!(store.effort_cache_len(), 2);

    // A later sync fills the remaining cache gaps without refetching.
    let job = run_job(&runner, false, false, false).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.detail_fetched, 2);
    assert_eq!(store.effort_cache_len(), 4);
    assert_eq!(source.details(), 4);
}

#[tokio::test]
async fn test_expiring_token_refreshed_once_and_persisted() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![summary(
        7,
        "Run",
        now - Duration::days(1),
        5000.0,
        1500,
    )]]);
    source
        .streams
        .insert("7".to_string(), constant_pace_streams(5000.0, 10.0, 0.3));
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, now + Duration::seconds(30)).await;

    let job = run_job(&runner(&store, &source, 25), false, false, true).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(source.refreshes(), 1);
    let tokens = store.get_tokens(ATHLETE).await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "fresh-access-1");
    assert_eq!(tokens.refresh_token, "fresh-refresh-1");
}

#[tokio::test]
async fn test_valid_token_is_not_refreshed() {
    let source = Arc::new(ScriptedSource::default());
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(source.refreshes(), 0);
}

#[tokio::test]
async fn test_missing_user_fails_job() {
    let source = Arc::new(ScriptedSource::default());
    let store = Arc::new(MemoryStore::new());

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error_message.unwrap().contains("User not found"));
}

#[tokio::test]
async fn test_full_sync_sizes_progress_from_athlete_stats() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![
        summary(1, "Run", now - Duration::days(1), 5000.0, 1500),
        summary(2, "TrailRun", now - Duration::days(2), 10000.0, 3300),
        summary(3, "Run", now - Duration::days(3), 3000.0, 900),
        summary(4, "GravelRide", now - Duration::days(4), 40000.0, 5400),
    ]]);
    source.stats = stats(3, 1);
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), true, true, false).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.total_activities, Some(4));
    assert_eq!(job.detail_fetched, 3);
    assert!(job.started_at.is_some() && job.finished_at.is_some());

    let ready = store.latest_all_time_job(ATHLETE).await.unwrap().unwrap();
    assert_eq!(ready.id, job.id);
}

#[tokio::test]
async fn test_full_sync_without_details_fetches_no_details() {
    let now = Utc::now();
    let source = Arc::new(ScriptedSource::with_pages(vec![vec![summary(
        1,
        "Run",
        now - Duration::days(1),
        5000.0,
        1500,
    )]]));
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), true, false, false).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.detail_fetched, 0);
    assert_eq!(source.details(), 0);
}

#[tokio::test]
async fn test_incremental_sync_overlaps_and_backfills() {
    let now = Utc::now();
    let latest = now - Duration::days(1);
    let earliest = now - Duration::days(400);
    let source = Arc::new(ScriptedSource::default());
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;
    for (id, date) in [(1, latest), (2, earliest)] {
        let activity = summary(id, "Ride", date, 20000.0, 3600)
            .into_activity(ATHLETE)
            .unwrap();
        store.upsert_activity(&activity).await.unwrap();
    }

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;
    assert_eq!(job.status, JobStatus::Done);

    let queries = source.recorded_queries();
    let first = queries[0];
    let expected_after = (store.activity_date_bounds(ATHLETE).await.unwrap().unwrap().1
        - Duration::days(14))
    .timestamp();
    assert_eq!(first.after, Some(expected_after));
    assert_eq!(first.page, 1);

    let backfill = queries.last().unwrap();
    assert_eq!(backfill.after, None);
    assert_eq!(backfill.before, Some(earliest.timestamp()));
}

#[tokio::test]
async fn test_job_recomputes_every_persisted_window() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![
        summary(1, "Run", now - Duration::hours(3), 5000.0, 1500),
        summary(2, "Ride", now - Duration::hours(5), 30000.0, 3600),
    ]]);
    source
        .efforts
        .insert("1".to_string(), vec![best_effort("5K", 5000.0, 1450), best_effort("1K", 1000.0, 280)]);
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), false, false, false).await;

    assert_eq!(job.status, JobStatus::Done);
    // Seven persisted windows plus the rolling week, for runs and rides.
    assert_eq!(job.total_steps, Some(16));
    assert_eq!(job.processed_steps, 16);

    let rolling_runs = store
        .distance_records(ATHLETE, WindowType::Week, "rolling-7d", SportType::Run)
        .await
        .unwrap();
    let five_k = rolling_runs.iter().find(|r| r.distance_target == 5000).unwrap();
    assert_eq!(five_k.best_time_seconds, 1450);
    assert_eq!(five_k.activity_id, "1");

    let rolling_rides = store
        .get_period_summary(ATHLETE, WindowType::Week, "rolling-7d", SportType::Ride)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rolling_rides.totals.activity_count, 1);
    assert!(store
        .distance_records(ATHLETE, WindowType::Week, "rolling-7d", SportType::Ride)
        .await
        .unwrap()
        .is_empty());

    let all_time = store
        .get_period_summary(ATHLETE, WindowType::AllTime, "all-time", SportType::Run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(all_time.totals.activity_count, 1);
    assert_eq!(all_time.best_activity_ids.longest_run_id.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_stream_sweep_writes_exact_all_time_records() {
    let now = Utc::now();
    let mut source = ScriptedSource::with_pages(vec![vec![
        summary(10, "Run", now - Duration::days(1), 10000.0, 3000),
        summary(11, "Run", now - Duration::days(2), 5000.0, 1400),
        summary(12, "Run", now - Duration::days(3), 8000.0, 2600),
    ]]);
    // 5:00/km over 10 km, 4:40/km over 5 km; run 12 has no streams.
    source
        .streams
        .insert("10".to_string(), constant_pace_streams(10000.0, 10.0, 0.3));
    source
        .streams
        .insert("11".to_string(), constant_pace_streams(5000.0, 10.0, 0.28));
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    seed_user(store.as_ref(), ATHLETE, long_lived()).await;

    let job = run_job(&runner(&store, &source, 25), false, false, true).await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(source.stream_fetches(), 3);

    let records = store
        .distance_records(ATHLETE, WindowType::AllTime, "all-time", SportType::Run)
        .await
        .unwrap();
    let time_for = |target: u32| {
        records
            .iter()
            .find(|r| r.distance_target == target)
            .map(|r| (r.best_time_seconds, r.activity_id.clone()))
    };

    assert_eq!(time_for(5000), Some((1400, "11".to_string())));
    assert_eq!(time_for(10000), Some((3000, "10".to_string())));
    assert_eq!(time_for(400), Some((112, "11".to_string())));
    assert!(time_for(15000).is_none());
}
