// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pr_tracker::config::Config;
use pr_tracker::db::{FirestoreDb, MemoryStore, Store};
use pr_tracker::error::AppError;
use pr_tracker::middleware::auth::create_jwt;
use pr_tracker::models::{User, UserTokens};
use pr_tracker::routes::create_router;
use pr_tracker::services::strava::{
    decode_payload, ActivityQuery, ActivitySource, StravaActivityDetail, StravaActivitySummary,
    StravaAthleteStats, StravaBestEffort, StravaStream, StravaStreams, StravaTotals,
    TokenRefreshResponse,
};
use pr_tracker::time_utils::format_utc_rfc3339;
use pr_tracker::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique athlete ID for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_athlete_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        % 1_000_000_000_000
}

/// Scripted stand-in for the Strava API.
///
/// `pages` answers incremental/full listing queries by page number; the
/// backfill query (no `after`) gets `backfill`. Everything past the last
/// page is empty.
#[derive(Default)]
pub struct ScriptedSource {
    pub pages: Vec<Vec<StravaActivitySummary>>,
    pub backfill: Vec<StravaActivitySummary>,
    /// Listing this page number fails with a Strava error.
    pub fail_on_page: Option<u32>,
    /// Listing this page number returns a body that does not match the schema.
    pub malformed_page: Option<u32>,
    /// Token refresh is rejected by Strava.
    pub reject_refresh: AtomicBool,
    pub efforts: HashMap<String, Vec<StravaBestEffort>>,
    pub streams: HashMap<String, StravaStreams>,
    pub stats: StravaAthleteStats,
    pub refresh_calls: AtomicU32,
    pub detail_calls: AtomicU32,
    pub stream_calls: AtomicU32,
    pub queries: Mutex<Vec<ActivityQuery>>,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn with_pages(pages: Vec<Vec<StravaActivitySummary>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn details(&self) -> u32 {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn stream_fetches(&self) -> u32 {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<ActivityQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySource for ScriptedSource {
    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()));
        }
        Ok(TokenRefreshResponse {
            access_token: format!("fresh-access-{n}"),
            refresh_token: format!("fresh-refresh-{n}"),
            expires_at: (Utc::now() + Duration::hours(6)).timestamp(),
        })
    }

    async fn list_activities(
        &self,
        _access_token: &str,
        query: ActivityQuery,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        self.queries.lock().unwrap().push(query);
        if query.after.is_none() {
            return Ok(if query.page == 1 {
                self.backfill.clone()
            } else {
                Vec::new()
            });
        }
        if self.malformed_page == Some(query.page) {
            return decode_payload(br#"[{"id": "not-a-number", "sport_type": "Run"}]"#);
        }
        if self.fail_on_page == Some(query.page) {
            return Err(AppError::StravaApi(format!(
                "HTTP 500 listing page {}",
                query.page
            )));
        }
        Ok(self
            .pages
            .get(query.page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_activity(
        &self,
        _access_token: &str,
        activity_id: &str,
    ) -> Result<StravaActivityDetail, AppError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StravaActivityDetail {
            id: activity_id.parse().unwrap(),
            best_efforts: self.efforts.get(activity_id).cloned(),
        })
    }

    async fn get_streams(
        &self,
        _access_token: &str,
        activity_id: &str,
    ) -> Result<StravaStreams, AppError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.streams.get(activity_id).cloned().unwrap_or_default())
    }

    async fn get_athlete_stats(
        &self,
        _access_token: &str,
        _athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError> {
        Ok(self.stats.clone())
    }
}

/// Activity summary as Strava would list it.
#[allow(dead_code)]
pub fn summary(
    id: u64,
    sport: &str,
    start: DateTime<Utc>,
    distance: f64,
    moving_time: u32,
) -> StravaActivitySummary {
    StravaActivitySummary {
        id,
        name: Some(format!("Activity {id}")),
        sport_type: sport.to_string(),
        start_date: format_utc_rfc3339(start),
        timezone: None,
        distance,
        moving_time,
        elapsed_time: moving_time,
        total_elevation_gain: 25.0,
        average_speed: Some(distance / f64::from(moving_time.max(1))),
        max_speed: None,
        average_heartrate: None,
        start_latlng: None,
        map: None,
    }
}

#[allow(dead_code)]
pub fn best_effort(name: &str, distance: f64, elapsed_time: u32) -> StravaBestEffort {
    StravaBestEffort {
        name: name.to_string(),
        elapsed_time,
        moving_time: elapsed_time,
        distance,
    }
}

/// Constant-pace distance/time streams sampled every `step` meters.
#[allow(dead_code)]
pub fn constant_pace_streams(total_distance: f64, step: f64, seconds_per_meter: f64) -> StravaStreams {
    let samples = (total_distance / step) as usize + 1;
    let distance: Vec<f64> = (0..samples).map(|i| i as f64 * step).collect();
    let time: Vec<f64> = distance.iter().map(|d| d * seconds_per_meter).collect();
    StravaStreams {
        distance: Some(StravaStream { data: distance }),
        time: Some(StravaStream { data: time }),
    }
}

#[allow(dead_code)]
pub fn stats(runs: u32, rides: u32) -> StravaAthleteStats {
    StravaAthleteStats {
        all_run_totals: StravaTotals { count: runs },
        all_ride_totals: StravaTotals { count: rides },
        all_swim_totals: StravaTotals::default(),
    }
}

/// Seed a user whose tokens expire at `expires_at`.
#[allow(dead_code)]
pub async fn seed_user(store: &dyn Store, athlete_id: u64, expires_at: DateTime<Utc>) {
    store
        .upsert_user(&User {
            strava_athlete_id: athlete_id,
            firstname: "Test".to_string(),
            lastname: "Runner".to_string(),
            created_at: Utc::now().to_rfc3339(),
        })
        .await
        .unwrap();
    store
        .set_tokens(
            athlete_id,
            &UserTokens {
                access_token: "stored-access".to_string(),
                refresh_token: "stored-refresh".to_string(),
                expires_at,
            },
        )
        .await
        .unwrap();
}

/// Build the app over an in-memory store and the given source.
#[allow(dead_code)]
pub fn create_test_app(
    source: Arc<ScriptedSource>,
) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(Config::test_default(), store.clone(), source));
    (create_router(state.clone()), state, store)
}

/// Bearer header value for a session of `athlete_id`.
#[allow(dead_code)]
pub fn bearer(athlete_id: u64) -> String {
    let key = Config::test_default().jwt_signing_key;
    format!("Bearer {}", create_jwt(athlete_id, &key).unwrap())
}
