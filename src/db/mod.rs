//! Persistence layer.
//!
//! Every write is an upsert keyed by the entity's natural identity, so
//! repeating or interleaving writes converges instead of duplicating.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{
    Activity, DistanceRecord, EffortCacheEntry, PeriodSummary, SportType, SyncJob, User,
    UserTokens, WindowType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    pub const ACTIVITIES: &str = "activities";
    pub const EFFORT_CACHE: &str = "effort_cache";
    pub const PERIOD_SUMMARIES: &str = "period_summaries";
    pub const DISTANCE_RECORDS: &str = "distance_records";
    pub const SYNC_JOBS: &str = "sync_jobs";
}

/// Storage contract used by the sync and records services.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users & Tokens ──────────────────────────────────────────

    async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    async fn get_tokens(&self, athlete_id: u64) -> Result<Option<UserTokens>, AppError>;

    async fn set_tokens(&self, athlete_id: u64, tokens: &UserTokens) -> Result<(), AppError>;

    // ─── Activities ──────────────────────────────────────────────

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Start dates of the earliest and latest stored activity.
    async fn activity_date_bounds(
        &self,
        athlete_id: u64,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError>;

    /// Activities of `sport` with `start <= start_date < end`, newest first.
    async fn activities_in_range(
        &self,
        athlete_id: u64,
        sport: SportType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, AppError>;

    /// Most recent `limit` activities of `sport`, newest first.
    async fn recent_activities(
        &self,
        athlete_id: u64,
        sport: SportType,
        limit: usize,
    ) -> Result<Vec<Activity>, AppError>;

    // ─── Effort Cache ────────────────────────────────────────────

    async fn get_effort_cache(
        &self,
        athlete_id: u64,
        activity_id: &str,
    ) -> Result<Option<EffortCacheEntry>, AppError>;

    async fn put_effort_cache(&self, entry: &EffortCacheEntry) -> Result<(), AppError>;

    // ─── Derived Records ─────────────────────────────────────────

    async fn upsert_period_summary(&self, summary: &PeriodSummary) -> Result<(), AppError>;

    async fn get_period_summary(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Option<PeriodSummary>, AppError>;

    async fn upsert_distance_records(&self, records: &[DistanceRecord]) -> Result<(), AppError>;

    /// Make `records` the complete record set of one window. Stored targets
    /// absent from `records` are deleted.
    async fn replace_distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
        records: &[DistanceRecord],
    ) -> Result<(), AppError>;

    /// Records for one window, ordered by distance target.
    async fn distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Vec<DistanceRecord>, AppError>;

    // ─── Sync Jobs ───────────────────────────────────────────────

    async fn put_sync_job(&self, job: &SyncJob) -> Result<(), AppError>;

    async fn get_sync_job(&self, job_id: &str) -> Result<Option<SyncJob>, AppError>;

    /// Most recently updated job for the athlete.
    async fn latest_sync_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError>;

    /// Most recently updated DONE job whose activity total is known.
    async fn latest_all_time_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError>;
}
