// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of [`Store`].
//!
//! Documents are keyed by each entity's natural key, so every write is an
//! idempotent upsert. Timestamps are stored as RFC3339 strings and range
//! filters compare them lexicographically.

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{
    Activity, DistanceRecord, EffortCacheEntry, JobStatus, PeriodSummary, SportType, SyncJob,
    User, UserTokens, WindowType, BEST_EFFORT_KIND,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Emulator connection with a dummy bearer token.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let client = firestore::FirestoreDb::with_options_token_source(
            firestore::FirestoreDbOptions::new(project_id.to_string()),
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Offline client: every operation fails with a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Earliest or latest activity for an athlete.
    async fn edge_activity(
        &self,
        athlete_id: u64,
        direction: FirestoreQueryDirection,
    ) -> Result<Option<Activity>, AppError> {
        let found: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .order_by([("start_date", direction)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.into_iter().next())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Users & Tokens ──────────────────────────────────────────

    async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.strava_athlete_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_tokens(&self, athlete_id: u64) -> Result<Option<UserTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_tokens(&self, athlete_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(athlete_id.to_string())
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Activities ──────────────────────────────────────────────

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn activity_date_bounds(
        &self,
        athlete_id: u64,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
        let earliest = self
            .edge_activity(athlete_id, FirestoreQueryDirection::Ascending)
            .await?;
        let latest = self
            .edge_activity(athlete_id, FirestoreQueryDirection::Descending)
            .await?;
        Ok(earliest
            .zip(latest)
            .map(|(first, last)| (first.start_date, last.start_date)))
    }

    async fn activities_in_range(
        &self,
        athlete_id: u64,
        sport: SportType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, AppError> {
        let start = format_utc_rfc3339(start);
        let end = format_utc_rfc3339(end);
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("sport_type").eq(sport.as_str()),
                    q.field("start_date").greater_than_or_equal(start.clone()),
                    q.field("start_date").less_than(end.clone()),
                ])
            })
            .order_by([("start_date", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn recent_activities(
        &self,
        athlete_id: u64,
        sport: SportType,
        limit: usize,
    ) -> Result<Vec<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("sport_type").eq(sport.as_str()),
                ])
            })
            .order_by([("start_date", FirestoreQueryDirection::Descending)])
            .limit(u32::try_from(limit).unwrap_or(u32::MAX))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Effort Cache ────────────────────────────────────────────

    async fn get_effort_cache(
        &self,
        athlete_id: u64,
        activity_id: &str,
    ) -> Result<Option<EffortCacheEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EFFORT_CACHE)
            .obj()
            .one(&EffortCacheEntry::key(athlete_id, activity_id, BEST_EFFORT_KIND))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_effort_cache(&self, entry: &EffortCacheEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EFFORT_CACHE)
            .document_id(entry.document_id())
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Derived Records ─────────────────────────────────────────

    async fn upsert_period_summary(&self, summary: &PeriodSummary) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PERIOD_SUMMARIES)
            .document_id(summary.document_id())
            .object(summary)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_period_summary(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Option<PeriodSummary>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PERIOD_SUMMARIES)
            .obj()
            .one(&PeriodSummary::key(athlete_id, window_type, window_key, sport))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Concurrent upserts, bounded to avoid overloading Firestore.
    async fn upsert_distance_records(&self, records: &[DistanceRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(records)
            .map(|record| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::DISTANCE_RECORDS)
                    .document_id(record.document_id())
                    .object(record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .boxed()
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    /// Deletes stale targets first, then upserts the new set.
    async fn replace_distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
        records: &[DistanceRecord],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let existing = self
            .distance_records(athlete_id, window_type, window_key, sport)
            .await?;

        let stale: Vec<String> = existing
            .iter()
            .filter(|old| {
                !records
                    .iter()
                    .any(|new| new.distance_target == old.distance_target)
            })
            .map(DistanceRecord::document_id)
            .collect();

        for doc_id in &stale {
            client
                .fluent()
                .delete()
                .from(collections::DISTANCE_RECORDS)
                .document_id(doc_id)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        if !stale.is_empty() {
            tracing::debug!(
                athlete_id,
                window = %window_type,
                key = window_key,
                deleted = stale.len(),
                "Deleted stale distance records"
            );
        }

        self.upsert_distance_records(records).await
    }

    async fn distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Vec<DistanceRecord>, AppError> {
        let window_key = window_key.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DISTANCE_RECORDS)
            .filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("window_type").eq(window_type.as_str()),
                    q.field("window_key").eq(window_key.clone()),
                    q.field("sport_type").eq(sport.as_str()),
                ])
            })
            .order_by([("distance_target", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Sync Jobs ───────────────────────────────────────────────

    async fn put_sync_job(&self, job: &SyncJob) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SYNC_JOBS)
            .document_id(&job.id)
            .object(job)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_sync_job(&self, job_id: &str) -> Result<Option<SyncJob>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SYNC_JOBS)
            .obj()
            .one(job_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn latest_sync_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError> {
        let jobs: Vec<SyncJob> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SYNC_JOBS)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .order_by([("updated_at", FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(jobs.into_iter().next())
    }

    async fn latest_all_time_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError> {
        let jobs: Vec<SyncJob> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SYNC_JOBS)
            .filter(|q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("status").eq(JobStatus::Done.as_str()),
                    q.field("total_activities").is_not_null(),
                ])
            })
            .order_by([("updated_at", FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(jobs.into_iter().next())
    }
}
