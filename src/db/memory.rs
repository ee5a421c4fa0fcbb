// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Same natural keys as the Firestore backend, held in concurrent maps.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{
    Activity, DistanceRecord, EffortCacheEntry, JobStatus, PeriodSummary,
    SportType, SyncJob, User, UserTokens, WindowType, BEST_EFFORT_KIND,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<u64, User>,
    tokens: DashMap<u64, UserTokens>,
    activities: DashMap<String, Activity>,
    effort_cache: DashMap<String, EffortCacheEntry>,
    summaries: DashMap<String, PeriodSummary>,
    records: DashMap<String, DistanceRecord>,
    jobs: DashMap<String, SyncJob>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored activities for an athlete, any sport, newest first.
    pub fn activities_for(&self, athlete_id: u64) -> Vec<Activity> {
        let mut found: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| a.athlete_id == athlete_id)
            .map(|a| a.value().clone())
            .collect();
        sort_newest_first(&mut found);
        found
    }

    pub fn effort_cache_len(&self) -> usize {
        self.effort_cache.len()
    }

    fn of_sport(&self, athlete_id: u64, sport: SportType) -> Vec<Activity> {
        let mut found: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| a.athlete_id == athlete_id && a.sport_type == sport)
            .map(|a| a.value().clone())
            .collect();
        sort_newest_first(&mut found);
        found
    }

    fn jobs_for(&self, athlete_id: u64) -> Vec<SyncJob> {
        let mut jobs: Vec<SyncJob> = self
            .jobs
            .iter()
            .filter(|j| j.athlete_id == athlete_id)
            .map(|j| j.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs
    }
}

fn sort_newest_first(activities: &mut [Activity]) {
    activities.sort_by(|a, b| b.start_date.cmp(&a.start_date).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&athlete_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.strava_athlete_id, user.clone());
        Ok(())
    }

    async fn get_tokens(&self, athlete_id: u64) -> Result<Option<UserTokens>, AppError> {
        Ok(self.tokens.get(&athlete_id).map(|t| t.clone()))
    }

    async fn set_tokens(&self, athlete_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        self.tokens.insert(athlete_id, tokens.clone());
        Ok(())
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.activities.insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn activity_date_bounds(
        &self,
        athlete_id: u64,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| a.athlete_id == athlete_id)
            .fold(None, |bounds, a| {
                let date = a.start_date;
                Some(match bounds {
                    None => (date, date),
                    Some((earliest, latest)) => (earliest.min(date), latest.max(date)),
                })
            }))
    }

    async fn activities_in_range(
        &self,
        athlete_id: u64,
        sport: SportType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, AppError> {
        Ok(self
            .of_sport(athlete_id, sport)
            .into_iter()
            .filter(|a| a.start_date >= start && a.start_date < end)
            .collect())
    }

    async fn recent_activities(
        &self,
        athlete_id: u64,
        sport: SportType,
        limit: usize,
    ) -> Result<Vec<Activity>, AppError> {
        let mut found = self.of_sport(athlete_id, sport);
        found.truncate(limit);
        Ok(found)
    }

    async fn get_effort_cache(
        &self,
        athlete_id: u64,
        activity_id: &str,
    ) -> Result<Option<EffortCacheEntry>, AppError> {
        let key = EffortCacheEntry::key(athlete_id, activity_id, BEST_EFFORT_KIND);
        Ok(self.effort_cache.get(&key).map(|e| e.clone()))
    }

    async fn put_effort_cache(&self, entry: &EffortCacheEntry) -> Result<(), AppError> {
        self.effort_cache.insert(entry.document_id(), entry.clone());
        Ok(())
    }

    async fn upsert_period_summary(&self, summary: &PeriodSummary) -> Result<(), AppError> {
        self.summaries.insert(summary.document_id(), summary.clone());
        Ok(())
    }

    async fn get_period_summary(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Option<PeriodSummary>, AppError> {
        let key = PeriodSummary::key(athlete_id, window_type, window_key, sport);
        Ok(self.summaries.get(&key).map(|s| s.clone()))
    }

    async fn upsert_distance_records(&self, records: &[DistanceRecord]) -> Result<(), AppError> {
        for record in records {
            self.records.insert(record.document_id(), record.clone());
        }
        Ok(())
    }

    async fn replace_distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
        records: &[DistanceRecord],
    ) -> Result<(), AppError> {
        self.records.retain(|_, r| {
            !(r.athlete_id == athlete_id
                && r.window_type == window_type
                && r.window_key == window_key
                && r.sport_type == sport)
        });
        self.upsert_distance_records(records).await
    }

    async fn distance_records(
        &self,
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport: SportType,
    ) -> Result<Vec<DistanceRecord>, AppError> {
        let mut found: Vec<DistanceRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.athlete_id == athlete_id
                    && r.window_type == window_type
                    && r.window_key == window_key
                    && r.sport_type == sport
            })
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|r| r.distance_target);
        Ok(found)
    }

    async fn put_sync_job(&self, job: &SyncJob) -> Result<(), AppError> {
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_sync_job(&self, job_id: &str) -> Result<Option<SyncJob>, AppError> {
        Ok(self.jobs.get(job_id).map(|j| j.clone()))
    }

    async fn latest_sync_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError> {
        Ok(self.jobs_for(athlete_id).into_iter().next())
    }

    async fn latest_all_time_job(&self, athlete_id: u64) -> Result<Option<SyncJob>, AppError> {
        Ok(self
            .jobs_for(athlete_id)
            .into_iter()
            .find(|j| j.status == JobStatus::Done && j.total_activities.is_some()))
    }
}
