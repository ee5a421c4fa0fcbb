// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod effort;
pub mod record;
pub mod sync_job;
pub mod user;

pub use activity::{Activity, SportType};
pub use effort::{
    cached_best_efforts, BestEffort, EffortCacheEntry, EffortPayload, BEST_EFFORT_KIND,
};
pub use record::{
    BestActivityIds, DistanceRecord, PeriodSummary, RecordCandidate, Totals, WindowType,
    DISTANCE_TARGETS,
};
pub use sync_job::{JobStatus, JobStatusSnapshot, SyncJob};
pub use user::{User, UserTokens};
