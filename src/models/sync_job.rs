// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync job model and the read-only status snapshot exposed to pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Job lifecycle. DONE and ERROR are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// Stored form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// Progress-tracked unit of work that imports activities and recomputes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub athlete_id: u64,
    pub status: JobStatus,
    pub phase: String,
    pub processed_steps: u32,
    pub total_steps: Option<u32>,
    pub total_activities: Option<u32>,
    pub detail_fetched: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// New PENDING job with a fresh UUID.
    pub fn queued(athlete_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            athlete_id,
            status: JobStatus::Pending,
            phase: "Queued".to_string(),
            processed_steps: 0,
            total_steps: None,
            total_activities: None,
            detail_fetched: 0,
            error_message: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> JobStatusSnapshot {
        JobStatusSnapshot {
            status: self.status,
            phase: self.phase.clone(),
            processed_steps: self.processed_steps,
            total_steps: self.total_steps,
            total_activities: self.total_activities,
            detail_fetched: self.detail_fetched,
            error_message: self.error_message.clone(),
        }
    }
}

/// Status contract returned to external pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JobStatusSnapshot {
    pub status: JobStatus,
    pub phase: String,
    pub processed_steps: u32,
    pub total_steps: Option<u32>,
    pub total_activities: Option<u32>,
    pub detail_fetched: u32,
    pub error_message: Option<String>,
}
