// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached per-activity effort payloads.

use serde::{Deserialize, Serialize};

/// Cache kind for Strava best-effort splits.
pub const BEST_EFFORT_KIND: &str = "best_effort";

/// One Strava best-effort split within an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BestEffort {
    /// Strava label ("5k", "Half-Marathon", "1 mile", ...)
    pub name: String,
    /// Seconds
    pub elapsed_time: u32,
    /// Seconds
    pub moving_time: u32,
    /// Meters actually covered by the split
    pub distance: f64,
}

/// Kind-discriminated cache payload.
///
/// Stored as `{"kind": "best_effort", "data": [...]}`; any other shape is a
/// parse error rather than an empty cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EffortPayload {
    BestEffort(Vec<BestEffort>),
}

impl EffortPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EffortPayload::BestEffort(_) => BEST_EFFORT_KIND,
        }
    }

    pub fn best_efforts(&self) -> &[BestEffort] {
        match self {
            EffortPayload::BestEffort(efforts) => efforts,
        }
    }
}

/// Effort cache entry, keyed by (athlete, activity, kind).
///
/// Written once when an activity's detail is first fetched and never
/// invalidated by later syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortCacheEntry {
    pub athlete_id: u64,
    pub activity_id: String,
    pub payload: EffortPayload,
}

impl EffortCacheEntry {
    pub fn best_efforts(athlete_id: u64, activity_id: &str, efforts: Vec<BestEffort>) -> Self {
        Self {
            athlete_id,
            activity_id: activity_id.to_string(),
            payload: EffortPayload::BestEffort(efforts),
        }
    }

    /// Natural-key document ID.
    pub fn document_id(&self) -> String {
        Self::key(self.athlete_id, &self.activity_id, self.payload.kind())
    }

    pub fn key(athlete_id: u64, activity_id: &str, kind: &str) -> String {
        format!("{athlete_id}_{activity_id}_{kind}")
    }
}

/// Best efforts from an optional cache entry; absence means no efforts.
pub fn cached_best_efforts(entry: Option<&EffortCacheEntry>) -> &[BestEffort] {
    entry.map_or(&[], |e| e.payload.best_efforts())
}
