// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived records: per-window totals and best times per distance target.

use crate::models::SportType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Canonical distance targets in meters (400m through the marathon).
///
/// Part of the external contract: consumers must use exactly these values.
pub const DISTANCE_TARGETS: [u32; 12] = [
    400, 805, 1000, 1609, 3219, 5000, 10000, 15000, 16093, 20000, 21097, 42195,
];

/// Named calendar or rolling time range for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum WindowType {
    Week,
    Month,
    #[serde(rename = "LAST_2M")]
    Last2M,
    #[serde(rename = "LAST_6M")]
    Last6M,
    #[serde(rename = "LAST_365")]
    Last365,
    Year,
    LastYear,
    AllTime,
}

impl WindowType {
    pub const ALL: [WindowType; 8] = [
        WindowType::Week,
        WindowType::Month,
        WindowType::Last2M,
        WindowType::Last6M,
        WindowType::Last365,
        WindowType::Year,
        WindowType::LastYear,
        WindowType::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Week => "WEEK",
            WindowType::Month => "MONTH",
            WindowType::Last2M => "LAST_2M",
            WindowType::Last6M => "LAST_6M",
            WindowType::Last365 => "LAST_365",
            WindowType::Year => "YEAR",
            WindowType::LastYear => "LAST_YEAR",
            WindowType::AllTime => "ALL_TIME",
        }
    }

    /// Whether totals and records for this window are persisted by the job
    /// runner. LAST_365 is always computed on read.
    pub fn uses_persisted_summary(&self) -> bool {
        !matches!(self, WindowType::Last365)
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowType::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| format!("unknown window type: {s}"))
    }
}

/// A best-time candidate for one distance target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCandidate {
    pub distance_target: u32,
    pub best_time_seconds: u32,
    pub activity_id: String,
    pub achieved_at: DateTime<Utc>,
}

/// Persisted best time, keyed by
/// (athlete, window type, window key, sport, distance target).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DistanceRecord {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub window_type: WindowType,
    pub window_key: String,
    pub sport_type: SportType,
    pub distance_target: u32,
    pub best_time_seconds: u32,
    pub activity_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub achieved_at: DateTime<Utc>,
}

impl DistanceRecord {
    pub fn from_candidate(
        athlete_id: u64,
        window_type: WindowType,
        window_key: &str,
        sport_type: SportType,
        candidate: RecordCandidate,
    ) -> Self {
        Self {
            athlete_id,
            window_type,
            window_key: window_key.to_string(),
            sport_type,
            distance_target: candidate.distance_target,
            best_time_seconds: candidate.best_time_seconds,
            activity_id: candidate.activity_id,
            achieved_at: candidate.achieved_at,
        }
    }

    /// Natural-key document ID.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.athlete_id, self.window_type, self.window_key, self.sport_type, self.distance_target
        )
    }
}

/// Aggregate totals over a window's activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Totals {
    /// Meters
    pub total_distance: f64,
    /// Seconds
    pub total_moving_time: u64,
    /// Meters
    pub total_elevation_gain: f64,
    pub activity_count: u32,
    /// Meters per second over moving time
    pub avg_speed: f64,
}

/// Standout activities within a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BestActivityIds {
    pub longest_run_id: Option<String>,
    pub fastest_avg_id: Option<String>,
    pub biggest_climb_id: Option<String>,
}

/// Persisted window summary, keyed by (athlete, period type, period key, sport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PeriodSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub period_type: WindowType,
    pub period_key: String,
    pub sport_type: SportType,
    pub totals: Totals,
    pub best_activity_ids: BestActivityIds,
}

impl PeriodSummary {
    /// Natural-key document ID.
    pub fn document_id(&self) -> String {
        Self::key(self.athlete_id, self.period_type, &self.period_key, self.sport_type)
    }

    pub fn key(athlete_id: u64, period_type: WindowType, period_key: &str, sport: SportType) -> String {
        format!("{athlete_id}_{period_type}_{period_key}_{sport}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_type_wire_names() {
        for window in WindowType::ALL {
            let json = serde_json::to_string(&window).unwrap();
            assert_eq!(json, format!("\"{}\"", window.as_str()));
            assert_eq!(window.as_str().parse::<WindowType>().unwrap(), window);
        }
    }

    #[test]
    fn test_only_last_365_is_computed_live() {
        let live: Vec<_> = WindowType::ALL
            .into_iter()
            .filter(|w| !w.uses_persisted_summary())
            .collect();
        assert_eq!(live, vec![WindowType::Last365]);
    }

    #[test]
    fn test_distance_targets_sorted_and_unique() {
        assert!(DISTANCE_TARGETS.windows(2).all(|w| w[0] < w[1]));
    }
}
