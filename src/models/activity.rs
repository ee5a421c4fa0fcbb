// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Coarse sport classification used for totals and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SportType {
    Run,
    Ride,
    Other,
}

impl SportType {
    /// Classify a Strava `sport_type` ("TrailRun", "GravelRide", "EBikeRide", ...).
    pub fn from_strava(sport_type: &str) -> Self {
        let lower = sport_type.to_lowercase();
        if lower.contains("run") {
            SportType::Run
        } else if lower.contains("ride") || lower.contains("bike") || lower.contains("cycling") {
            SportType::Ride
        } else {
            SportType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SportType::Run => "RUN",
            SportType::Ride => "RIDE",
            SportType::Other => "OTHER",
        }
    }
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored activity record.
///
/// Keyed by the Strava activity ID. Identity never changes; every other
/// field is overwritten on each sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub id: String,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    pub name: Option<String>,
    pub start_date: DateTime<Utc>,
    /// Strava's timezone label, e.g. "(GMT-08:00) America/Los_Angeles"
    pub timezone: Option<String>,
    pub sport_type: SportType,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: u32,
    /// Elapsed time in seconds
    pub elapsed_time: u32,
    /// Total elevation gain in meters
    pub elevation_gain: f64,
    /// Meters per second
    pub average_speed: f64,
    pub max_speed: f64,
    pub average_heartrate: Option<f64>,
    pub summary_polyline: Option<String>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
}

impl Activity {
    /// Pace in seconds per kilometer, if it can be derived.
    pub fn pace_seconds_per_km(&self) -> Option<f64> {
        if self.distance > 0.0 && self.moving_time > 0 {
            Some(f64::from(self.moving_time) / (self.distance / 1000.0))
        } else if self.average_speed > 0.0 {
            Some(1000.0 / self.average_speed)
        } else {
            None
        }
    }
}
