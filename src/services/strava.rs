// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Paginated activity listing by time range
//! - Activity detail (best efforts) and distance/time streams
//! - Athlete aggregate stats used to size progress totals
//! - Token refresh
//!
//! Every response is decoded into a strict schema; a mismatch is an
//! [`AppError::Validation`] and fails the current sync step.

use crate::error::AppError;
use crate::models::{Activity, BestEffort, SportType};
use crate::time_utils::parse_rfc3339_utc;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Bound on every outbound call; a timeout fails the job.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Query for one page of the athlete's activity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityQuery {
    /// Unix seconds; only activities starting after this instant.
    pub after: Option<i64>,
    /// Unix seconds; only activities starting before this instant.
    pub before: Option<i64>,
    /// 1-based page index.
    pub page: u32,
    pub per_page: u32,
}

/// Read-only view of the fitness platform used by the sync engine.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;

    async fn list_activities(
        &self,
        access_token: &str,
        query: ActivityQuery,
    ) -> Result<Vec<StravaActivitySummary>, AppError>;

    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaActivityDetail, AppError>;

    async fn get_streams(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaStreams, AppError>;

    async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(anyhow::Error::from)?;

        Ok(Self {
            http,
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        })
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and decode the JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;
        decode_payload(&bytes)
    }
}

/// Decode a Strava response body against its schema.
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::Validation(e.to_string()))
}

#[async_trait]
impl ActivitySource for StravaClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    async fn list_activities(
        &self,
        access_token: &str,
        query: ActivityQuery,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.per_page.to_string()),
        ];
        if let Some(after) = query.after {
            params.push(("after", after.to_string()));
        }
        if let Some(before) = query.before {
            params.push(("before", before.to_string()));
        }
        self.get_json(&url, access_token, &params).await
    }

    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaActivityDetail, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token, &[("include_all_efforts", "false".to_string())])
            .await
    }

    async fn get_streams(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaStreams, AppError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        self.get_json(
            &url,
            access_token,
            &[
                ("keys", "distance,time".to_string()),
                ("key_by_type", "true".to_string()),
            ],
        )
        .await
    }

    async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError> {
        let url = format!("{}/athletes/{}/stats", self.base_url, athlete_id);
        self.get_json(&url, access_token, &[]).await
    }
}

// ─── Response Schemas ────────────────────────────────────────────────────────

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: Option<String>,
    pub sport_type: String,
    pub start_date: String,
    pub timezone: Option<String>,
    pub distance: f64,
    pub moving_time: u32,
    pub elapsed_time: u32,
    pub total_elevation_gain: f64,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
    pub map: Option<StravaMap>,
}

impl StravaActivitySummary {
    /// Convert to the stored model. An unparsable start date is a schema error.
    pub fn into_activity(self, athlete_id: u64) -> Result<Activity, AppError> {
        let start_date = parse_rfc3339_utc(&self.start_date).ok_or_else(|| {
            AppError::Validation(format!(
                "activity {}: invalid start_date {:?}",
                self.id, self.start_date
            ))
        })?;
        let latlng = self.start_latlng.as_deref().unwrap_or_default();

        Ok(Activity {
            id: self.id.to_string(),
            athlete_id,
            name: self.name,
            start_date,
            timezone: self.timezone,
            sport_type: SportType::from_strava(&self.sport_type),
            distance: self.distance,
            moving_time: self.moving_time,
            elapsed_time: self.elapsed_time,
            elevation_gain: self.total_elevation_gain,
            average_speed: self.average_speed.unwrap_or(0.0),
            max_speed: self.max_speed.unwrap_or(0.0),
            average_heartrate: self.average_heartrate,
            summary_polyline: self.map.and_then(|m| m.summary_polyline),
            start_lat: latlng.first().copied(),
            start_lng: latlng.get(1).copied(),
        })
    }
}

/// Activity map data.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    pub summary_polyline: Option<String>,
}

/// Detailed activity; only the best-effort splits are used.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivityDetail {
    pub id: u64,
    pub best_efforts: Option<Vec<StravaBestEffort>>,
}

impl StravaActivityDetail {
    /// Best efforts as cache entries; absent means none.
    pub fn into_best_efforts(self) -> Vec<BestEffort> {
        self.best_efforts
            .unwrap_or_default()
            .into_iter()
            .map(|e| BestEffort {
                name: e.name,
                elapsed_time: e.elapsed_time,
                moving_time: e.moving_time,
                distance: e.distance,
            })
            .collect()
    }
}

/// One best-effort split as returned by Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaBestEffort {
    pub name: String,
    pub elapsed_time: u32,
    pub moving_time: u32,
    pub distance: f64,
}

/// Streams keyed by type (`key_by_type=true`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaStreams {
    pub distance: Option<StravaStream>,
    pub time: Option<StravaStream>,
}

impl StravaStreams {
    /// Distance and time samples, if both are present and non-empty.
    pub fn distance_and_time(&self) -> Option<(&[f64], &[f64])> {
        let distance = self.distance.as_ref().map(|s| s.data.as_slice())?;
        let time = self.time.as_ref().map(|s| s.data.as_slice())?;
        (!distance.is_empty() && !time.is_empty()).then_some((distance, time))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StravaStream {
    pub data: Vec<f64>,
}

/// Lifetime totals per sport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaAthleteStats {
    #[serde(default)]
    pub all_run_totals: StravaTotals,
    #[serde(default)]
    pub all_ride_totals: StravaTotals,
    #[serde(default)]
    pub all_swim_totals: StravaTotals,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaTotals {
    #[serde(default)]
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = r#"{
        "id": 1234567,
        "name": "Morning Run",
        "sport_type": "TrailRun",
        "start_date": "2024-03-10T08:00:00Z",
        "timezone": "(GMT-08:00) America/Los_Angeles",
        "distance": 10012.4,
        "moving_time": 3010,
        "elapsed_time": 3100,
        "total_elevation_gain": 120.5,
        "average_speed": 3.326,
        "max_speed": 5.1,
        "start_latlng": [37.39, -122.18],
        "map": {"id": "a1", "summary_polyline": "abc", "resource_state": 2},
        "kudos_count": 4
    }"#;

    #[test]
    fn test_summary_decodes_and_converts() {
        let summary: StravaActivitySummary = decode_payload(SUMMARY.as_bytes()).unwrap();
        let activity = summary.into_activity(99).unwrap();
        assert_eq!(activity.id, "1234567");
        assert_eq!(activity.athlete_id, 99);
        assert_eq!(activity.sport_type, SportType::Run);
        assert_eq!(activity.elevation_gain, 120.5);
        assert_eq!(activity.start_lat, Some(37.39));
        assert_eq!(activity.start_lng, Some(-122.18));
        assert_eq!(activity.summary_polyline.as_deref(), Some("abc"));
        assert_eq!(activity.average_heartrate, None);
    }

    #[test]
    fn test_empty_latlng_is_absent() {
        let raw = SUMMARY.replace("[37.39, -122.18]", "[]");
        let summary: StravaActivitySummary = decode_payload(raw.as_bytes()).unwrap();
        let activity = summary.into_activity(1).unwrap();
        assert_eq!(activity.start_lat, None);
        assert_eq!(activity.start_lng, None);
    }

    #[test]
    fn test_schema_mismatch_is_validation_error() {
        let raw = SUMMARY.replace("3010", "\"fast\"");
        let err = decode_payload::<StravaActivitySummary>(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = decode_payload::<Vec<StravaActivitySummary>>(b"{\"message\": \"oops\"}").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_bad_start_date_is_validation_error() {
        let raw = SUMMARY.replace("2024-03-10T08:00:00Z", "last tuesday");
        let summary: StravaActivitySummary = decode_payload(raw.as_bytes()).unwrap();
        assert!(matches!(summary.into_activity(1), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_detail_without_best_efforts_is_empty() {
        let detail: StravaActivityDetail = decode_payload(br#"{"id": 5}"#).unwrap();
        assert!(detail.into_best_efforts().is_empty());

        let detail: StravaActivityDetail = decode_payload(
            br#"{"id": 5, "best_efforts": [{"id": 1, "name": "5k", "elapsed_time": 1300, "moving_time": 1290, "distance": 5000, "pr_rank": 1}]}"#,
        )
        .unwrap();
        let efforts = detail.into_best_efforts();
        assert_eq!(efforts.len(), 1);
        assert_eq!(efforts[0].elapsed_time, 1300);
    }

    #[test]
    fn test_streams_require_both_series() {
        let streams: StravaStreams = decode_payload(
            br#"{"distance": {"data": [0, 10, 20], "series_type": "distance"}, "time": {"data": [0, 3, 6]}}"#,
        )
        .unwrap();
        let (d, t) = streams.distance_and_time().unwrap();
        assert_eq!(d, &[0.0, 10.0, 20.0]);
        assert_eq!(t, &[0.0, 3.0, 6.0]);

        let partial: StravaStreams = decode_payload(br#"{"time": {"data": [0, 1]}}"#).unwrap();
        assert!(partial.distance_and_time().is_none());
    }

    #[test]
    fn test_athlete_stats_defaults_missing_totals() {
        let stats: StravaAthleteStats =
            decode_payload(br#"{"all_run_totals": {"count": 120, "distance": 1.0}}"#).unwrap();
        assert_eq!(stats.all_run_totals.count, 120);
        assert_eq!(stats.all_ride_totals.count, 0);
    }
}
