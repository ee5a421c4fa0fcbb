//! User model for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile. The Strava athlete ID doubles as the user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub created_at: String,
}

/// User's OAuth tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl UserTokens {
    /// True if the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at <= now + chrono::Duration::seconds(margin_secs)
    }
}
