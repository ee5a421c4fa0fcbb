//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Default number of best-effort detail fetches per incremental sync.
pub const DEFAULT_DETAIL_BUDGET: u32 = 25;
/// Default delay between sequential Strava detail/stream calls.
pub const DEFAULT_PACING_MS: u64 = 200;
/// Pacing delay is kept inside this window to stay under Strava's quotas.
const PACING_RANGE_MS: (u64, u64) = (120, 200);
/// Default number of recent runs swept for stream-based all-time records.
pub const DEFAULT_STREAM_SWEEP_LIMIT: usize = 200;

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub storage: StorageBackend,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Sync tuning ---
    pub sync: SyncSettings,
}

/// Knobs handed to the sync orchestrator and job runner.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Detail fetches allowed per incremental sync when `details` is off.
    pub detail_budget: u32,
    /// Delay between sequential outbound detail/stream calls.
    pub pacing: Duration,
    /// Most recent runs considered by the stream sweep.
    pub stream_sweep_limit: usize,
    /// Athlete's offset from UTC in minutes (east positive).
    pub tz_offset_minutes: i32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            detail_budget: DEFAULT_DETAIL_BUDGET,
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
            stream_sweep_limit: DEFAULT_STREAM_SWEEP_LIMIT,
            tz_offset_minutes: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let pacing_ms = parse_or("SYNC_PACING_MS", DEFAULT_PACING_MS)?
            .clamp(PACING_RANGE_MS.0, PACING_RANGE_MS.1);

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            storage: env::var("STORAGE_BACKEND")
                .map(|v| StorageBackend::parse(&v))
                .unwrap_or(Ok(StorageBackend::Firestore))?,

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),

            sync: SyncSettings {
                detail_budget: parse_or("SYNC_DETAIL_BUDGET", DEFAULT_DETAIL_BUDGET)?,
                pacing: Duration::from_millis(pacing_ms),
                stream_sweep_limit: parse_or("STREAM_SWEEP_LIMIT", DEFAULT_STREAM_SWEEP_LIMIT)?,
                tz_offset_minutes: parse_or("TZ_OFFSET_MINUTES", 0)?,
            },
        })
    }

    /// Config for tests: in-memory storage, no pacing delay.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage: StorageBackend::Memory,
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            sync: SyncSettings {
                pacing: Duration::ZERO,
                ..SyncSettings::default()
            },
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
