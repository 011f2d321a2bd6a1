// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

/// Time budget for one mock test (1 hour).
pub const TEST_DURATION_SECS: u32 = 3600;

/// Minimum number of days between two attempts.
pub const COOLDOWN_DAYS: i64 = 7;

/// Largest accepted `COOLDOWN_DAYS`.
pub const MAX_COOLDOWN_DAYS: i64 = 365;

/// Countdown resolution.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How often idle sessions are looked for.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Longest a client waits on the event endpoint before getting 204.
pub const EVENT_POLL_TIMEOUT: Duration = Duration::from_secs(25);

pub const DEFAULT_API_BASE_URL: &str = "https://artwithvicky-backend.onrender.com";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 2 * 3600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the external REST backend (no trailing slash).
    pub api_base_url: String,
    pub bind_addr: String,
    pub rust_log: String,
    pub test_duration_secs: u32,
    pub cooldown_days: i64,
    pub request_timeout_secs: u64,
    /// Sessions without client requests for this long are evicted.
    pub session_idle_secs: u64,
    /// Optional bearer credentials forwarded to the backend.
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Timing knobs handed to every session controller.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub duration_secs: u32,
    pub cooldown_days: i64,
    pub tick_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: TEST_DURATION_SECS,
            cooldown_days: COOLDOWN_DAYS,
            tick_interval: TICK_INTERVAL,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let api_base_url = env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        Url::parse(&api_base_url).expect("API_BASE_URL must be a valid URL");

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let test_duration_secs = env::var("TEST_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(TEST_DURATION_SECS);

        let cooldown_days = parse_cooldown_days(env::var("COOLDOWN_DAYS").ok().as_deref())
            .expect("COOLDOWN_DAYS must be a whole number of days between 0 and 365");

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let session_idle_secs = env::var("SESSION_IDLE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_SECS);

        let access_token = env::var("API_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());
        let refresh_token = env::var("API_REFRESH_TOKEN").ok().filter(|t| !t.is_empty());

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bind_addr,
            rust_log,
            test_duration_secs,
            cooldown_days,
            request_timeout_secs,
            session_idle_secs,
            access_token,
            refresh_token,
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            duration_secs: self.test_duration_secs,
            cooldown_days: self.cooldown_days,
            tick_interval: TICK_INTERVAL,
        }
    }
}

/// Unset means the default. Anything set must be an integer in `0..=MAX_COOLDOWN_DAYS`.
fn parse_cooldown_days(raw: Option<&str>) -> Option<i64> {
    match raw {
        None => Some(COOLDOWN_DAYS),
        Some(raw) => raw
            .trim()
            .parse()
            .ok()
            .filter(|days| (0..=MAX_COOLDOWN_DAYS).contains(days)),
    }
}
