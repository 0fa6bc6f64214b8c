//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use std::path::PathBuf;

use crate::picks::builder::{BuilderConfig, DEFAULT_JUICE};
use crate::predictions::RetryPolicy;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // The Odds API
    pub odds_api_key: String,
    pub odds_api_base_url: String,
    pub odds_regions: Vec<String>,
    pub odds_markets: Vec<String>,
    pub odds_bookmakers: Vec<String>,
    pub prop_markets: Vec<String>,
    pub sports: Vec<String>,

    // Polling
    pub odds_poll_interval_seconds: f64,
    pub scores_poll_interval_seconds: f64,
    pub scores_days_from: u32,
    pub odds_cache_ttl_seconds: i64,

    // HTTP client
    pub api_rate_limit: u32,
    pub api_max_retries: u32,
    pub api_timeout_seconds: u64,

    // Picks
    pub picks_path: PathBuf,
    pub kelly_fraction: f64,
    pub value_edge_threshold: f64,
    pub default_juice: i32,

    // Prediction source
    pub prediction_max_attempts: u32,
    pub prediction_retry_delay_ms: u64,

    // Reporting
    pub stats_report_interval_seconds: f64,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();

        Self {
            odds_api_key: env_str("ODDS_API_KEY", ""),
            odds_api_base_url: env_str("ODDS_API_BASE_URL", "https://api.the-odds-api.com"),
            odds_regions: env_csv_default("ODDS_REGIONS", "us"),
            odds_markets: env_csv_default("ODDS_MARKETS", "h2h,spreads,totals"),
            odds_bookmakers: env_csv("ODDS_BOOKMAKERS"),
            prop_markets: env_csv("PROP_MARKETS"),
            sports: env_csv_default("SPORTS", "basketball_nba,americanfootball_nfl,icehockey_nhl"),

            odds_poll_interval_seconds: env_f64("ODDS_POLL_INTERVAL_SECONDS", 300.0),
            scores_poll_interval_seconds: env_f64("SCORES_POLL_INTERVAL_SECONDS", 600.0),
            scores_days_from: env_parse("SCORES_DAYS_FROM", 1),
            odds_cache_ttl_seconds: env_parse("ODDS_CACHE_TTL_SECONDS", 300),

            api_rate_limit: env_parse("API_RATE_LIMIT", 5),
            api_max_retries: env_parse("API_MAX_RETRIES", 3),
            api_timeout_seconds: env_parse("API_TIMEOUT_SECONDS", 15),

            picks_path: PathBuf::from(env_str("PICKS_PATH", "data/picks.json")),
            kelly_fraction: env_f64("KELLY_FRACTION", 0.25),
            value_edge_threshold: env_f64("VALUE_EDGE_THRESHOLD", 5.0),
            default_juice: env_parse("DEFAULT_JUICE", DEFAULT_JUICE),

            prediction_max_attempts: env_parse("PREDICTION_MAX_ATTEMPTS", 3),
            prediction_retry_delay_ms: env_parse("PREDICTION_RETRY_DELAY_MS", 1000),

            stats_report_interval_seconds: env_f64("STATS_REPORT_INTERVAL_SECONDS", 900.0),

            log_level: env_str("LOG_LEVEL", "info"),
            log_json: env_bool("LOG_JSON", false),
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.odds_api_key.is_empty() {
            errors.push("ODDS_API_KEY is required".to_string());
        }

        if self.sports.is_empty() {
            errors.push("SPORTS must list at least one sport key".to_string());
        }

        if self.odds_regions.is_empty() && self.odds_bookmakers.is_empty() {
            errors.push("ODDS_REGIONS or ODDS_BOOKMAKERS must be set".to_string());
        }

        for (key, seconds) in [
            ("ODDS_POLL_INTERVAL_SECONDS", self.odds_poll_interval_seconds),
            ("SCORES_POLL_INTERVAL_SECONDS", self.scores_poll_interval_seconds),
            ("STATS_REPORT_INTERVAL_SECONDS", self.stats_report_interval_seconds),
        ] {
            if !is_valid_interval(seconds) {
                errors.push(format!("{key} must be a finite number of seconds > 0"));
            }
        }

        if !(1..=3).contains(&self.scores_days_from) {
            errors.push("SCORES_DAYS_FROM must be in [1, 3]".to_string());
        }

        if self.odds_cache_ttl_seconds <= 0 {
            errors.push("ODDS_CACHE_TTL_SECONDS must be > 0".to_string());
        }

        if self.api_rate_limit == 0 {
            errors.push("API_RATE_LIMIT must be > 0".to_string());
        }

        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            errors.push("KELLY_FRACTION must be in (0, 1]".to_string());
        }

        if !self.value_edge_threshold.is_finite() {
            errors.push("VALUE_EDGE_THRESHOLD must be a finite number".to_string());
        }

        if self.default_juice > -100 && self.default_juice < 100 {
            errors.push("DEFAULT_JUICE must be American odds (<= -100 or >= 100)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            value_edge_threshold: self.value_edge_threshold,
            default_juice: self.default_juice,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.prediction_max_attempts,
            fixed_delay: std::time::Duration::from_millis(self.prediction_retry_delay_ms),
        }
    }
}

/// Upper bound keeps `Duration::from_secs_f64` from overflowing.
const MAX_INTERVAL_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

fn is_valid_interval(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0 && seconds <= MAX_INTERVAL_SECONDS
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_parse(key, default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_csv(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| split_csv(&v))
        .unwrap_or_default()
}

fn env_csv_default(key: &str, default: &str) -> Vec<String> {
    split_csv(&std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
