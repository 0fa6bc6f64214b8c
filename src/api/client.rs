//! Async REST client for The Odds API (v4).
//!
//! Features:
//! - Rate limiting (configurable, default 5 req/sec)
//! - Automatic retries with exponential backoff
//! - Usage quota tracking from `x-requests-used` / `x-requests-remaining`
//! - Typed responses (`OddsEvent`, `ScoreEvent`)

use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::models::{OddsEvent, ScoreEvent};

use super::errors::ApiError;

/// Request credits reported by the last response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiQuota {
    pub requests_used: u64,
    pub requests_remaining: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub regions: String,
    /// Comma-separated game market keys for the bulk odds endpoint.
    pub markets: String,
    /// Optional comma-separated bookmaker filter (overrides regions).
    pub bookmakers: Option<String>,
    pub rate_limit: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.odds_api_key.clone(),
            base_url: settings.odds_api_base_url.clone(),
            regions: settings.odds_regions.join(","),
            markets: settings.odds_markets.join(","),
            bookmakers: (!settings.odds_bookmakers.is_empty())
                .then(|| settings.odds_bookmakers.join(",")),
            rate_limit: settings.api_rate_limit,
            max_retries: settings.api_max_retries,
            timeout_secs: settings.api_timeout_seconds,
        }
    }
}

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Async REST client for The Odds API.
pub struct OddsApiClient {
    config: ClientConfig,
    base_url: String,
    client: Client,
    rate_limiter: Arc<DirectLimiter>,
    last_quota: Mutex<Option<ApiQuota>>,
}

impl OddsApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            client,
            rate_limiter,
            last_quota: Mutex::new(None),
        })
    }

    pub fn last_quota(&self) -> Option<ApiQuota> {
        *self.last_quota.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_quota(&self, headers: &HeaderMap) {
        let Some(quota) = parse_quota(headers) else {
            return;
        };
        debug!(
            used = quota.requests_used,
            remaining = quota.requests_remaining,
            "Odds API quota"
        );
        if quota.requests_remaining == 0 {
            warn!(used = quota.requests_used, "Odds API quota exhausted");
        }
        *self.last_quota.lock().unwrap_or_else(|e| e.into_inner()) = Some(quota);
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        if let Some(quota) = self.last_quota() {
            if quota.requests_remaining == 0 {
                return Err(ApiError::QuotaExhausted {
                    used: quota.requests_used,
                });
            }
        }

        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<ApiError> = None;
        let attempts = self.config.max_retries.max(1);

        for attempt in 0..attempts {
            self.rate_limiter.until_ready().await;

            debug!(path = %path, attempt = attempt + 1, "Odds API request");

            let result = self
                .client
                .get(&url)
                .query(&[("apiKey", self.config.api_key.as_str())])
                .query(params)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    self.record_quota(response.headers());

                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| ApiError::Network(e.to_string()))?;
                        return serde_json::from_str(&text)
                            .map_err(|e| ApiError::Deserialization(e.to_string()));
                    }

                    // Rate limit: always retry
                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(retry_after, attempt = attempt + 1, "Rate limited");
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        last_error = Some(ApiError::RateLimited { retry_after });
                        continue;
                    }

                    // Server errors: retry with backoff
                    if status.is_server_error() {
                        let delay_ms = 500 * 2u64.pow(attempt);
                        warn!(
                            status_code = status.as_u16(),
                            delay_ms,
                            attempt = attempt + 1,
                            "Server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        last_error = Some(ApiError::Http {
                            status_code: status.as_u16(),
                            error_code: "SERVER_ERROR".to_string(),
                            message: status.to_string(),
                        });
                        continue;
                    }

                    // Client errors: no retry
                    let used = self.last_quota().map(|q| q.requests_used).unwrap_or(0);
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(ApiError::from_response(status.as_u16(), &body_text, used));
                }
                Err(e) => {
                    let delay_ms = 500 * 2u64.pow(attempt);
                    warn!(
                        error = %e,
                        delay_ms,
                        attempt = attempt + 1,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                    last_error = Some(if e.is_timeout() {
                        ApiError::Timeout(e.to_string())
                    } else {
                        ApiError::Network(e.to_string())
                    });
                }
            }
        }

        Err(ApiError::MaxRetriesExceeded {
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Game markets (h2h/spreads/totals) for every upcoming event of a sport.
    pub async fn fetch_odds(&self, sport: &str) -> Result<Vec<OddsEvent>, ApiError> {
        let path = format!("/v4/sports/{sport}/odds");
        let params = self.odds_params(&self.config.markets);
        let events: Vec<OddsEvent> = self.request(&path, &params).await?;
        debug!(sport, events = events.len(), "Fetched odds");
        Ok(events)
    }

    /// Any markets (props, alternates, periods) for one event.
    pub async fn fetch_event_odds(
        &self,
        sport: &str,
        event_id: &str,
        markets: &[String],
    ) -> Result<OddsEvent, ApiError> {
        let path = format!("/v4/sports/{sport}/events/{event_id}/odds");
        let params = self.odds_params(&markets.join(","));
        self.request(&path, &params).await
    }

    /// Live and recently completed games. `days_from` is clamped to 1..=3.
    pub async fn fetch_scores(
        &self,
        sport: &str,
        days_from: u32,
    ) -> Result<Vec<ScoreEvent>, ApiError> {
        let path = format!("/v4/sports/{sport}/scores");
        let params = [
            ("daysFrom", days_from.clamp(1, 3).to_string()),
            ("dateFormat", "iso".to_string()),
        ];
        let events: Vec<ScoreEvent> = self.request(&path, &params).await?;
        info!(
            sport,
            events = events.len(),
            completed = events.iter().filter(|e| e.completed).count(),
            "Fetched scores"
        );
        Ok(events)
    }

    fn odds_params(&self, markets: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("markets", markets.to_string()),
            ("oddsFormat", "decimal".to_string()),
            ("dateFormat", "iso".to_string()),
        ];
        match &self.config.bookmakers {
            Some(books) => params.push(("bookmakers", books.clone())),
            None => params.push(("regions", self.config.regions.clone())),
        }
        params
    }
}

/// Quota headers may be integers or floats ("14527.0").
fn parse_quota(headers: &HeaderMap) -> Option<ApiQuota> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v as u64)
    };
    Some(ApiQuota {
        requests_used: read("x-requests-used")?,
        requests_remaining: read("x-requests-remaining")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn config(bookmakers: Option<&str>) -> ClientConfig {
        ClientConfig {
            api_key: "key".to_string(),
            base_url: "https://api.the-odds-api.com/".to_string(),
            regions: "us".to_string(),
            markets: "h2h,spreads,totals".to_string(),
            bookmakers: bookmakers.map(str::to_string),
            rate_limit: 0,
            max_retries: 3,
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_parse_quota_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-requests-used", HeaderValue::from_static("14527.0"));
        headers.insert("x-requests-remaining", HeaderValue::from_static("473"));
        assert_eq!(
            parse_quota(&headers),
            Some(ApiQuota {
                requests_used: 14527,
                requests_remaining: 473
            })
        );
        assert_eq!(parse_quota(&HeaderMap::new()), None);
    }

    #[test]
    fn test_odds_params_region_or_bookmakers() {
        let client = OddsApiClient::new(config(None)).unwrap();
        assert_eq!(client.base_url, "https://api.the-odds-api.com");
        let params = client.odds_params("h2h");
        assert!(params.contains(&("regions", "us".to_string())));
        assert!(params.contains(&("oddsFormat", "decimal".to_string())));

        let client = OddsApiClient::new(config(Some("draftkings,fanduel"))).unwrap();
        let params = client.odds_params("player_points");
        assert!(params.contains(&("bookmakers", "draftkings,fanduel".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "regions"));
    }

    #[tokio::test]
    async fn test_exhausted_quota_short_circuits() {
        let client = OddsApiClient::new(config(None)).unwrap();
        *client.last_quota.lock().unwrap() = Some(ApiQuota {
            requests_used: 500,
            requests_remaining: 0,
        });
        let err = client.fetch_odds("basketball_nba").await.unwrap_err();
        assert!(matches!(err, ApiError::QuotaExhausted { used: 500 }));
    }
}
