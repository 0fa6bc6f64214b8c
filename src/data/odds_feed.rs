//! Sportsbook odds feed from The Odds API.
//!
//! Polls every configured sport concurrently, normalizes the bookmaker
//! payloads, stores the result in the TTL cache and forwards each
//! sport's snapshot to the pick pipeline.
//!
//! Player props cost one request per event, so they are only fetched
//! when prop markets are configured.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::client::OddsApiClient;
use crate::api::errors::ApiError;
use crate::data::models::OddsEvent;
use crate::odds::markets::{normalize_games, NormalizedGameOdds};
use crate::odds::props::{normalize_props, PropsBoard};
use crate::shutdown::Shutdown;
use crate::state::cache::TtlCache;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct OddsFeedConfig {
    /// How often to poll. Default 300s to conserve request credits.
    pub poll_interval: Duration,
    /// Odds API sport keys, e.g. `basketball_nba`.
    pub sports: Vec<String>,
    /// Per-event prop market keys; empty disables prop fetching.
    pub prop_markets: Vec<String>,
}

impl Default for OddsFeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            sports: vec!["basketball_nba".to_string()],
            prop_markets: Vec::new(),
        }
    }
}

/// Normalized board for one sport at one point in time.
#[derive(Debug, Clone)]
pub struct OddsSnapshot {
    pub sport: String,
    pub games: Vec<NormalizedGameOdds>,
    pub props: Vec<PropsBoard>,
    pub fetched_at: DateTime<Utc>,
}

impl OddsSnapshot {
    /// Normalize a raw odds response for `sport`.
    pub fn from_events(sport: &str, events: &[OddsEvent], fetched_at: DateTime<Utc>) -> Self {
        let games = normalize_games(events);
        let issues: usize = games.iter().map(|g| g.issues.len()).sum();
        if issues > 0 {
            debug!(sport, issues, "Normalization skipped entries");
        }
        Self {
            sport: sport.to_string(),
            games,
            props: Vec::new(),
            fetched_at,
        }
    }

    pub fn game(&self, game_id: &str) -> Option<&NormalizedGameOdds> {
        self.games.iter().find(|g| g.game_id == game_id)
    }
}

pub fn odds_cache_key(sport: &str) -> String {
    format!("odds:{sport}")
}

// =============================================================================
// Odds Feed
// =============================================================================

pub struct OddsFeed {
    client: Arc<OddsApiClient>,
    cache: TtlCache<Arc<OddsSnapshot>>,
    config: OddsFeedConfig,
    sender: mpsc::UnboundedSender<Arc<OddsSnapshot>>,
    shutdown: Shutdown,
}

impl OddsFeed {
    pub fn new(
        client: Arc<OddsApiClient>,
        cache: TtlCache<Arc<OddsSnapshot>>,
        config: OddsFeedConfig,
        sender: mpsc::UnboundedSender<Arc<OddsSnapshot>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            cache,
            config,
            sender,
            shutdown,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(
            poll_interval_s = self.config.poll_interval.as_secs(),
            sports = ?self.config.sports,
            prop_markets = self.config.prop_markets.len(),
            "OddsFeed starting (The Odds API)"
        );

        self.poll_all_sports().await;

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => {
                    info!("OddsFeed received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.poll_all_sports().await;
                }
            }
        }
    }

    async fn poll_all_sports(&self) {
        let results = join_all(self.config.sports.iter().map(|s| self.poll_sport(s))).await;

        for (sport, result) in self.config.sports.iter().zip(results) {
            match result {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    self.cache.set(&odds_cache_key(sport), snapshot.clone());
                    if self.sender.send(snapshot).is_err() {
                        warn!("OddsFeed channel closed, stopping");
                        return;
                    }
                }
                Err(ApiError::QuotaExhausted { used }) => {
                    warn!(sport = %sport, used, "OddsFeed skipped: quota exhausted");
                }
                Err(e) => {
                    warn!(sport = %sport, error = %e, "OddsFeed poll failed");
                }
            }
        }

        if let Some(quota) = self.client.last_quota() {
            debug!(
                used = quota.requests_used,
                remaining = quota.requests_remaining,
                "OddsFeed poll done"
            );
        }
    }

    async fn poll_sport(&self, sport: &str) -> Result<OddsSnapshot, ApiError> {
        let events = self.client.fetch_odds(sport).await?;
        let mut snapshot = OddsSnapshot::from_events(sport, &events, Utc::now());

        if !self.config.prop_markets.is_empty() {
            for game in &snapshot.games {
                match self
                    .client
                    .fetch_event_odds(sport, &game.game_id, &self.config.prop_markets)
                    .await
                {
                    Ok(event) => snapshot.props.push(normalize_props(&event)),
                    Err(e) => {
                        warn!(sport, game_id = %game.game_id, error = %e, "Prop fetch failed");
                    }
                }
            }
        }

        info!(
            sport,
            games = snapshot.games.len(),
            props = snapshot.props.iter().map(|b| b.props.len()).sum::<usize>(),
            "OddsFeed snapshot"
        );
        Ok(snapshot)
    }
}
