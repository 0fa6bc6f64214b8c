//! Scores feed and settlement pass.
//!
//! Polls The Odds API scores endpoint for the sports that have picks due
//! (pending, game started) and settles each one whose game has completed.
//! Sports with nothing due are not polled, which keeps request credits
//! for the odds feed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::client::OddsApiClient;
use crate::data::models::{FinalScore, ScoreEvent};
use crate::picks::evaluator::settle;
use crate::picks::models::PickStatus;
use crate::shutdown::Shutdown;
use crate::state::pick_store::{PickStore, StoreError};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct ScoresFeedConfig {
    pub poll_interval: Duration,
    /// Days of completed games to request (1-3).
    pub days_from: u32,
}

impl Default for ScoresFeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(600),
            days_from: 1,
        }
    }
}

// =============================================================================
// Settlement pass
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    pub due: usize,
    pub settled: usize,
    pub won: usize,
    pub lost: usize,
    pub push: usize,
    pub void: usize,
    /// Due picks with no completed score yet (or player props).
    pub still_pending: usize,
}

/// Completed scores keyed by game id.
pub fn completed_scores(events: &[ScoreEvent]) -> HashMap<String, FinalScore> {
    events
        .iter()
        .filter(|e| e.completed)
        .filter_map(|e| match e.to_final_score() {
            Some(score) => Some((score.game_id.clone(), score)),
            None => {
                warn!(game_id = %e.id, "Completed game without parseable scores");
                None
            }
        })
        .collect()
}

/// Settle every due pick that has a completed score.
///
/// Store updates are compare-and-swap, so a pick settled concurrently
/// elsewhere is skipped rather than overwritten.
pub fn settle_due(
    store: &dyn PickStore,
    scores: &HashMap<String, FinalScore>,
    now: DateTime<Utc>,
) -> SettlementSummary {
    let due = store.get_due(now);
    let mut summary = SettlementSummary {
        due: due.len(),
        ..SettlementSummary::default()
    };

    for mut pick in due {
        let Some(score) = scores.get(&pick.game_id) else {
            summary.still_pending += 1;
            continue;
        };

        let status = settle(&mut pick, score, now);
        if status == PickStatus::Pending {
            summary.still_pending += 1;
            continue;
        }

        match store.update_status(&pick.id, status, pick.result.clone()) {
            Ok(_) => {
                summary.settled += 1;
                match status {
                    PickStatus::Won => summary.won += 1,
                    PickStatus::Lost => summary.lost += 1,
                    PickStatus::Push => summary.push += 1,
                    PickStatus::Void => summary.void += 1,
                    PickStatus::Pending => {}
                }
            }
            Err(StoreError::AlreadySettled { id, status }) => {
                debug!(pick_id = %id, status = %status, "Pick settled elsewhere, skipping");
            }
            Err(e) => {
                warn!(pick_id = %pick.id, error = %e, "Failed to store settlement");
            }
        }
    }

    summary
}

// =============================================================================
// Scores Feed
// =============================================================================

pub struct ScoresFeed {
    client: Arc<OddsApiClient>,
    store: Arc<dyn PickStore>,
    config: ScoresFeedConfig,
    shutdown: Shutdown,
}

impl ScoresFeed {
    pub fn new(
        client: Arc<OddsApiClient>,
        store: Arc<dyn PickStore>,
        config: ScoresFeedConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            store,
            config,
            shutdown,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(
            poll_interval_s = self.config.poll_interval.as_secs(),
            days_from = self.config.days_from,
            "ScoresFeed starting"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => {
                    info!("ScoresFeed received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.poll().await;
                }
            }
        }
    }

    async fn poll(&self) {
        let now = Utc::now();
        let sports: BTreeSet<String> = self
            .store
            .get_due(now)
            .into_iter()
            .map(|p| p.sport)
            .collect();

        if sports.is_empty() {
            debug!("ScoresFeed: no picks due");
            return;
        }

        let mut scores = HashMap::new();
        for sport in &sports {
            match self.client.fetch_scores(sport, self.config.days_from).await {
                Ok(events) => scores.extend(completed_scores(&events)),
                Err(e) => warn!(sport = %sport, error = %e, "ScoresFeed poll failed"),
            }
        }

        let summary = settle_due(self.store.as_ref(), &scores, now);
        info!(
            due = summary.due,
            settled = summary.settled,
            won = summary.won,
            lost = summary.lost,
            push = summary.push,
            void = summary.void,
            still_pending = summary.still_pending,
            "Settlement pass complete"
        );
    }
}
