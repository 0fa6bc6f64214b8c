//! Sportsbook picks service.
//!
//! Architecture:
//! - Tokio async runtime for concurrent I/O
//! - The Odds API client with rate limiting, retries and quota tracking
//! - OddsFeed: polls and normalizes odds per sport into a TTL cache
//! - Pick pipeline: prediction source -> pending tracked picks
//! - ScoresFeed: settles due picks against completed scores
//! - Periodic performance report folded from the pick store

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use sportsbook_picks::api::client::{ClientConfig, OddsApiClient};
use sportsbook_picks::config::Settings;
use sportsbook_picks::data::odds_feed::{OddsFeed, OddsFeedConfig, OddsSnapshot};
use sportsbook_picks::data::scores_feed::{ScoresFeed, ScoresFeedConfig};
use sportsbook_picks::odds::math::{american_to_decimal, kelly_stake};
use sportsbook_picks::picks::builder::BuilderConfig;
use sportsbook_picks::predictions::consensus::ConsensusSource;
use sportsbook_picks::predictions::{generate_picks, PredictionSource, RetryPolicy};
use sportsbook_picks::shutdown::Shutdown;
use sportsbook_picks::state::cache::TtlCache;
use sportsbook_picks::state::pick_store::{InMemoryPickStore, PickStore};
use sportsbook_picks::stats::aggregate;

/// Kelly stakes are reported against a notional 100-unit bankroll.
const REPORT_BANKROLL: f64 = 100.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== Sportsbook Picks ===");
    info!(
        base_url = %settings.odds_api_base_url,
        sports = ?settings.sports,
        markets = ?settings.odds_markets,
        picks_path = %settings.picks_path.display(),
        "Configuration loaded"
    );

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }

    // Shared collaborators, built once and injected.
    let client = Arc::new(OddsApiClient::new(ClientConfig::from_settings(&settings))?);
    let store = Arc::new(InMemoryPickStore::open(&settings.picks_path)?);
    let cache: TtlCache<Arc<OddsSnapshot>> =
        TtlCache::new(chrono::Duration::seconds(settings.odds_cache_ttl_seconds));

    let existing = aggregate(&store.all());
    info!(
        total = existing.total_picks,
        pending = existing.pending_picks,
        "Pick store ready"
    );

    // Shutdown signal.
    let shutdown = Shutdown::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        info!("Shutdown signal received");
        shutdown_clone.trigger();
    });

    // =========================================================================
    // Feeds
    // =========================================================================
    let (odds_tx, mut odds_rx) = mpsc::unbounded_channel();
    let odds_feed = OddsFeed::new(
        client.clone(),
        cache.clone(),
        OddsFeedConfig {
            poll_interval: Duration::from_secs_f64(settings.odds_poll_interval_seconds),
            sports: settings.sports.clone(),
            prop_markets: settings.prop_markets.clone(),
        },
        odds_tx,
        shutdown.clone(),
    );
    let odds_handle = odds_feed.spawn();

    let scores_feed = ScoresFeed::new(
        client.clone(),
        store.clone(),
        ScoresFeedConfig {
            poll_interval: Duration::from_secs_f64(settings.scores_poll_interval_seconds),
            days_from: settings.scores_days_from,
        },
        shutdown.clone(),
    );
    let scores_handle = scores_feed.spawn();

    // =========================================================================
    // Pick pipeline
    // =========================================================================
    let source = ConsensusSource::default();
    let policy = settings.retry_policy();
    let builder_config = settings.builder_config();
    let report_interval = Duration::from_secs_f64(settings.stats_report_interval_seconds);
    let mut report_tick = report_ticker(report_interval);

    info!(
        source = source.name(),
        report_interval_s = report_interval.as_secs(),
        "Starting pick loop"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                info!("Shutting down pick loop...");
                break;
            }
            Some(snapshot) = odds_rx.recv() => {
                track_new_games(
                    &snapshot,
                    &source,
                    store.as_ref(),
                    &policy,
                    &builder_config,
                    settings.kelly_fraction,
                    &shutdown,
                )
                .await;
            }
            _ = report_tick.tick() => {
                report_stats(store.as_ref(), &client, &cache);
            }
        }
    }

    // Graceful shutdown. Idle feeds have already seen the signal; one
    // caught mid-poll is stopped here.
    info!("Shutting down...");
    for handle in [odds_handle, scores_handle] {
        handle.abort();
    }
    let stats = aggregate(&store.all());
    info!(
        total = stats.total_picks,
        settled = stats.settled_picks,
        win_rate = %stats.win_rate,
        net_units = %stats.net_units,
        roi = %stats.roi,
        streak = %stats.current_streak,
        "Final performance report"
    );
    info!("Shutdown complete.");

    Ok(())
}

/// Create picks for upcoming games in `snapshot` that have none yet.
async fn track_new_games(
    snapshot: &OddsSnapshot,
    source: &dyn PredictionSource,
    store: &dyn PickStore,
    policy: &RetryPolicy,
    builder_config: &BuilderConfig,
    kelly_fraction: f64,
    shutdown: &Shutdown,
) {
    let now = Utc::now();
    let tracked: HashSet<String> = store.all().into_iter().map(|p| p.game_id).collect();
    let mut created = 0usize;

    for game in &snapshot.games {
        if shutdown.is_triggered() {
            info!(sport = %snapshot.sport, created, "Pick pass interrupted by shutdown");
            return;
        }

        let upcoming = game.commence_time.is_some_and(|t| t > now);
        if !upcoming || tracked.contains(&game.game_id) {
            continue;
        }

        let picks = match generate_picks(source, game, policy, builder_config).await {
            Ok(picks) => picks,
            Err(e) => {
                warn!(game_id = %game.game_id, error = %e, "No prediction for game");
                continue;
            }
        };

        for pick in picks {
            if pick.is_value_bet {
                let stake = american_to_decimal(pick.odds).and_then(|d| {
                    kelly_stake(
                        f64::from(pick.confidence) / 100.0,
                        d,
                        REPORT_BANKROLL,
                        kelly_fraction,
                    )
                });
                info!(
                    game_id = %pick.game_id,
                    pick = %pick.pick,
                    odds = pick.odds,
                    edge = ?pick.edge,
                    kelly_units = ?stake.ok(),
                    "Value bet"
                );
            }
            match store.save(pick) {
                Ok(()) => created += 1,
                Err(e) => warn!(error = %e, "Failed to save pick"),
            }
        }
    }

    info!(sport = %snapshot.sport, games = snapshot.games.len(), created, "Pick pass done");
}

/// Report timer that keeps its schedule regardless of other loop activity.
/// The first tick is one full period after start.
fn report_ticker(period: Duration) -> Interval {
    let mut tick = tokio::time::interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

fn report_stats(
    store: &dyn PickStore,
    client: &OddsApiClient,
    cache: &TtlCache<Arc<OddsSnapshot>>,
) {
    let purged = cache.purge_expired();
    let stats = aggregate(&store.all());
    let quota = client.last_quota();

    info!(
        total = stats.total_picks,
        pending = stats.pending_picks,
        settled = stats.settled_picks,
        wins = stats.wins,
        losses = stats.losses,
        pushes = stats.pushes,
        win_rate = %stats.win_rate,
        net_units = %stats.net_units,
        roi = %stats.roi,
        streak = %stats.current_streak,
        value_bets = stats.value_bets.picks,
        value_net_units = %stats.value_bets.net_units,
        cached_sports = cache.len(),
        purged,
        quota_remaining = ?quota.map(|q| q.requests_remaining),
        "Performance update"
    );

    for (bet_type, b) in &stats.by_bet_type {
        info!(
            bet_type = %bet_type,
            picks = b.picks,
            win_rate = %b.win_rate,
            net_units = %b.net_units,
            roi = %b.roi,
            "Breakdown"
        );
    }
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
