//! Prediction sources and their conversion into tracked picks.
//!
//! A `PredictionSource` is opaque: given normalized odds for a game it
//! returns a structured `Prediction`. Calls go through a bounded
//! fixed-delay `RetryPolicy`; the resulting legs become pending picks via
//! `picks::builder`.

pub mod consensus;

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::odds::markets::NormalizedGameOdds;
use crate::picks::builder::{picks_from_prediction, BuilderConfig, Prediction};
use crate::picks::models::TrackedPick;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Prediction source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed prediction: {0}")]
    Malformed(String),

    /// The board does not carry enough data to predict from. Asking
    /// again returns the same answer.
    #[error("Insufficient market data: {0}")]
    InsufficientData(String),
}

impl PredictionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InsufficientData(_))
    }
}

#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn predict(&self, game: &NormalizedGameOdds) -> Result<Prediction, PredictionError>;
}

// =============================================================================
// Retry policy
// =============================================================================

/// Up to `max_attempts` calls with `fixed_delay` between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fixed_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            fixed_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds or attempts run out, returning
    /// the last error. `max_attempts` of 0 is treated as 1.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_while(operation_name, operation, |_| true).await
    }

    /// Like `run`, but an error for which `retryable` is false is returned
    /// at once.
    pub async fn run_while<T, E, F, Fut, R>(
        &self,
        operation_name: &str,
        mut operation: F,
        retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts && retryable(&e) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay_ms = self.fixed_delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.fixed_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Pick generation
// =============================================================================

/// Ask `source` for a prediction on `game` (with retries) and build the
/// resulting pending picks.
pub async fn generate_picks(
    source: &dyn PredictionSource,
    game: &NormalizedGameOdds,
    policy: &RetryPolicy,
    config: &BuilderConfig,
) -> Result<Vec<TrackedPick>, PredictionError> {
    let prediction = policy
        .run_while(source.name(), || source.predict(game), PredictionError::is_retryable)
        .await?;

    let picks = picks_from_prediction(game, &prediction, config, Utc::now());
    info!(
        source = source.name(),
        game_id = %game.game_id,
        picks = picks.len(),
        value_bets = picks.iter().filter(|p| p.is_value_bet).count(),
        "Generated picks"
    );
    Ok(picks)
}
