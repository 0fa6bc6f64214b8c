//! Odds math and bookmaker payload normalization.

pub mod markets;
pub mod math;
pub mod props;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use self::math::{decimal_to_american, OddsError};

// =============================================================================
// Quotes
// =============================================================================

/// A single bookmaker price for one side of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub bookmaker: String,
    pub american_odds: i32,
    pub decimal_odds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl Quote {
    /// Build a quote from a decimal price. Fails for prices <= 1.0.
    pub fn from_decimal(
        bookmaker: &str,
        decimal_odds: f64,
        point: Option<f64>,
    ) -> Result<Self, OddsError> {
        let american_odds = decimal_to_american(decimal_odds)?;
        Ok(Self {
            bookmaker: bookmaker.to_string(),
            american_odds,
            decimal_odds,
            point,
        })
    }
}

/// Highest American odds; the first-seen quote wins ties.
pub fn best_quote(quotes: &[Quote]) -> Option<&Quote> {
    let mut best: Option<&Quote> = None;
    for quote in quotes {
        match best {
            Some(b) if quote.american_odds <= b.american_odds => {}
            _ => best = Some(quote),
        }
    }
    best
}

/// Point of the first quote that carries one.
pub fn consensus_line(quotes: &[Quote]) -> Option<f64> {
    quotes.iter().find_map(|q| q.point)
}

// =============================================================================
// Line ladders
// =============================================================================

/// Quotes at one line value. `first` is home/over, `second` away/under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineRung {
    pub line: f64,
    pub first: Vec<Quote>,
    pub second: Vec<Quote>,
}

/// Quotes grouped by line, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineLadder {
    pub rungs: Vec<LineRung>,
}

impl LineLadder {
    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn rung(&self, line: f64) -> Option<&LineRung> {
        let key = line_key(line);
        self.rungs.iter().find(|r| line_key(r.line) == key)
    }
}

/// Side of a two-way ladder rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RungSide {
    First,
    Second,
}

/// Accumulates quotes keyed by line, then emits an ascending ladder.
#[derive(Debug, Default)]
pub(crate) struct LadderBuilder {
    rungs: BTreeMap<i64, LineRung>,
}

impl LadderBuilder {
    pub(crate) fn push(&mut self, line: f64, side: RungSide, quote: Quote) {
        let rung = self.rungs.entry(line_key(line)).or_insert_with(|| LineRung {
            line,
            ..LineRung::default()
        });
        match side {
            RungSide::First => rung.first.push(quote),
            RungSide::Second => rung.second.push(quote),
        }
    }

    pub(crate) fn build(self) -> LineLadder {
        LineLadder {
            rungs: self.rungs.into_values().collect(),
        }
    }
}

/// Lines are quoted in halves; hundredths are enough to key them exactly.
pub(crate) fn line_key(line: f64) -> i64 {
    (line * 100.0).round() as i64
}

// =============================================================================
// Normalization issues
// =============================================================================

/// A bookmaker entry that was skipped during normalization.
///
/// Never fatal: the rest of the payload is still normalized.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormalizeError {
    #[error("Event {event_id} is missing home/away team names")]
    MissingTeams { event_id: String },

    #[error("Unclassified outcome '{name}' in {market} from {bookmaker}")]
    UnknownSide {
        bookmaker: String,
        market: String,
        name: String,
    },

    #[error("Invalid quote in {market} from {bookmaker}: {reason}")]
    InvalidQuote {
        bookmaker: String,
        market: String,
        reason: String,
    },
}
