//! Player proposition normalization.
//!
//! Props are not always symmetric two-sided markets: points/rebounds
//! come as Over/Under pairs per player and line, while scorer markets
//! are a single price per player. Entries are grouped by
//! `(market, player, line)`; the same player at two different lines
//! stays two entries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::{best_quote, line_key, NormalizeError, Quote};
use crate::data::models::{Bookmaker, BookmakerMarket, OddsEvent, Outcome};

/// Market key prefixes that carry player-level props.
const PROP_MARKET_PREFIXES: [&str; 3] = ["player_", "batter_", "pitcher_"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProp {
    pub player_name: String,
    pub market: String,
    pub line: Option<f64>,
    /// Over side, or the single price of a yes/no market.
    pub over_odds: Vec<Quote>,
    pub under_odds: Vec<Quote>,
}

impl PlayerProp {
    pub fn best_over(&self) -> Option<&Quote> {
        best_quote(&self.over_odds)
    }

    pub fn best_under(&self) -> Option<&Quote> {
        best_quote(&self.under_odds)
    }

    pub fn is_two_sided(&self) -> bool {
        !self.over_odds.is_empty() && !self.under_odds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropsBoard {
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub props: Vec<PlayerProp>,
    #[serde(default)]
    pub issues: Vec<NormalizeError>,
}

impl PropsBoard {
    /// Props grouped by player name, each player's entries in encounter order.
    pub fn by_player(&self) -> BTreeMap<&str, Vec<&PlayerProp>> {
        let mut grouped: BTreeMap<&str, Vec<&PlayerProp>> = BTreeMap::new();
        for prop in &self.props {
            grouped.entry(prop.player_name.as_str()).or_default().push(prop);
        }
        grouped
    }

    /// All props for one market key.
    pub fn market(&self, market: &str) -> Vec<&PlayerProp> {
        self.props.iter().filter(|p| p.market == market).collect()
    }
}

pub fn is_prop_market(key: &str) -> bool {
    PROP_MARKET_PREFIXES.iter().any(|p| key.starts_with(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropSide {
    Over,
    Under,
}

fn prop_side(outcome: &Outcome) -> PropSide {
    match outcome.name.as_str() {
        "Under" | "No" => PropSide::Under,
        // Over/Yes, or a scorer market where the name is the player.
        _ => PropSide::Over,
    }
}

/// Player identity: `description` when present, else `name`.
fn player_name(outcome: &Outcome) -> &str {
    outcome
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(&outcome.name)
}

type PropKey = (String, String, Option<i64>);

#[derive(Default)]
struct PropsBuilder {
    props: Vec<PlayerProp>,
    index: HashMap<PropKey, usize>,
    issues: Vec<NormalizeError>,
}

impl PropsBuilder {
    fn ingest_market(&mut self, bookmaker: &Bookmaker, market: &BookmakerMarket) {
        for outcome in &market.outcomes {
            let quote = match Quote::from_decimal(&bookmaker.title, outcome.price, outcome.point) {
                Ok(q) => q,
                Err(e) => {
                    warn!(
                        bookmaker = %bookmaker.key,
                        market = %market.key,
                        error = %e,
                        "Dropping invalid prop quote"
                    );
                    self.issues.push(NormalizeError::InvalidQuote {
                        bookmaker: bookmaker.title.clone(),
                        market: market.key.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let player = player_name(outcome).to_string();
            let key = (market.key.clone(), player.clone(), outcome.point.map(line_key));
            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    self.props.push(PlayerProp {
                        player_name: player,
                        market: market.key.clone(),
                        line: outcome.point,
                        over_odds: Vec::new(),
                        under_odds: Vec::new(),
                    });
                    self.index.insert(key, self.props.len() - 1);
                    self.props.len() - 1
                }
            };

            let prop = &mut self.props[idx];
            match prop_side(outcome) {
                PropSide::Over => prop.over_odds.push(quote),
                PropSide::Under => prop.under_odds.push(quote),
            }
        }
    }
}

/// Normalize the player-prop markets of a single event.
pub fn normalize_props(event: &OddsEvent) -> PropsBoard {
    let mut builder = PropsBuilder::default();

    for bookmaker in &event.bookmakers {
        for market in &bookmaker.markets {
            if !is_prop_market(&market.key) {
                debug!(market = %market.key, "Skipping non-prop market");
                continue;
            }
            builder.ingest_market(bookmaker, market);
        }
    }

    debug!(
        event_id = %event.id,
        props = builder.props.len(),
        issues = builder.issues.len(),
        "Normalized player props"
    );

    PropsBoard {
        event_id: event.id.clone(),
        home_team: event.home_team.clone().unwrap_or_default(),
        away_team: event.away_team.clone().unwrap_or_default(),
        props: builder.props,
        issues: builder.issues,
    }
}
