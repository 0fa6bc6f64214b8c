//! Game-level market normalization.
//!
//! Turns one Odds API event (bookmakers × markets × outcomes) into a
//! `NormalizedGameOdds`: per-side quote lists for moneyline, spread and
//! total, ascending line ladders for alternate and period markets, and
//! the list of entries that had to be skipped.
//!
//! Ordering contract: quotes keep bookmaker encounter order, which is
//! what "best" tie-breaking and the consensus line rely on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::{
    best_quote, consensus_line, LadderBuilder, LineLadder, NormalizeError, Quote, RungSide,
};
use crate::data::models::{Bookmaker, BookmakerMarket, OddsEvent, Outcome};

// =============================================================================
// Normalized output
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneylineOdds {
    pub home: Vec<Quote>,
    pub away: Vec<Quote>,
    pub draw: Vec<Quote>,
    pub best_home: Option<Quote>,
    pub best_away: Option<Quote>,
    pub best_draw: Option<Quote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadOdds {
    pub home: Vec<Quote>,
    pub away: Vec<Quote>,
    /// Home line of the first bookmaker quoting the home side.
    pub consensus_line: Option<f64>,
}

impl SpreadOdds {
    pub fn away_line(&self) -> Option<f64> {
        self.consensus_line.map(|l| -l)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalOdds {
    pub over: Vec<Quote>,
    pub under: Vec<Quote>,
    pub consensus_line: Option<f64>,
}

/// Game segment for period-qualified markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Q1,
    Q2,
    Q3,
    Q4,
    H1,
    H2,
    P1,
    P2,
    P3,
    First5Innings,
}

impl Period {
    /// Market-key tokens, checked in this order.
    const TOKENS: [(&'static str, Period); 10] = [
        ("1st_5_innings", Period::First5Innings),
        ("q1", Period::Q1),
        ("q2", Period::Q2),
        ("q3", Period::Q3),
        ("q4", Period::Q4),
        ("h1", Period::H1),
        ("h2", Period::H2),
        ("p1", Period::P1),
        ("p2", Period::P2),
        ("p3", Period::P3),
    ];

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::TOKENS
            .iter()
            .find(|(token, _)| suffix.contains(token))
            .map(|(_, period)| *period)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = Self::TOKENS
            .iter()
            .find(|(_, p)| p == self)
            .map(|(t, _)| *t)
            .unwrap_or("?");
        write!(f, "{token}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodOdds {
    pub moneyline: MoneylineOdds,
    pub spreads: LineLadder,
    pub totals: LineLadder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedGameOdds {
    pub game_id: String,
    pub sport_key: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: Option<DateTime<Utc>>,
    pub moneyline: MoneylineOdds,
    pub spread: SpreadOdds,
    pub total: TotalOdds,
    pub alternate_spreads: LineLadder,
    pub alternate_totals: LineLadder,
    pub periods: BTreeMap<Period, PeriodOdds>,
    /// Entries skipped while normalizing.
    #[serde(default)]
    pub issues: Vec<NormalizeError>,
}

impl NormalizedGameOdds {
    /// Number of distinct bookmakers contributing a moneyline quote.
    pub fn moneyline_book_count(&self) -> usize {
        let mut books: Vec<&str> = self
            .moneyline
            .home
            .iter()
            .chain(self.moneyline.away.iter())
            .map(|q| q.bookmaker.as_str())
            .collect();
        books.sort_unstable();
        books.dedup();
        books.len()
    }
}

// =============================================================================
// Market key classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketKind {
    Moneyline,
    Spread,
    Total,
    AlternateSpread,
    AlternateTotal,
}

/// Longest prefixes first so `alternate_spreads` is not read as `spreads`.
const MARKET_BASES: [(&str, MarketKind); 5] = [
    ("alternate_spreads", MarketKind::AlternateSpread),
    ("alternate_totals", MarketKind::AlternateTotal),
    ("spreads", MarketKind::Spread),
    ("totals", MarketKind::Total),
    ("h2h", MarketKind::Moneyline),
];

/// Split a market key into its kind and optional period.
///
/// The period is matched on the suffix only, so `h2h` is never mistaken
/// for a second-half market.
fn classify_market(key: &str) -> Option<(MarketKind, Option<Period>)> {
    let (base, kind) = MARKET_BASES.iter().find(|(base, _)| key.starts_with(base))?;
    let suffix = &key[base.len()..];
    if suffix.is_empty() {
        return Some((*kind, None));
    }
    if !suffix.starts_with('_') {
        return None;
    }
    Period::from_suffix(suffix).map(|p| (*kind, Some(p)))
}

// =============================================================================
// Normalization
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Home,
    Away,
    Draw,
    Over,
    Under,
}

#[derive(Default)]
struct MoneylineBuilder {
    home: Vec<Quote>,
    away: Vec<Quote>,
    draw: Vec<Quote>,
}

impl MoneylineBuilder {
    fn push(&mut self, side: Side, quote: Quote) {
        match side {
            Side::Home => self.home.push(quote),
            Side::Away => self.away.push(quote),
            Side::Draw => self.draw.push(quote),
            Side::Over | Side::Under => {}
        }
    }

    fn build(self) -> MoneylineOdds {
        MoneylineOdds {
            best_home: best_quote(&self.home).cloned(),
            best_away: best_quote(&self.away).cloned(),
            best_draw: best_quote(&self.draw).cloned(),
            home: self.home,
            away: self.away,
            draw: self.draw,
        }
    }
}

#[derive(Default)]
struct PeriodBuilder {
    moneyline: MoneylineBuilder,
    spreads: LadderBuilder,
    totals: LadderBuilder,
}

struct GameBuilder<'a> {
    event_id: &'a str,
    home_team: &'a str,
    away_team: &'a str,
    has_teams: bool,
    moneyline: MoneylineBuilder,
    spread_home: Vec<Quote>,
    spread_away: Vec<Quote>,
    over: Vec<Quote>,
    under: Vec<Quote>,
    alternate_spreads: LadderBuilder,
    alternate_totals: LadderBuilder,
    periods: BTreeMap<Period, PeriodBuilder>,
    issues: Vec<NormalizeError>,
}

impl<'a> GameBuilder<'a> {
    fn new(event: &'a OddsEvent) -> Self {
        let home_team = event.home_team.as_deref().unwrap_or("");
        let away_team = event.away_team.as_deref().unwrap_or("");
        let has_teams = !home_team.is_empty() && !away_team.is_empty();

        let mut issues = Vec::new();
        if !has_teams {
            warn!(event_id = %event.id, "Odds event missing team names, two-way markets skipped");
            issues.push(NormalizeError::MissingTeams {
                event_id: event.id.clone(),
            });
        }

        Self {
            event_id: &event.id,
            home_team,
            away_team,
            has_teams,
            moneyline: MoneylineBuilder::default(),
            spread_home: Vec::new(),
            spread_away: Vec::new(),
            over: Vec::new(),
            under: Vec::new(),
            alternate_spreads: LadderBuilder::default(),
            alternate_totals: LadderBuilder::default(),
            periods: BTreeMap::new(),
            issues,
        }
    }

    fn ingest_market(&mut self, bookmaker: &Bookmaker, market: &BookmakerMarket) {
        let Some((kind, period)) = classify_market(&market.key) else {
            debug!(market = %market.key, bookmaker = %bookmaker.key, "Skipping unrecognized market");
            return;
        };

        let two_way = matches!(
            kind,
            MarketKind::Moneyline | MarketKind::Spread | MarketKind::AlternateSpread
        );
        if two_way && !self.has_teams {
            return;
        }

        // Main spread markets carry one pair per book: the away line is
        // re-derived from the home line. Alternate markets carry many pairs
        // and are keyed by each outcome's own point instead.
        let home_point = if kind == MarketKind::Spread {
            market
                .outcomes
                .iter()
                .find(|o| o.name == self.home_team)
                .and_then(|o| o.point)
        } else {
            None
        };

        for outcome in &market.outcomes {
            let Some(side) = self.classify_outcome(kind, outcome) else {
                self.skip_unknown(bookmaker, market, outcome);
                continue;
            };

            let point = match kind {
                MarketKind::Moneyline => None,
                MarketKind::Spread | MarketKind::AlternateSpread => match side {
                    Side::Away => home_point.map(|p| -p).or(outcome.point),
                    _ => outcome.point,
                },
                MarketKind::Total | MarketKind::AlternateTotal => outcome.point,
            };

            if kind != MarketKind::Moneyline && point.is_none() {
                self.skip_invalid(bookmaker, market, "missing point".to_string());
                continue;
            }

            let quote = match Quote::from_decimal(&bookmaker.title, outcome.price, point) {
                Ok(q) => q,
                Err(e) => {
                    self.skip_invalid(bookmaker, market, e.to_string());
                    continue;
                }
            };

            self.place(kind, period, side, quote);
        }
    }

    fn classify_outcome(&self, kind: MarketKind, outcome: &Outcome) -> Option<Side> {
        match kind {
            MarketKind::Total | MarketKind::AlternateTotal => match outcome.name.as_str() {
                "Over" => Some(Side::Over),
                "Under" => Some(Side::Under),
                _ => None,
            },
            _ => {
                if outcome.name == self.home_team {
                    Some(Side::Home)
                } else if outcome.name == self.away_team {
                    Some(Side::Away)
                } else if kind == MarketKind::Moneyline && outcome.name == "Draw" {
                    Some(Side::Draw)
                } else {
                    None
                }
            }
        }
    }

    fn place(&mut self, kind: MarketKind, period: Option<Period>, side: Side, quote: Quote) {
        // Point presence was checked by the caller for every non-moneyline kind.
        let line = quote.point.unwrap_or_default();
        let rung_side = match side {
            Side::Home | Side::Over => RungSide::First,
            _ => RungSide::Second,
        };

        match period {
            None => match kind {
                MarketKind::Moneyline => self.moneyline.push(side, quote),
                MarketKind::Spread => match side {
                    Side::Home => self.spread_home.push(quote),
                    _ => self.spread_away.push(quote),
                },
                MarketKind::Total => match side {
                    Side::Over => self.over.push(quote),
                    _ => self.under.push(quote),
                },
                MarketKind::AlternateSpread => {
                    self.alternate_spreads.push(home_line(side, line), rung_side, quote)
                }
                MarketKind::AlternateTotal => self.alternate_totals.push(line, rung_side, quote),
            },
            Some(period) => {
                let builder = self.periods.entry(period).or_default();
                match kind {
                    MarketKind::Moneyline => builder.moneyline.push(side, quote),
                    MarketKind::Spread | MarketKind::AlternateSpread => {
                        builder.spreads.push(home_line(side, line), rung_side, quote)
                    }
                    MarketKind::Total | MarketKind::AlternateTotal => {
                        builder.totals.push(line, rung_side, quote)
                    }
                }
            }
        }
    }

    fn skip_unknown(&mut self, bookmaker: &Bookmaker, market: &BookmakerMarket, outcome: &Outcome) {
        warn!(
            event_id = %self.event_id,
            bookmaker = %bookmaker.key,
            market = %market.key,
            outcome = %outcome.name,
            "Dropping unclassified outcome"
        );
        self.issues.push(NormalizeError::UnknownSide {
            bookmaker: bookmaker.title.clone(),
            market: market.key.clone(),
            name: outcome.name.clone(),
        });
    }

    fn skip_invalid(&mut self, bookmaker: &Bookmaker, market: &BookmakerMarket, reason: String) {
        warn!(
            event_id = %self.event_id,
            bookmaker = %bookmaker.key,
            market = %market.key,
            reason = %reason,
            "Dropping invalid quote"
        );
        self.issues.push(NormalizeError::InvalidQuote {
            bookmaker: bookmaker.title.clone(),
            market: market.key.clone(),
            reason,
        });
    }

    fn build(self, event: &OddsEvent) -> NormalizedGameOdds {
        let periods = self
            .periods
            .into_iter()
            .map(|(period, b)| {
                (
                    period,
                    PeriodOdds {
                        moneyline: b.moneyline.build(),
                        spreads: b.spreads.build(),
                        totals: b.totals.build(),
                    },
                )
            })
            .collect();

        NormalizedGameOdds {
            game_id: event.id.clone(),
            sport_key: event.sport_key.clone(),
            home_team: self.home_team.to_string(),
            away_team: self.away_team.to_string(),
            commence_time: event.commence_time,
            moneyline: self.moneyline.build(),
            spread: SpreadOdds {
                consensus_line: consensus_line(&self.spread_home),
                home: self.spread_home,
                away: self.spread_away,
            },
            total: TotalOdds {
                consensus_line: consensus_line(&self.over),
                over: self.over,
                under: self.under,
            },
            alternate_spreads: self.alternate_spreads.build(),
            alternate_totals: self.alternate_totals.build(),
            periods,
            issues: self.issues,
        }
    }
}

/// Spread ladders are keyed by the home line.
fn home_line(side: Side, line: f64) -> f64 {
    match side {
        Side::Away => -line,
        _ => line,
    }
}

/// Normalize every bookmaker market of one event.
pub fn normalize_game(event: &OddsEvent) -> NormalizedGameOdds {
    let mut builder = GameBuilder::new(event);
    for bookmaker in &event.bookmakers {
        for market in &bookmaker.markets {
            builder.ingest_market(bookmaker, market);
        }
    }

    let game = builder.build(event);
    debug!(
        event_id = %game.game_id,
        books = game.moneyline_book_count(),
        periods = game.periods.len(),
        issues = game.issues.len(),
        "Normalized game odds"
    );
    game
}

/// Normalize a batch of events, preserving input order.
pub fn normalize_games(events: &[OddsEvent]) -> Vec<NormalizedGameOdds> {
    events.iter().map(normalize_game).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, price: f64, point: Option<f64>) -> Outcome {
        Outcome {
            name: name.to_string(),
            price,
            point,
            description: None,
        }
    }

    fn book(key: &str, title: &str, markets: Vec<BookmakerMarket>) -> Bookmaker {
        Bookmaker {
            key: key.to_string(),
            title: title.to_string(),
            markets,
        }
    }

    fn market(key: &str, outcomes: Vec<Outcome>) -> BookmakerMarket {
        BookmakerMarket {
            key: key.to_string(),
            outcomes,
        }
    }

    fn event(bookmakers: Vec<Bookmaker>) -> OddsEvent {
        OddsEvent {
            id: "evt1".to_string(),
            sport_key: "basketball_nba".to_string(),
            commence_time: None,
            home_team: Some("Charlotte Hornets".to_string()),
            away_team: Some("Detroit Pistons".to_string()),
            bookmakers,
        }
    }

    #[test]
    fn test_classify_market() {
        assert_eq!(classify_market("h2h"), Some((MarketKind::Moneyline, None)));
        assert_eq!(
            classify_market("alternate_spreads"),
            Some((MarketKind::AlternateSpread, None))
        );
        assert_eq!(
            classify_market("spreads_q1"),
            Some((MarketKind::Spread, Some(Period::Q1)))
        );
        assert_eq!(
            classify_market("h2h_h2"),
            Some((MarketKind::Moneyline, Some(Period::H2)))
        );
        assert_eq!(
            classify_market("totals_1st_5_innings"),
            Some((MarketKind::Total, Some(Period::First5Innings)))
        );
        assert_eq!(classify_market("h2h_lay"), None);
        assert_eq!(classify_market("team_totals"), None);
        assert_eq!(classify_market("player_points"), None);
    }

    #[test]
    fn test_moneyline_best_and_draw() {
        let ev = event(vec![
            book(
                "a",
                "BookA",
                vec![market(
                    "h2h",
                    vec![
                        outcome("Charlotte Hornets", 1.8333, None),
                        outcome("Detroit Pistons", 2.05, None),
                    ],
                )],
            ),
            book(
                "b",
                "BookB",
                vec![market(
                    "h2h",
                    vec![
                        outcome("Charlotte Hornets", 1.90, None),
                        outcome("Detroit Pistons", 2.00, None),
                        outcome("Draw", 15.0, None),
                    ],
                )],
            ),
        ]);
        let game = normalize_game(&ev);
        assert_eq!(game.moneyline.home.len(), 2);
        // -120 vs -111: BookB is better for home
        assert_eq!(game.moneyline.best_home.as_ref().unwrap().bookmaker, "BookB");
        // +105 vs +100: BookA is better for away
        assert_eq!(game.moneyline.best_away.as_ref().unwrap().bookmaker, "BookA");
        assert_eq!(game.moneyline.best_draw.as_ref().unwrap().american_odds, 1400);
        assert!(game.issues.is_empty());
    }

    #[test]
    fn test_spread_away_is_negated_home_line() {
        // BookA encodes the away line inconsistently; it must be re-derived.
        let ev = event(vec![book(
            "a",
            "BookA",
            vec![market(
                "spreads",
                vec![
                    outcome("Charlotte Hornets", 1.91, Some(-3.5)),
                    outcome("Detroit Pistons", 1.91, Some(4.0)),
                ],
            )],
        )]);
        let game = normalize_game(&ev);
        assert_eq!(game.spread.home[0].point, Some(-3.5));
        assert_eq!(game.spread.away[0].point, Some(3.5));
        assert_eq!(game.spread.consensus_line, Some(-3.5));
        assert_eq!(game.spread.away_line(), Some(3.5));
    }

    #[test]
    fn test_total_consensus_is_first_seen() {
        let ev = event(vec![
            book(
                "a",
                "BookA",
                vec![market(
                    "totals",
                    vec![outcome("Over", 1.91, Some(210.5)), outcome("Under", 1.91, Some(210.5))],
                )],
            ),
            book(
                "b",
                "BookB",
                vec![market(
                    "totals",
                    vec![outcome("Over", 1.87, Some(211.0)), outcome("Under", 1.95, Some(211.0))],
                )],
            ),
        ]);
        let game = normalize_game(&ev);
        assert_eq!(game.total.consensus_line, Some(210.5));
        assert_eq!(game.total.over.len(), 2);
        assert_eq!(game.total.under.len(), 2);
    }

    #[test]
    fn test_unknown_outcome_is_skipped_not_fatal() {
        let ev = event(vec![
            book(
                "a",
                "BookA",
                vec![market(
                    "h2h",
                    vec![
                        outcome("Charlotte", 1.80, None),
                        outcome("Detroit Pistons", 2.10, None),
                    ],
                )],
            ),
            book(
                "b",
                "BookB",
                vec![market(
                    "h2h",
                    vec![
                        outcome("Charlotte Hornets", 1.0, None),
                        outcome("Detroit Pistons", 2.00, None),
                    ],
                )],
            ),
        ]);
        let game = normalize_game(&ev);
        assert!(game.moneyline.home.is_empty());
        assert_eq!(game.moneyline.away.len(), 2);
        assert_eq!(game.issues.len(), 2);
        assert!(matches!(game.issues[0], NormalizeError::UnknownSide { .. }));
        assert!(matches!(game.issues[1], NormalizeError::InvalidQuote { .. }));
    }

    #[test]
    fn test_missing_teams_keeps_totals() {
        let mut ev = event(vec![book(
            "a",
            "BookA",
            vec![
                market("h2h", vec![outcome("Charlotte Hornets", 1.80, None)]),
                market(
                    "totals",
                    vec![outcome("Over", 1.91, Some(220.0)), outcome("Under", 1.91, Some(220.0))],
                ),
            ],
        )]);
        ev.home_team = None;
        let game = normalize_game(&ev);
        assert!(game.moneyline.home.is_empty());
        assert_eq!(game.total.consensus_line, Some(220.0));
        assert_eq!(
            game.issues,
            vec![NormalizeError::MissingTeams {
                event_id: "evt1".to_string()
            }]
        );
    }

    #[test]
    fn test_alternate_and_period_ladders() {
        let ev = event(vec![book(
            "a",
            "BookA",
            vec![
                market(
                    "alternate_spreads",
                    vec![
                        outcome("Charlotte Hornets", 2.40, Some(-7.5)),
                        outcome("Detroit Pistons", 1.55, Some(7.5)),
                        outcome("Charlotte Hornets", 1.50, Some(-1.5)),
                        outcome("Detroit Pistons", 2.50, Some(1.5)),
                    ],
                ),
                market(
                    "totals_q1",
                    vec![outcome("Over", 1.91, Some(55.5)), outcome("Under", 1.91, Some(55.5))],
                ),
                market(
                    "h2h_h1",
                    vec![
                        outcome("Charlotte Hornets", 1.70, None),
                        outcome("Detroit Pistons", 2.20, None),
                    ],
                ),
            ],
        )]);
        let game = normalize_game(&ev);

        let lines: Vec<f64> = game.alternate_spreads.rungs.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![-7.5, -1.5]);
        let rung = game.alternate_spreads.rung(-7.5).unwrap();
        assert_eq!(rung.first.len(), 1);
        assert_eq!(rung.second.len(), 1);

        let q1 = &game.periods[&Period::Q1];
        assert_eq!(q1.totals.rungs.len(), 1);
        assert_eq!(q1.totals.rungs[0].line, 55.5);
        let h1 = &game.periods[&Period::H1];
        assert_eq!(h1.moneyline.best_away.as_ref().unwrap().american_odds, 120);
        assert!(game.moneyline.home.is_empty());
    }
}
