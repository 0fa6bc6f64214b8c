//! Turns a model prediction for one game into pending tracked picks.
//!
//! Sides are resolved here, once, against the game's team identities and
//! stored on the pick. Odds come from the best current bookmaker quote
//! for the resolved side; when the board has nothing for that side the
//! standard juice is assumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{
    resolve_team_side, resolve_total_side, BetType, PickSide, PickStatus, TeamIdentity,
    TrackedPick,
};
use crate::odds::markets::NormalizedGameOdds;
use crate::odds::math::implied_probability_american;
use crate::odds::{best_quote, line_key, Quote};

/// Standard -110 juice used when no quote is available.
pub const DEFAULT_JUICE: i32 = -110;

// =============================================================================
// Prediction shape
// =============================================================================

/// One recommended leg of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionLeg {
    pub pick: String,
    /// 0-100.
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub line: Option<f64>,
    /// Edge in percentage points, when the model supplies one.
    #[serde(default)]
    pub edge: Option<f64>,
}

/// Structured prediction for a single game. Any leg may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub winner: Option<PredictionLeg>,
    #[serde(default)]
    pub spread: Option<PredictionLeg>,
    #[serde(default)]
    pub total: Option<PredictionLeg>,
}

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Minimum edge (percentage points) for a pick to count as a value bet.
    pub value_edge_threshold: f64,
    /// American odds assumed when no bookmaker quotes the picked side.
    pub default_juice: i32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            value_edge_threshold: 5.0,
            default_juice: DEFAULT_JUICE,
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Build pending picks for every leg of `prediction` whose side resolves.
///
/// A leg whose selection names neither team (or is not over/under for a
/// total) is dropped with a warning rather than stored unresolvable.
pub fn picks_from_prediction(
    game: &NormalizedGameOdds,
    prediction: &Prediction,
    config: &BuilderConfig,
    now: DateTime<Utc>,
) -> Vec<TrackedPick> {
    let home = TeamIdentity::new(&game.home_team);
    let away = TeamIdentity::new(&game.away_team);
    let mut picks = Vec::new();

    if let Some(leg) = &prediction.winner {
        match resolve_team_side(&leg.pick, &home, &away) {
            Some(side) => {
                let quotes = match side {
                    PickSide::Home => &game.moneyline.home,
                    _ => &game.moneyline.away,
                };
                let odds = best_odds(quotes, None, config.default_juice);
                picks.push(new_pick(game, BetType::Moneyline, leg, side, odds, None, config, now));
            }
            None => warn_unresolved(game, BetType::Moneyline, leg),
        }
    }

    if let Some(leg) = &prediction.spread {
        match resolve_team_side(&leg.pick, &home, &away) {
            Some(side) => {
                let (quotes, board_line) = match side {
                    PickSide::Home => (&game.spread.home, game.spread.consensus_line),
                    _ => (&game.spread.away, game.spread.away_line()),
                };
                let line = leg.line.or(board_line);
                let odds = best_odds(quotes, line, config.default_juice);
                picks.push(new_pick(game, BetType::Spread, leg, side, odds, line, config, now));
            }
            None => warn_unresolved(game, BetType::Spread, leg),
        }
    }

    if let Some(leg) = &prediction.total {
        match resolve_total_side(&leg.pick) {
            Some(side) => {
                let quotes = match side {
                    PickSide::Over => &game.total.over,
                    _ => &game.total.under,
                };
                let line = leg.line.or(game.total.consensus_line);
                let odds = best_odds(quotes, line, config.default_juice);
                picks.push(new_pick(game, BetType::Total, leg, side, odds, line, config, now));
            }
            None => warn_unresolved(game, BetType::Total, leg),
        }
    }

    debug!(game_id = %game.game_id, picks = picks.len(), "Built picks from prediction");
    picks
}

/// Best quote at `line` if any book offers it, else best overall.
fn best_odds(quotes: &[Quote], line: Option<f64>, default_juice: i32) -> i32 {
    let at_line: Vec<Quote> = match line {
        Some(l) => quotes
            .iter()
            .filter(|q| q.point.map(line_key) == Some(line_key(l)))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    best_quote(&at_line)
        .or_else(|| best_quote(quotes))
        .map(|q| q.american_odds)
        .unwrap_or(default_juice)
}

/// Model confidence minus the price's implied probability, in percentage points.
pub fn confidence_edge(confidence: u8, american_odds: i32) -> Option<f64> {
    let implied = implied_probability_american(american_odds).ok()?;
    let edge = (f64::from(confidence) / 100.0 - implied) * 100.0;
    Some((edge * 100.0).round() / 100.0)
}

#[allow(clippy::too_many_arguments)]
fn new_pick(
    game: &NormalizedGameOdds,
    bet_type: BetType,
    leg: &PredictionLeg,
    side: PickSide,
    odds: i32,
    line: Option<f64>,
    config: &BuilderConfig,
    now: DateTime<Utc>,
) -> TrackedPick {
    let confidence = leg.confidence.min(100);
    let edge = leg.edge.or_else(|| confidence_edge(confidence, odds));
    let is_value_bet = edge.is_some_and(|e| e >= config.value_edge_threshold);

    TrackedPick {
        id: Uuid::new_v4().to_string(),
        game_id: game.game_id.clone(),
        sport: game.sport_key.clone(),
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        game_time: game.commence_time.unwrap_or(now),
        created_at: now,
        bet_type,
        pick: leg.pick.clone(),
        side: Some(side),
        odds,
        line,
        confidence,
        reasoning: leg.reasoning.clone(),
        edge,
        is_value_bet,
        status: PickStatus::Pending,
        result: None,
    }
}

fn warn_unresolved(game: &NormalizedGameOdds, bet_type: BetType, leg: &PredictionLeg) {
    warn!(
        game_id = %game.game_id,
        bet_type = %bet_type,
        pick = %leg.pick,
        "Could not resolve pick side, dropping leg"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::markets::{MoneylineOdds, SpreadOdds, TotalOdds};

    fn quote(book: &str, american: i32, point: Option<f64>) -> Quote {
        Quote {
            bookmaker: book.to_string(),
            american_odds: american,
            decimal_odds: crate::odds::math::american_to_decimal(american).unwrap(),
            point,
        }
    }

    fn game() -> NormalizedGameOdds {
        NormalizedGameOdds {
            game_id: "g1".to_string(),
            sport_key: "basketball_nba".to_string(),
            home_team: "Charlotte Hornets".to_string(),
            away_team: "Detroit Pistons".to_string(),
            commence_time: None,
            moneyline: MoneylineOdds {
                home: vec![quote("BookA", -150, None), quote("BookB", -140, None)],
                away: vec![quote("BookA", 130, None)],
                ..MoneylineOdds::default()
            },
            spread: SpreadOdds {
                home: vec![quote("BookA", -110, Some(-3.5)), quote("BookB", -105, Some(-3.0))],
                away: vec![quote("BookA", -110, Some(3.5)), quote("BookB", -115, Some(3.0))],
                consensus_line: Some(-3.5),
            },
            total: TotalOdds {
                over: vec![quote("BookA", -108, Some(220.5))],
                under: vec![],
                consensus_line: Some(220.5),
            },
            alternate_spreads: Default::default(),
            alternate_totals: Default::default(),
            periods: Default::default(),
            issues: vec![],
        }
    }

    fn leg(pick: &str, confidence: u8, line: Option<f64>) -> PredictionLeg {
        PredictionLeg {
            pick: pick.to_string(),
            confidence,
            reasoning: "model".to_string(),
            line,
            edge: None,
        }
    }

    #[test]
    fn test_builds_all_three_legs() {
        let prediction = Prediction {
            winner: Some(leg("Hornets ML", 70, None)),
            spread: Some(leg("Detroit Pistons +3.5", 62, None)),
            total: Some(leg("Under 220.5", 55, None)),
        };
        let now = Utc::now();
        let picks = picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), now);
        assert_eq!(picks.len(), 3);

        let ml = &picks[0];
        assert_eq!(ml.bet_type, BetType::Moneyline);
        assert_eq!(ml.side, Some(PickSide::Home));
        assert_eq!(ml.odds, -140);
        assert_eq!(ml.game_time, now);
        assert!(ml.is_pending());

        let spread = &picks[1];
        assert_eq!(spread.side, Some(PickSide::Away));
        assert_eq!(spread.line, Some(3.5));
        assert_eq!(spread.odds, -110);

        // No under quotes on the board: default juice.
        let total = &picks[2];
        assert_eq!(total.side, Some(PickSide::Under));
        assert_eq!(total.line, Some(220.5));
        assert_eq!(total.odds, DEFAULT_JUICE);
    }

    #[test]
    fn test_edge_and_value_flag() {
        // -140 implies 58.33%; 70 confidence => +11.67 edge.
        let prediction = Prediction {
            winner: Some(leg("Charlotte Hornets", 70, None)),
            ..Prediction::default()
        };
        let picks =
            picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), Utc::now());
        assert_eq!(picks[0].edge, Some(11.67));
        assert!(picks[0].is_value_bet);

        // +130 implies 43.48%; 45 confidence => +1.52 edge, below 5.
        let prediction = Prediction {
            winner: Some(leg("Detroit Pistons", 45, None)),
            ..Prediction::default()
        };
        let picks =
            picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), Utc::now());
        assert_eq!(picks[0].edge, Some(1.52));
        assert!(!picks[0].is_value_bet);
    }

    #[test]
    fn test_model_edge_takes_precedence() {
        let mut l = leg("Charlotte Hornets", 50, None);
        l.edge = Some(8.0);
        let prediction = Prediction {
            winner: Some(l),
            ..Prediction::default()
        };
        let picks =
            picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), Utc::now());
        assert_eq!(picks[0].edge, Some(8.0));
        assert!(picks[0].is_value_bet);
    }

    #[test]
    fn test_unresolvable_leg_dropped() {
        let prediction = Prediction {
            winner: Some(leg("Boston Celtics", 70, None)),
            total: Some(leg("220.5", 60, None)),
            ..Prediction::default()
        };
        let picks =
            picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), Utc::now());
        assert!(picks.is_empty());
    }

    #[test]
    fn test_explicit_line_prefers_matching_quote() {
        let prediction = Prediction {
            spread: Some(leg("Charlotte Hornets -3", 60, Some(-3.0))),
            ..Prediction::default()
        };
        let picks =
            picks_from_prediction(&game(), &prediction, &BuilderConfig::default(), Utc::now());
        assert_eq!(picks[0].line, Some(-3.0));
        assert_eq!(picks[0].odds, -105);
    }
}
