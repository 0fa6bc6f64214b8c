//! Pick settlement against a final score.
//!
//! `evaluate` is a pure function of `(pick, score)`:
//!
//!   moneyline   won iff the picked team outscored the other, else lost
//!   spread      home: margin + line, away: -margin + |line|
//!               0 => push, > 0 => won, < 0 => lost, no line => void
//!   total       equal => push, over wins above, under wins below,
//!               no line => void
//!   player_prop pending (no automatic settlement source)
//!   other       void
//!
//! The side comes from the stored `PickSide`. Records without one fall
//! back to reading the selection text.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::models::{BetType, PickResult, PickSide, PickStatus, TrackedPick};
use crate::data::models::FinalScore;

/// Settlement outcome for a pick. Never mutates the pick.
pub fn evaluate(pick: &TrackedPick, score: &FinalScore) -> PickStatus {
    if !score.completed {
        return PickStatus::Pending;
    }

    match pick.bet_type {
        BetType::Moneyline => evaluate_moneyline(pick, score),
        BetType::Spread => evaluate_spread(pick, score),
        BetType::Total => evaluate_total(pick, score),
        BetType::PlayerProp => PickStatus::Pending,
        BetType::Other => PickStatus::Void,
    }
}

fn picked_home(pick: &TrackedPick) -> bool {
    match pick.side {
        Some(PickSide::Home) => true,
        Some(PickSide::Away) => false,
        _ => pick.pick.contains(pick.home_team.as_str()),
    }
}

fn picked_over(pick: &TrackedPick) -> bool {
    match pick.side {
        Some(PickSide::Over) => true,
        Some(PickSide::Under) => false,
        _ => pick.pick.to_uppercase().contains("OVER"),
    }
}

fn evaluate_moneyline(pick: &TrackedPick, score: &FinalScore) -> PickStatus {
    let won = if picked_home(pick) {
        score.home_score > score.away_score
    } else {
        score.away_score > score.home_score
    };
    if won {
        PickStatus::Won
    } else {
        PickStatus::Lost
    }
}

fn evaluate_spread(pick: &TrackedPick, score: &FinalScore) -> PickStatus {
    let Some(line) = pick.line else {
        return PickStatus::Void;
    };

    let margin = score.margin() as f64;
    let adjusted = if picked_home(pick) {
        margin + line
    } else {
        -margin + line.abs()
    };

    if adjusted == 0.0 {
        PickStatus::Push
    } else if adjusted > 0.0 {
        PickStatus::Won
    } else {
        PickStatus::Lost
    }
}

fn evaluate_total(pick: &TrackedPick, score: &FinalScore) -> PickStatus {
    let Some(line) = pick.line else {
        return PickStatus::Void;
    };

    let total = score.total_points() as f64;
    if total == line {
        return PickStatus::Push;
    }

    let over = picked_over(pick);
    if (over && total > line) || (!over && total < line) {
        PickStatus::Won
    } else {
        PickStatus::Lost
    }
}

/// Apply settlement to a pick in place.
///
/// Moves a pending pick to its terminal state exactly once. A pick that
/// is already terminal is returned unchanged, so retries with the same
/// score are harmless. Returns the pick's status afterwards.
pub fn settle(pick: &mut TrackedPick, score: &FinalScore, now: DateTime<Utc>) -> PickStatus {
    if pick.status.is_terminal() {
        debug!(pick_id = %pick.id, status = %pick.status, "Pick already settled");
        return pick.status;
    }

    let status = evaluate(pick, score);
    if !status.is_terminal() {
        return status;
    }

    let actual_value = match pick.bet_type {
        BetType::Spread => Some(score.margin() as f64),
        BetType::Total => Some(score.total_points() as f64),
        _ => None,
    };

    pick.status = status;
    pick.result = Some(PickResult {
        actual_score: Some(format!("{}-{}", score.home_score, score.away_score)),
        actual_value,
        settled_at: Some(now),
    });

    info!(
        pick_id = %pick.id,
        game_id = %pick.game_id,
        bet_type = %pick.bet_type,
        pick = %pick.pick,
        status = %status,
        home_score = score.home_score,
        away_score = score.away_score,
        "Pick settled"
    );

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(bet_type: BetType, text: &str, side: Option<PickSide>, line: Option<f64>) -> TrackedPick {
        TrackedPick {
            id: "p1".to_string(),
            game_id: "g1".to_string(),
            sport: "basketball_nba".to_string(),
            home_team: "Charlotte Hornets".to_string(),
            away_team: "Detroit Pistons".to_string(),
            game_time: Utc::now(),
            created_at: Utc::now(),
            bet_type,
            pick: text.to_string(),
            side,
            odds: -110,
            line,
            confidence: 65,
            reasoning: String::new(),
            edge: None,
            is_value_bet: false,
            status: PickStatus::Pending,
            result: None,
        }
    }

    fn score(home: i32, away: i32) -> FinalScore {
        FinalScore {
            game_id: "g1".to_string(),
            home_team: "Charlotte Hornets".to_string(),
            away_team: "Detroit Pistons".to_string(),
            home_score: home,
            away_score: away,
            completed: true,
        }
    }

    #[test]
    fn test_moneyline_home_and_away() {
        let s = score(110, 105);
        let home = pick(BetType::Moneyline, "Charlotte Hornets ML", None, None);
        let away = pick(BetType::Moneyline, "Detroit Pistons ML", None, None);
        assert_eq!(evaluate(&home, &s), PickStatus::Won);
        assert_eq!(evaluate(&away, &s), PickStatus::Lost);
    }

    #[test]
    fn test_moneyline_tie_is_loss() {
        let home = pick(BetType::Moneyline, "Charlotte Hornets ML", Some(PickSide::Home), None);
        assert_eq!(evaluate(&home, &score(100, 100)), PickStatus::Lost);
    }

    #[test]
    fn test_structured_side_beats_text() {
        // Text mentions the home team but the stored side is away.
        let p = pick(
            BetType::Moneyline,
            "Detroit over Charlotte Hornets",
            Some(PickSide::Away),
            None,
        );
        assert_eq!(evaluate(&p, &score(95, 100)), PickStatus::Won);
    }

    #[test]
    fn test_spread_cases() {
        let home = pick(BetType::Spread, "Charlotte Hornets -3.5", None, Some(-3.5));
        assert_eq!(evaluate(&home, &score(100, 95)), PickStatus::Won);
        assert_eq!(evaluate(&home, &score(100, 98)), PickStatus::Lost);

        let push = pick(BetType::Spread, "Charlotte Hornets -3", None, Some(-3.0));
        assert_eq!(evaluate(&push, &score(103, 100)), PickStatus::Push);

        // Away +3.5: -5 + 3.5 = -1.5
        let away = pick(BetType::Spread, "Detroit Pistons +3.5", None, Some(3.5));
        assert_eq!(evaluate(&away, &score(100, 95)), PickStatus::Lost);
        assert_eq!(evaluate(&away, &score(100, 98)), PickStatus::Won);
    }

    #[test]
    fn test_spread_missing_line_is_void() {
        let p = pick(BetType::Spread, "Charlotte Hornets -3.5", None, None);
        assert_eq!(evaluate(&p, &score(100, 95)), PickStatus::Void);
    }

    #[test]
    fn test_total_cases() {
        let over = pick(BetType::Total, "Over 210", None, Some(210.0));
        assert_eq!(evaluate(&over, &score(110, 105)), PickStatus::Won);
        assert_eq!(evaluate(&over, &score(100, 105)), PickStatus::Lost);
        assert_eq!(evaluate(&over, &score(105, 105)), PickStatus::Push);

        let under = pick(BetType::Total, "under 210", None, Some(210.0));
        assert_eq!(evaluate(&under, &score(100, 105)), PickStatus::Won);

        let missing = pick(BetType::Total, "Over", None, None);
        assert_eq!(evaluate(&missing, &score(100, 105)), PickStatus::Void);
    }

    #[test]
    fn test_player_prop_stays_pending() {
        let p = pick(BetType::PlayerProp, "LaMelo Ball over 24.5 points", None, Some(24.5));
        assert_eq!(evaluate(&p, &score(100, 95)), PickStatus::Pending);
        assert_eq!(evaluate(&p, &score(0, 0)), PickStatus::Pending);
    }

    #[test]
    fn test_other_bet_type_is_void() {
        let p = pick(BetType::Other, "Teaser", None, None);
        assert_eq!(evaluate(&p, &score(100, 95)), PickStatus::Void);
    }

    #[test]
    fn test_incomplete_score_not_settled() {
        let p = pick(BetType::Moneyline, "Charlotte Hornets ML", None, None);
        let mut s = score(100, 95);
        s.completed = false;
        assert_eq!(evaluate(&p, &s), PickStatus::Pending);
    }

    #[test]
    fn test_settle_is_idempotent() {
        let mut p = pick(BetType::Total, "Over 210", Some(PickSide::Over), Some(210.0));
        let now = Utc::now();
        assert_eq!(settle(&mut p, &score(110, 105), now), PickStatus::Won);
        let first = p.clone();
        assert_eq!(settle(&mut p, &score(110, 105), Utc::now()), PickStatus::Won);
        assert_eq!(p, first);

        let result = p.result.unwrap();
        assert_eq!(result.actual_score.as_deref(), Some("110-105"));
        assert_eq!(result.actual_value, Some(215.0));
        assert_eq!(result.settled_at, Some(now));
    }

    #[test]
    fn test_settle_prop_leaves_pick_pending() {
        let mut p = pick(BetType::PlayerProp, "LaMelo Ball over 24.5", None, Some(24.5));
        assert_eq!(settle(&mut p, &score(100, 95), Utc::now()), PickStatus::Pending);
        assert!(p.is_pending());
        assert!(p.result.is_none());
    }
}
