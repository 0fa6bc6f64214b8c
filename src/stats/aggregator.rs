//! Performance statistics folded from tracked picks.
//!
//! Unit accounting (one unit staked per pick):
//!
//! ```text
//!     won       +(payout - 1)
//!     lost      -1
//!     push/void  0
//!
//!     win_rate = wins / (wins + losses) * 100
//!     roi      = net_units / units_wagered * 100
//! ```
//!
//! `units_wagered` counts won, lost and pushed picks; voids were never
//! really in action. Rates, ROI and net units are rounded to 2 dp. The
//! fold is recomputed from scratch each time and is deterministic for a
//! given set of picks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::odds::math::american_to_payout;
use crate::picks::models::{BetType, PickStatus, TrackedPick};

// =============================================================================
// Output types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakKind {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "L")]
    Loss,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    #[serde(rename = "type")]
    pub kind: StreakKind,
    pub count: u32,
}

impl Streak {
    pub const NONE: Streak = Streak {
        kind: StreakKind::None,
        count: 0,
    };
}

impl fmt::Display for Streak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StreakKind::Win => write!(f, "W{}", self.count),
            StreakKind::Loss => write!(f, "L{}", self.count),
            StreakKind::None => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            70..=u8::MAX => Self::High,
            60..=69 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Win/loss and unit figures for a subset of settled picks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    /// Settled picks in the subset.
    pub picks: u32,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub win_rate: Decimal,
    pub net_units: Decimal,
    pub roi: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBetStats {
    pub picks: u32,
    pub wins: u32,
    pub win_rate: Decimal,
    pub net_units: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_picks: u32,
    pub pending_picks: u32,
    pub settled_picks: u32,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub voids: u32,
    /// Settled picks left out of every tally because their odds are not
    /// valid American odds.
    pub invalid_odds: u32,

    pub win_rate: Decimal,
    pub units_wagered: Decimal,
    pub net_units: Decimal,
    pub roi: Decimal,

    pub current_streak: Streak,
    pub longest_win_streak: u32,
    pub longest_loss_streak: u32,

    pub by_bet_type: BTreeMap<BetType, Breakdown>,
    pub by_sport: BTreeMap<String, Breakdown>,
    pub by_confidence: BTreeMap<ConfidenceTier, Breakdown>,
    pub value_bets: ValueBetStats,
}

// =============================================================================
// Accumulator
// =============================================================================

#[derive(Debug, Default, Clone)]
struct Tally {
    settled: u32,
    wins: u32,
    losses: u32,
    pushes: u32,
    voids: u32,
    wagered: Decimal,
    net: Decimal,
}

impl Tally {
    /// `payout` is the pick's decimal payout multiplier.
    fn add(&mut self, pick: &TrackedPick, payout: Decimal) {
        match pick.status {
            PickStatus::Pending => return,
            PickStatus::Won => {
                self.wins += 1;
                self.wagered += Decimal::ONE;
                self.net += payout - Decimal::ONE;
            }
            PickStatus::Lost => {
                self.losses += 1;
                self.wagered += Decimal::ONE;
                self.net -= Decimal::ONE;
            }
            PickStatus::Push => {
                self.pushes += 1;
                self.wagered += Decimal::ONE;
            }
            PickStatus::Void => self.voids += 1,
        }
        self.settled += 1;
    }

    fn win_rate(&self) -> Decimal {
        let decided = self.wins + self.losses;
        if decided == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.wins) * Decimal::ONE_HUNDRED / Decimal::from(decided)).round_dp(2)
    }

    fn roi(&self) -> Decimal {
        if self.wagered.is_zero() {
            return Decimal::ZERO;
        }
        (self.net / self.wagered * Decimal::ONE_HUNDRED).round_dp(2)
    }

    fn breakdown(&self) -> Breakdown {
        Breakdown {
            picks: self.settled,
            wins: self.wins,
            losses: self.losses,
            pushes: self.pushes,
            win_rate: self.win_rate(),
            net_units: self.net.round_dp(2),
            roi: self.roi(),
        }
    }
}

// =============================================================================
// Streaks
// =============================================================================

/// Settled picks, oldest first.
///
/// Legs of one prediction share `created_at`, so ties fall back to
/// `game_time` and then `id`. The order never depends on input order.
fn settled_chronological(picks: &[TrackedPick]) -> Vec<&TrackedPick> {
    let mut settled: Vec<&TrackedPick> = picks.iter().filter(|p| p.status.is_terminal()).collect();
    settled.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.game_time.cmp(&b.game_time))
            .then_with(|| a.id.cmp(&b.id))
    });
    settled
}

/// Streak ending at the most recent settled pick.
///
/// Scans from the newest settled pick backwards and stops at the first
/// push/void or change of outcome.
pub fn current_streak(picks: &[TrackedPick]) -> Streak {
    let settled = settled_chronological(picks);
    let mut newest_first = settled.iter().rev().map(|p| p.status).peekable();

    let kind = match newest_first.peek() {
        Some(PickStatus::Won) => StreakKind::Win,
        Some(PickStatus::Lost) => StreakKind::Loss,
        _ => return Streak::NONE,
    };
    let target = if kind == StreakKind::Win {
        PickStatus::Won
    } else {
        PickStatus::Lost
    };

    let count = newest_first.take_while(|s| *s == target).count() as u32;
    Streak { kind, count }
}

/// Longest chronological runs of wins and of losses. Pushes and voids
/// break a run.
fn longest_streaks(picks: &[TrackedPick]) -> (u32, u32) {
    let (mut best_w, mut best_l, mut run_w, mut run_l) = (0u32, 0u32, 0u32, 0u32);
    for pick in settled_chronological(picks) {
        match pick.status {
            PickStatus::Won => {
                run_w += 1;
                run_l = 0;
            }
            PickStatus::Lost => {
                run_l += 1;
                run_w = 0;
            }
            _ => {
                run_w = 0;
                run_l = 0;
            }
        }
        best_w = best_w.max(run_w);
        best_l = best_l.max(run_l);
    }
    (best_w, best_l)
}

// =============================================================================
// Fold
// =============================================================================

/// Fold a set of picks (any mix of statuses) into performance statistics.
pub fn aggregate(picks: &[TrackedPick]) -> PerformanceStats {
    let mut overall = Tally::default();
    let mut by_bet_type: BTreeMap<BetType, Tally> = BTreeMap::new();
    let mut by_sport: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_confidence: BTreeMap<ConfidenceTier, Tally> = BTreeMap::new();
    let mut value = Tally::default();
    let mut pending = 0u32;
    let mut invalid_odds = 0u32;

    for pick in picks {
        if pick.is_pending() {
            pending += 1;
            continue;
        }
        let payout = match american_to_payout(pick.odds) {
            Ok(payout) => payout,
            Err(e) => {
                warn!(
                    pick_id = %pick.id,
                    odds = pick.odds,
                    error = %e,
                    "Settled pick has invalid odds, excluded from stats"
                );
                invalid_odds += 1;
                continue;
            }
        };

        overall.add(pick, payout);
        by_bet_type.entry(pick.bet_type).or_default().add(pick, payout);
        by_sport.entry(pick.sport.clone()).or_default().add(pick, payout);
        by_confidence
            .entry(ConfidenceTier::from_confidence(pick.confidence))
            .or_default()
            .add(pick, payout);
        if pick.is_value_bet {
            value.add(pick, payout);
        }
    }

    let (longest_win_streak, longest_loss_streak) = longest_streaks(picks);

    PerformanceStats {
        total_picks: picks.len() as u32,
        pending_picks: pending,
        settled_picks: overall.settled,
        wins: overall.wins,
        losses: overall.losses,
        pushes: overall.pushes,
        voids: overall.voids,
        invalid_odds,
        win_rate: overall.win_rate(),
        units_wagered: overall.wagered,
        net_units: overall.net.round_dp(2),
        roi: overall.roi(),
        current_streak: current_streak(picks),
        longest_win_streak,
        longest_loss_streak,
        by_bet_type: by_bet_type.iter().map(|(k, t)| (*k, t.breakdown())).collect(),
        by_sport: by_sport.iter().map(|(k, t)| (k.clone(), t.breakdown())).collect(),
        by_confidence: by_confidence.iter().map(|(k, t)| (*k, t.breakdown())).collect(),
        value_bets: ValueBetStats {
            picks: value.settled,
            wins: value.wins,
            win_rate: value.win_rate(),
            net_units: value.net.round_dp(2),
        },
    }
}
