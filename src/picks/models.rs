//! Tracked pick records and the team identity used to resolve sides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    Moneyline,
    Spread,
    Total,
    PlayerProp,
    /// Unrecognized bet type read from storage; always settles void.
    #[serde(other)]
    Other,
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Moneyline => "moneyline",
            Self::Spread => "spread",
            Self::Total => "total",
            Self::PlayerProp => "player_prop",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Pick lifecycle: `Pending` is initial, every other state is terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Push,
    Void,
}

impl PickStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Won or lost: counts toward win rate.
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl fmt::Display for PickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Push => "push",
            Self::Void => "void",
        };
        write!(f, "{s}")
    }
}

/// Side of the market a pick backs, resolved when the pick is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSide {
    Home,
    Away,
    Over,
    Under,
}

// =============================================================================
// Team identity
// =============================================================================

/// Canonical team name plus the aliases it may appear under in free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamIdentity {
    pub canonical: String,
    pub aliases: Vec<String>,
}

impl TeamIdentity {
    /// Identity for a full team name. The nickname ("Hornets" for
    /// "Charlotte Hornets") is registered as an alias; the city is not,
    /// since cities are shared ("Los Angeles", "New York").
    pub fn new(canonical: &str) -> Self {
        let canonical = canonical.trim().to_string();
        let mut aliases = Vec::new();
        let words: Vec<&str> = canonical.split_whitespace().collect();
        if words.len() > 1 {
            if let Some(nickname) = words.last() {
                aliases.push(nickname.to_string());
            }
        }
        Self { canonical, aliases }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Case-insensitive containment of the canonical name.
    pub fn matches_canonical(&self, text: &str) -> bool {
        !self.canonical.is_empty() && text.to_lowercase().contains(&self.canonical.to_lowercase())
    }

    /// Case-insensitive containment of the canonical name or any alias.
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.matches_canonical(text)
            || self
                .aliases
                .iter()
                .filter(|a| !a.is_empty())
                .any(|a| lower.contains(&a.to_lowercase()))
    }
}

/// Resolve which team a free-text selection refers to.
///
/// Returns `None` when neither or both teams match even after preferring
/// the canonical names.
pub fn resolve_team_side(
    text: &str,
    home: &TeamIdentity,
    away: &TeamIdentity,
) -> Option<PickSide> {
    match (home.matches(text), away.matches(text)) {
        (true, false) => Some(PickSide::Home),
        (false, true) => Some(PickSide::Away),
        (true, true) => match (home.matches_canonical(text), away.matches_canonical(text)) {
            (true, false) => Some(PickSide::Home),
            (false, true) => Some(PickSide::Away),
            _ => None,
        },
        (false, false) => None,
    }
}

/// Over/Under from free text, case-insensitive.
pub fn resolve_total_side(text: &str) -> Option<PickSide> {
    let upper = text.to_uppercase();
    if upper.contains("OVER") {
        Some(PickSide::Over)
    } else if upper.contains("UNDER") {
        Some(PickSide::Under)
    } else {
        None
    }
}

// =============================================================================
// Tracked pick
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

/// Persisted record of a recommended bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPick {
    pub id: String,
    pub game_id: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub game_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    pub bet_type: BetType,
    /// Human-readable selection, e.g. "Charlotte Hornets -3.5".
    pub pick: String,
    /// Structured side; absent on records created before sides were stored.
    #[serde(default)]
    pub side: Option<PickSide>,
    /// American odds.
    pub odds: i32,
    #[serde(default)]
    pub line: Option<f64>,

    /// 0-100.
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub edge: Option<f64>,
    #[serde(default)]
    pub is_value_bet: bool,

    #[serde(default)]
    pub status: PickStatus,
    #[serde(default)]
    pub result: Option<PickResult>,
}

impl TrackedPick {
    pub fn is_pending(&self) -> bool {
        self.status == PickStatus::Pending
    }

    /// Pending and the game has started: belongs to the settlement queue.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.game_time <= now
    }
}
