//! Wire models for The Odds API v4 and the score records derived from them.
//!
//! Prices arrive as decimal odds (`oddsFormat=decimal`). Scores arrive
//! as strings per team name and are parsed into `FinalScore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Odds endpoint
// =============================================================================

/// One event from `/v4/sports/{sport}/odds` or `/events/{id}/odds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub markets: Vec<BookmakerMarket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmakerMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    /// Decimal odds (e.g., 1.85 means $1 bet returns $1.85).
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
    /// Player name on prop markets.
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Scores endpoint
// =============================================================================

/// One event from `/v4/sports/{sport}/scores`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    #[serde(default)]
    pub completed: bool,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub scores: Option<Vec<TeamScore>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamScore {
    pub name: String,
    pub score: String,
}

/// Final (or in-progress) score for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub completed: bool,
}

impl FinalScore {
    pub fn total_points(&self) -> i32 {
        self.home_score + self.away_score
    }

    /// Home score minus away score.
    pub fn margin(&self) -> i32 {
        self.home_score - self.away_score
    }
}

impl ScoreEvent {
    /// Parse into a `FinalScore`. Returns `None` until both team scores
    /// are present and numeric.
    pub fn to_final_score(&self) -> Option<FinalScore> {
        let scores = self.scores.as_ref()?;
        let score_for = |team: &str| -> Option<i32> {
            scores
                .iter()
                .find(|s| s.name == team)
                .and_then(|s| s.score.trim().parse().ok())
        };

        Some(FinalScore {
            game_id: self.id.clone(),
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            home_score: score_for(&self.home_team)?,
            away_score: score_for(&self.away_team)?,
            completed: self.completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_odds_event() {
        let json = r#"{
            "id": "evt1",
            "sport_key": "basketball_nba",
            "commence_time": "2026-02-09T00:10:00Z",
            "home_team": "Charlotte Hornets",
            "away_team": "Detroit Pistons",
            "bookmakers": [{
                "key": "draftkings",
                "title": "DraftKings",
                "markets": [{
                    "key": "spreads",
                    "outcomes": [
                        {"name": "Charlotte Hornets", "price": 1.91, "point": -3.5},
                        {"name": "Detroit Pistons", "price": 1.91, "point": 3.5}
                    ]
                }]
            }]
        }"#;
        let event: OddsEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.home_team.as_deref(), Some("Charlotte Hornets"));
        let outcome = &event.bookmakers[0].markets[0].outcomes[0];
        assert_eq!(outcome.point, Some(-3.5));
        assert!(outcome.description.is_none());
    }

    #[test]
    fn test_score_event_to_final_score() {
        let json = r#"{
            "id": "evt1",
            "sport_key": "basketball_nba",
            "completed": true,
            "home_team": "Charlotte Hornets",
            "away_team": "Detroit Pistons",
            "scores": [
                {"name": "Detroit Pistons", "score": "95"},
                {"name": "Charlotte Hornets", "score": "100"}
            ]
        }"#;
        let event: ScoreEvent = serde_json::from_str(json).unwrap();
        let score = event.to_final_score().unwrap();
        assert_eq!(score.home_score, 100);
        assert_eq!(score.away_score, 95);
        assert_eq!(score.margin(), 5);
        assert_eq!(score.total_points(), 195);
        assert!(score.completed);
    }

    #[test]
    fn test_score_event_without_scores() {
        let json = r#"{
            "id": "evt2",
            "completed": false,
            "home_team": "A",
            "away_team": "B",
            "scores": null
        }"#;
        let event: ScoreEvent = serde_json::from_str(json).unwrap();
        assert!(event.to_final_score().is_none());
    }
}
