//! Market-consensus baseline predictor.
//!
//! Devigs every bookmaker's two-way moneyline, averages the fair home
//! win probability across books and backs the favorite with that
//! probability as its confidence. Edge then comes purely from line
//! shopping: the best available price versus the consensus.

use async_trait::async_trait;
use tracing::debug;

use super::{PredictionError, PredictionSource};
use crate::odds::markets::NormalizedGameOdds;
use crate::odds::math::fair_probability;
use crate::picks::builder::{Prediction, PredictionLeg};

#[derive(Debug, Clone)]
pub struct ConsensusSource {
    /// Minimum number of books quoting both sides.
    pub min_books: usize,
}

impl Default for ConsensusSource {
    fn default() -> Self {
        Self { min_books: 2 }
    }
}

/// Average devigged home win probability and the number of books used.
pub fn consensus_home_probability(game: &NormalizedGameOdds) -> Option<(f64, usize)> {
    let mut fair_probs = Vec::new();

    for home in &game.moneyline.home {
        let Some(away) = game
            .moneyline
            .away
            .iter()
            .find(|q| q.bookmaker == home.bookmaker)
        else {
            continue;
        };
        if let Ok(p) = fair_probability(home.decimal_odds, away.decimal_odds) {
            fair_probs.push(p);
        }
    }

    if fair_probs.is_empty() {
        return None;
    }
    let count = fair_probs.len();
    Some((fair_probs.iter().sum::<f64>() / count as f64, count))
}

#[async_trait]
impl PredictionSource for ConsensusSource {
    fn name(&self) -> &str {
        "consensus"
    }

    async fn predict(&self, game: &NormalizedGameOdds) -> Result<Prediction, PredictionError> {
        let (home_prob, books) = consensus_home_probability(game).ok_or_else(|| {
            PredictionError::InsufficientData(format!("no two-way moneyline for {}", game.game_id))
        })?;

        if books < self.min_books {
            return Err(PredictionError::InsufficientData(format!(
                "{books} book(s) quoting {}, need {}",
                game.game_id, self.min_books
            )));
        }

        let (team, prob) = if home_prob >= 0.5 {
            (&game.home_team, home_prob)
        } else {
            (&game.away_team, 1.0 - home_prob)
        };
        let confidence = (prob * 100.0).round().clamp(0.0, 100.0) as u8;

        debug!(game_id = %game.game_id, team = %team, books, confidence, "Consensus prediction");

        Ok(Prediction {
            winner: Some(PredictionLeg {
                pick: team.clone(),
                confidence,
                reasoning: format!("Devigged consensus of {books} books: {:.1}%", prob * 100.0),
                line: None,
                edge: None,
            }),
            spread: None,
            total: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::markets::MoneylineOdds;
    use crate::odds::Quote;

    fn q(book: &str, decimal: f64) -> Quote {
        Quote::from_decimal(book, decimal, None).unwrap()
    }

    fn game(home: Vec<Quote>, away: Vec<Quote>) -> NormalizedGameOdds {
        NormalizedGameOdds {
            game_id: "g1".to_string(),
            sport_key: "basketball_nba".to_string(),
            home_team: "Charlotte Hornets".to_string(),
            away_team: "Detroit Pistons".to_string(),
            commence_time: None,
            moneyline: MoneylineOdds {
                home,
                away,
                ..MoneylineOdds::default()
            },
            spread: Default::default(),
            total: Default::default(),
            alternate_spreads: Default::default(),
            alternate_totals: Default::default(),
            periods: Default::default(),
            issues: vec![],
        }
    }

    #[test]
    fn test_even_market_devigs_to_half() {
        // 1.90 / 1.90: 52.63% each, vig 5.26%, fair 50%.
        let g = game(vec![q("A", 1.90)], vec![q("A", 1.90)]);
        let (p, books) = consensus_home_probability(&g).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
        assert_eq!(books, 1);
    }

    #[test]
    fn test_unpaired_books_ignored() {
        let g = game(vec![q("A", 1.50), q("B", 1.55)], vec![q("A", 2.80)]);
        let (_, books) = consensus_home_probability(&g).unwrap();
        assert_eq!(books, 1);
        assert!(consensus_home_probability(&game(vec![q("A", 1.5)], vec![])).is_none());
    }

    #[tokio::test]
    async fn test_backs_the_favorite() {
        // 1.50 / 2.80: home raw 66.67%, away 35.71%, home fair ~65.1%.
        let g = game(
            vec![q("A", 1.50), q("B", 1.50)],
            vec![q("A", 2.80), q("B", 2.80)],
        );
        let prediction = ConsensusSource::default().predict(&g).await.unwrap();
        let leg = prediction.winner.unwrap();
        assert_eq!(leg.pick, "Charlotte Hornets");
        assert_eq!(leg.confidence, 65);
        assert!(prediction.spread.is_none());
    }

    #[tokio::test]
    async fn test_too_few_books_is_insufficient() {
        let g = game(vec![q("A", 1.50)], vec![q("A", 2.80)]);
        let err = ConsensusSource::default().predict(&g).await.unwrap_err();
        assert!(matches!(err, PredictionError::InsufficientData(_)));
        assert!(!err.is_retryable());
    }
}
