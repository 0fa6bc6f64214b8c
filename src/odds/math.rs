//! Odds-format conversions and bet-sizing math.
//!
//! Sportsbooks quote the same price two ways:
//!     decimal  d  : total return per 1 unit staked (stake included)
//!     American a  : +a wins a per 100 staked, -a stakes a to win 100
//!
//! Conversions:
//!     a > 0  =>  d = a/100 + 1
//!     a < 0  =>  d = 100/|a| + 1
//!     d >= 2 =>  a = round((d - 1) * 100)
//!     d < 2  =>  a = round(-100 / (d - 1))
//!
//! Probability, vig, EV and Kelly work on decimal odds. Unit accounting
//! for settled picks uses the exact `Decimal` payout instead of `f64`.

use rust_decimal::Decimal;
use thiserror::Error;

/// Quarter Kelly.
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OddsError {
    #[error("Invalid decimal odds: {0} (must be > 1.0)")]
    InvalidDecimal(f64),

    #[error("Invalid American odds: {0}")]
    InvalidAmerican(i32),

    #[error("Invalid probability: {0} (must be in (0, 1))")]
    InvalidProbability(f64),

    #[error("Invalid amount: {0} (must be >= 0)")]
    InvalidAmount(f64),
}

/// Convert American odds to decimal odds.
pub fn american_to_decimal(american: i32) -> Result<f64, OddsError> {
    match american {
        0 => Err(OddsError::InvalidAmerican(american)),
        a if a > 0 => Ok(a as f64 / 100.0 + 1.0),
        a => Ok(100.0 / (a as f64).abs() + 1.0),
    }
}

/// Convert decimal odds to American odds, rounded to the nearest integer.
pub fn decimal_to_american(decimal: f64) -> Result<i32, OddsError> {
    let d = validate_decimal(decimal)?;
    let american = if d >= 2.0 {
        ((d - 1.0) * 100.0).round()
    } else {
        (-100.0 / (d - 1.0)).round()
    };
    Ok(american as i32)
}

/// Exact payout multiplier for American odds (stake included).
///
/// -110 => 1.9090..., +150 => 2.5
pub fn american_to_payout(american: i32) -> Result<Decimal, OddsError> {
    let hundred = Decimal::ONE_HUNDRED;
    match american {
        0 => Err(OddsError::InvalidAmerican(american)),
        a if a > 0 => Ok(Decimal::from(a) / hundred + Decimal::ONE),
        a => Ok(hundred / Decimal::from(a).abs() + Decimal::ONE),
    }
}

/// Implied probability of decimal odds: 1/d.
pub fn implied_probability_decimal(decimal: f64) -> Result<f64, OddsError> {
    Ok(1.0 / validate_decimal(decimal)?)
}

/// Implied probability of American odds.
pub fn implied_probability_american(american: i32) -> Result<f64, OddsError> {
    implied_probability_decimal(american_to_decimal(american)?)
}

/// Bookmaker margin of a two-outcome market.
///
/// vig = p(A) + p(B) - 1. A 1.91 / 1.91 market carries ~4.7% vig.
pub fn vig(decimal_a: f64, decimal_b: f64) -> Result<f64, OddsError> {
    Ok(implied_probability_decimal(decimal_a)? + implied_probability_decimal(decimal_b)? - 1.0)
}

/// Vig-free probability of one side, removing the margin proportionally.
pub fn fair_probability(decimal: f64, opposing_decimal: f64) -> Result<f64, OddsError> {
    let raw = implied_probability_decimal(decimal)?;
    let margin = vig(decimal, opposing_decimal)?;
    Ok(raw / (1.0 + margin))
}

/// Expected profit of a stake at decimal odds given a fair probability.
///
/// EV = p * stake * (d - 1) - (1 - p) * stake
pub fn expected_value(fair_prob: f64, decimal: f64, stake: f64) -> Result<f64, OddsError> {
    let p = validate_probability(fair_prob)?;
    let d = validate_decimal(decimal)?;
    let stake = validate_amount(stake)?;
    Ok(p * stake * (d - 1.0) - (1.0 - p) * stake)
}

/// Fractional Kelly stake.
///
/// f* = (b*p - q) / b with b = d - 1, clamped to 0 on negative EV,
/// then scaled by `fraction` and `bankroll`.
pub fn kelly_stake(
    fair_prob: f64,
    decimal: f64,
    bankroll: f64,
    fraction: f64,
) -> Result<f64, OddsError> {
    let p = validate_probability(fair_prob)?;
    let d = validate_decimal(decimal)?;
    let bankroll = validate_amount(bankroll)?;
    let fraction = validate_amount(fraction)?;

    let b = d - 1.0;
    let q = 1.0 - p;
    let f_star = ((b * p - q) / b).max(0.0);

    Ok(f_star * fraction * bankroll)
}

fn validate_decimal(decimal: f64) -> Result<f64, OddsError> {
    if decimal.is_finite() && decimal > 1.0 {
        Ok(decimal)
    } else {
        Err(OddsError::InvalidDecimal(decimal))
    }
}

fn validate_probability(prob: f64) -> Result<f64, OddsError> {
    if prob.is_finite() && prob > 0.0 && prob < 1.0 {
        Ok(prob)
    } else {
        Err(OddsError::InvalidProbability(prob))
    }
}

fn validate_amount(amount: f64) -> Result<f64, OddsError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(OddsError::InvalidAmount(amount))
    }
}
