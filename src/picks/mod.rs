//! Tracked picks: creation from predictions and settlement.

pub mod builder;
pub mod evaluator;
pub mod models;

pub use models::{BetType, PickResult, PickSide, PickStatus, TeamIdentity, TrackedPick};
