//! Wire models and the polling feeds built on them.

pub mod models;
pub mod odds_feed;
pub mod scores_feed;
