//! Library entrypoint for sportsbook-picks.
//!
//! Exposes all modules so the binary and integration tests can import them.

pub mod api;
pub mod config;
pub mod data;
pub mod odds;
pub mod picks;
pub mod predictions;
pub mod shutdown;
pub mod state;
pub mod stats;
