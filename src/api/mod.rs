//! The Odds API REST client.

pub mod client;
pub mod errors;

pub use client::{ApiQuota, ClientConfig, OddsApiClient};
pub use errors::ApiError;
