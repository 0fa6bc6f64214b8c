//! Performance statistics over tracked picks.

pub mod aggregator;

pub use aggregator::{aggregate, PerformanceStats};
