//! Shared state: tracked pick storage and the TTL cache.

pub mod cache;
pub mod pick_store;

pub use cache::TtlCache;
pub use pick_store::{InMemoryPickStore, PickStore, StoreError};
