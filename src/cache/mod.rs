//! Ephemeral data cache.
//!
//! This module provides the in-memory layer that sits in front of the data store:
//! - Values are keyed by a logical name (e.g. `portfolio_data`)
//! - Each entry carries its own TTL and expires lazily on read
//! - The cache is owned by the data-access layer, not shared globally

mod clock;
mod traits;
mod ttl;

#[cfg(test)]
pub use clock::ManualClock;
pub use traits::{CacheResult, CacheSource};
pub use ttl::TtlCache;
