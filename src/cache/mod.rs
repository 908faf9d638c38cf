//! Cache module for keeping recent market data on disk
//!
//! This module provides a key-value store persisted to a single JSON file. Every
//! entry is stamped when written and is treated as missing once its TTL
//! (time-to-live) has elapsed; stale entries are evicted lazily when read.

mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CacheEntry, CacheError, CacheInfo, CacheStore, TIMESTAMP_FIELD};
