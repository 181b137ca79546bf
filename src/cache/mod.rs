//! In-memory query cache
//!
//! This module provides the [`CacheStore`], a keyed store holding the most
//! recent known value and fetch status for each logical query. Entries live for
//! the whole session; invalidation marks an entry stale but keeps its last
//! value visible so views can keep rendering while a refresh is pending.

mod store;

pub use store::{CacheEntry, CacheStore, QueryData, QueryKey, QueryStatus, Subscription};
