//! Keyed query cache with per-key change notification
//!
//! Each key owns a `watch` channel carrying its current [`CacheEntry`], so
//! subscribers always observe whole entries (value, status and error change
//! together) and late subscribers start from the latest state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::data::{Marker, TransportError};

/// Identity under which a read result is cached
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The full marker list
    Markers,
    /// A single marker by id
    Marker(String),
}

impl QueryKey {
    pub fn marker(marker_id: impl Into<String>) -> Self {
        QueryKey::Marker(marker_id.into())
    }

    /// A detail key without an id is not ready to be fetched yet
    pub fn is_ready(&self) -> bool {
        match self {
            QueryKey::Markers => true,
            QueryKey::Marker(id) => !id.trim().is_empty(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Markers => f.write_str("markers"),
            QueryKey::Marker(id) => write!(f, "marker:{}", id),
        }
    }
}

/// Payload cached under a [`QueryKey`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Markers(Vec<Marker>),
    Marker(Marker),
}

/// Lifecycle of a cached query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Never fetched, or not ready to be fetched
    #[default]
    Idle,
    /// A request is in flight
    Loading,
    /// The last request succeeded
    Success,
    /// The last request failed
    Error,
}

/// Snapshot of one cached query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Last successfully fetched payload
    pub value: Option<QueryData>,
    pub status: QueryStatus,
    /// Last failure, present only while `status` is `Error`
    pub error: Option<TransportError>,
    /// Invalidated since the value was fetched
    pub is_stale: bool,
    /// When the value was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// A successful value that has not been invalidated can be served as-is
    pub fn is_fresh(&self) -> bool {
        self.is_success() && !self.is_stale
    }

    pub fn markers(&self) -> Option<&[Marker]> {
        match &self.value {
            Some(QueryData::Markers(markers)) => Some(markers),
            _ => None,
        }
    }

    pub fn marker(&self) -> Option<&Marker> {
        match &self.value {
            Some(QueryData::Marker(marker)) => Some(marker),
            _ => None,
        }
    }

    /// Records the outcome of a fetch
    ///
    /// Failures keep the previous value visible, except not-found which clears
    /// it so a deleted marker cannot be rendered from cache.
    fn apply(&mut self, result: Result<QueryData, TransportError>) {
        match result {
            Ok(data) => {
                self.value = Some(data);
                self.status = QueryStatus::Success;
                self.error = None;
                self.updated_at = Some(Utc::now());
            }
            Err(err) => {
                if err.is_not_found() {
                    self.value = None;
                    self.updated_at = Some(Utc::now());
                }
                self.status = QueryStatus::Error;
                self.error = Some(err);
            }
        }
        self.is_stale = false;
    }
}

/// Per-key state: the published entry and an invalidation counter
#[derive(Debug)]
struct Slot {
    tx: watch::Sender<CacheEntry>,
    epoch: u64,
}

impl Slot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(CacheEntry::default());
        Self { tx, epoch: 0 }
    }
}

/// In-memory keyed store shared by the query and mutation coordinators
///
/// Cloning is cheap; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    slots: Arc<DashMap<QueryKey, Slot>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry for `key`; unknown keys read as idle with no value
    pub fn get(&self, key: &QueryKey) -> CacheEntry {
        self.slots
            .get(key)
            .map(|slot| slot.tx.borrow().clone())
            .unwrap_or_default()
    }

    /// Replaces the entry for `key` in one step
    pub fn set(&self, key: QueryKey, entry: CacheEntry) {
        trace!(%key, status = ?entry.status, "cache set");
        self.slots
            .entry(key)
            .or_insert_with(Slot::new)
            .tx
            .send_replace(entry);
    }

    /// Marks `key` as needing a refresh without discarding its value
    ///
    /// Returns `false` when nothing is cached under `key`.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.epoch += 1;
        slot.tx.send_modify(|entry| entry.is_stale = true);
        trace!(%key, epoch = slot.epoch, "cache invalidated");
        true
    }

    /// Discards the value cached under `key` and marks it for a refresh
    ///
    /// Used once the server has confirmed the record is gone, so later read
    /// failures have nothing left to fall back on. Returns `false` when
    /// nothing is cached under `key`.
    pub fn evict(&self, key: &QueryKey) -> bool {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.epoch += 1;
        slot.tx.send_modify(|entry| {
            entry.value = None;
            entry.is_stale = true;
            entry.updated_at = None;
        });
        trace!(%key, epoch = slot.epoch, "cache evicted");
        true
    }

    /// Subscribes to every state change of `key`
    ///
    /// Dropping the returned handle unsubscribes; cached data is kept.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        let rx = self
            .slots
            .entry(key.clone())
            .or_insert_with(Slot::new)
            .tx
            .subscribe();
        Subscription { key, rx }
    }

    /// Number of live subscriptions for `key`
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.slots
            .get(key)
            .map(|slot| slot.tx.receiver_count())
            .unwrap_or(0)
    }

    /// Invalidation counter for `key`
    pub fn epoch(&self, key: &QueryKey) -> u64 {
        self.slots.get(key).map(|slot| slot.epoch).unwrap_or(0)
    }

    /// Moves `key` to `Loading`, keeping the last value, and returns the
    /// current invalidation counter
    pub(crate) fn begin_fetch(&self, key: &QueryKey) -> u64 {
        let slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);
        slot.tx.send_modify(|entry| {
            entry.status = QueryStatus::Loading;
            entry.error = None;
        });
        slot.epoch
    }

    /// Publishes a fetch result if `key` was not invalidated since `epoch`
    ///
    /// Returns the newer counter instead when the result is outdated; the
    /// caller should discard it and fetch again.
    pub(crate) fn resolve_fetch(
        &self,
        key: &QueryKey,
        epoch: u64,
        result: Result<QueryData, TransportError>,
    ) -> Result<(), u64> {
        let slot = self.slots.entry(key.clone()).or_insert_with(Slot::new);
        if slot.epoch != epoch {
            return Err(slot.epoch);
        }
        slot.tx.send_modify(|entry| entry.apply(result));
        Ok(())
    }
}

/// A view's interest in one cache key
#[derive(Debug)]
pub struct Subscription {
    key: QueryKey,
    rx: watch::Receiver<CacheEntry>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Latest entry, without waiting
    pub fn current(&self) -> CacheEntry {
        self.rx.borrow().clone()
    }

    /// Whether the entry changed since it was last observed
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next state change and returns the new entry
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<CacheEntry> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_marker;

    fn markers(ids: &[&str]) -> QueryData {
        QueryData::Markers(ids.iter().map(|id| sample_marker(id)).collect())
    }

    #[test]
    fn test_unknown_key_is_idle() {
        let store = CacheStore::new();
        let entry = store.get(&QueryKey::Markers);
        assert!(entry.is_idle());
        assert!(entry.value.is_none());
        assert!(entry.error.is_none());
    }

    #[test]
    fn test_set_replaces_entry() {
        let store = CacheStore::new();
        let entry = CacheEntry {
            value: Some(markers(&["a"])),
            status: QueryStatus::Success,
            ..Default::default()
        };
        store.set(QueryKey::Markers, entry.clone());
        assert_eq!(store.get(&QueryKey::Markers), entry);
    }

    #[test]
    fn test_query_key_readiness_and_display() {
        assert!(QueryKey::Markers.is_ready());
        assert!(QueryKey::marker("42").is_ready());
        assert!(!QueryKey::marker("").is_ready());
        assert!(!QueryKey::marker("  ").is_ready());

        assert_eq!(QueryKey::Markers.to_string(), "markers");
        assert_eq!(QueryKey::marker("42").to_string(), "marker:42");
    }

    #[test]
    fn test_begin_fetch_keeps_previous_value() {
        let store = CacheStore::new();
        let key = QueryKey::Markers;
        let epoch = store.begin_fetch(&key);
        store.resolve_fetch(&key, epoch, Ok(markers(&["a"]))).unwrap();

        store.invalidate(&key);
        store.begin_fetch(&key);

        let entry = store.get(&key);
        assert!(entry.is_loading());
        assert!(entry.is_stale);
        assert_eq!(entry.markers().map(<[Marker]>::len), Some(1));
    }

    #[test]
    fn test_resolve_success_clears_staleness_and_error() {
        let store = CacheStore::new();
        let key = QueryKey::marker("a");
        let epoch = store.begin_fetch(&key);
        store
            .resolve_fetch(&key, epoch, Err(TransportError::Network("down".into())))
            .unwrap();
        assert!(store.get(&key).is_error());

        let epoch = store.begin_fetch(&key);
        assert!(store.get(&key).error.is_none());
        store
            .resolve_fetch(&key, epoch, Ok(QueryData::Marker(sample_marker("a"))))
            .unwrap();

        let entry = store.get(&key);
        assert!(entry.is_fresh());
        assert!(entry.error.is_none());
        assert!(entry.updated_at.is_some());
        assert_eq!(entry.marker().map(|m| m.marker_id.as_str()), Some("a"));
    }

    #[test]
    fn test_resolve_rejects_result_older_than_invalidation() {
        let store = CacheStore::new();
        let key = QueryKey::Markers;
        let epoch = store.begin_fetch(&key);

        assert!(store.invalidate(&key));
        let outcome = store.resolve_fetch(&key, epoch, Ok(markers(&["a"])));

        assert_eq!(outcome, Err(epoch + 1));
        let entry = store.get(&key);
        assert!(entry.value.is_none());
        assert!(entry.is_loading());
    }

    #[test]
    fn test_failure_keeps_previous_value() {
        let store = CacheStore::new();
        let key = QueryKey::Markers;
        let epoch = store.begin_fetch(&key);
        store.resolve_fetch(&key, epoch, Ok(markers(&["a"]))).unwrap();

        let epoch = store.begin_fetch(&key);
        let err = TransportError::Server {
            status: 500,
            message: None,
        };
        store.resolve_fetch(&key, epoch, Err(err.clone())).unwrap();

        let entry = store.get(&key);
        assert!(entry.is_error());
        assert_eq!(entry.error, Some(err));
        assert_eq!(entry.markers().map(<[Marker]>::len), Some(1));
    }

    #[test]
    fn test_not_found_clears_value() {
        let store = CacheStore::new();
        let key = QueryKey::marker("a");
        let epoch = store.begin_fetch(&key);
        store
            .resolve_fetch(&key, epoch, Ok(QueryData::Marker(sample_marker("a"))))
            .unwrap();

        let epoch = store.begin_fetch(&key);
        store
            .resolve_fetch(
                &key,
                epoch,
                Err(TransportError::NotFound {
                    marker_id: "a".into(),
                    message: None,
                }),
            )
            .unwrap();

        let entry = store.get(&key);
        assert!(entry.is_error());
        assert!(entry.value.is_none());
    }

    #[test]
    fn test_invalidate_unknown_key_is_noop() {
        let store = CacheStore::new();
        assert!(!store.invalidate(&QueryKey::Markers));
        assert_eq!(store.epoch(&QueryKey::Markers), 0);
        assert!(store.get(&QueryKey::Markers).is_idle());
    }

    #[test]
    fn test_evict_drops_value_and_later_failure_keeps_it_dropped() {
        let store = CacheStore::new();
        let key = QueryKey::marker("a");
        let epoch = store.begin_fetch(&key);
        store
            .resolve_fetch(&key, epoch, Ok(QueryData::Marker(sample_marker("a"))))
            .unwrap();

        assert!(store.evict(&key));
        let entry = store.get(&key);
        assert!(entry.value.is_none());
        assert!(entry.is_stale);
        assert_eq!(store.epoch(&key), epoch + 1);

        let epoch = store.begin_fetch(&key);
        let err = TransportError::Server {
            status: 500,
            message: Some("Failed to retrieve marker.".into()),
        };
        store.resolve_fetch(&key, epoch, Err(err.clone())).unwrap();

        let entry = store.get(&key);
        assert!(entry.is_error());
        assert_eq!(entry.error, Some(err));
        assert!(entry.marker().is_none());
        assert!(!store.evict(&QueryKey::marker("missing")));
    }

    #[tokio::test]
    async fn test_subscriber_sees_each_transition() {
        let store = CacheStore::new();
        let key = QueryKey::Markers;
        let mut subscription = store.subscribe(key.clone());
        assert!(subscription.current().is_idle());
        assert!(!subscription.has_changed());

        let epoch = store.begin_fetch(&key);
        let entry = subscription.changed().await.unwrap();
        assert!(entry.is_loading());

        store.resolve_fetch(&key, epoch, Ok(markers(&["a"]))).unwrap();
        let entry = subscription.changed().await.unwrap();
        assert!(entry.is_success());
        assert_eq!(subscription.key(), &QueryKey::Markers);
    }

    #[test]
    fn test_unsubscribe_keeps_data() {
        let store = CacheStore::new();
        let key = QueryKey::Markers;
        let subscription = store.subscribe(key.clone());
        let other = store.subscribe(key.clone());
        assert_eq!(store.subscriber_count(&key), 2);

        let epoch = store.begin_fetch(&key);
        store.resolve_fetch(&key, epoch, Ok(markers(&["a"]))).unwrap();
        drop(subscription);
        drop(other);

        assert_eq!(store.subscriber_count(&key), 0);
        assert!(store.get(&key).is_success());
    }
}
