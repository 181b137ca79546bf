//! Read coordination: deduplicated fetches into the [`CacheStore`]
//!
//! At most one request per key is in flight at any time. Callers arriving
//! while a request is pending await the same result. The request runs on its
//! own task, so dropping a caller never cancels it; the result still lands in
//! the store for everyone else.
//!
//! An invalidation that arrives while a request is in flight bumps the key's
//! invalidation counter. When the request resolves against an outdated
//! counter its result is discarded and the key is fetched again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStore, QueryData, QueryKey, Subscription};
use crate::data::{Transport, TransportError};
use crate::notify::Notifier;

type PendingFetch = Shared<BoxFuture<'static, CacheEntry>>;

/// Fallback failure text for a read of `key`
pub fn fetch_failure_message(key: &QueryKey) -> &'static str {
    match key {
        QueryKey::Markers => "Error fetching markers",
        QueryKey::Marker(_) => "Error fetching marker",
    }
}

/// Resolves reads for query keys, deduplicating concurrent requests
///
/// Cloning is cheap; clones share the store and the in-flight table.
#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    store: CacheStore,
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<DashMap<QueryKey, PendingFetch>>,
}

impl QueryClient {
    /// Creates a query client with an empty cache
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_store(transport, notifier, CacheStore::new())
    }

    /// Creates a query client over an existing cache
    pub fn with_store(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        store: CacheStore,
    ) -> Self {
        Self {
            transport,
            store,
            notifier,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Current entry for `key`, without fetching
    pub fn get(&self, key: &QueryKey) -> CacheEntry {
        self.store.get(key)
    }

    /// Registers a view's interest in `key`
    ///
    /// Keys with live subscriptions are refetched as soon as they are
    /// invalidated.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        self.store.subscribe(key)
    }

    /// Whether a request for `key` is currently in flight
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Resolves `key` to an entry
    ///
    /// - a detail key without an id returns the idle entry without a request
    /// - a fresh successful entry is returned from cache
    /// - otherwise joins the in-flight request for `key`, or starts one
    pub async fn fetch(&self, key: QueryKey) -> CacheEntry {
        if !key.is_ready() {
            debug!(%key, "query not ready, skipping fetch");
            return self.store.get(&key);
        }

        let cached = self.store.get(&key);
        if cached.is_fresh() {
            debug!(%key, "cache hit");
            return cached;
        }

        self.start_or_join(key).await
    }

    /// Marks `key` stale and refetches it right away if a view is subscribed
    ///
    /// Without subscribers the refetch happens on the next [`fetch`](Self::fetch).
    pub fn invalidate(&self, key: &QueryKey) {
        self.expire(key, CacheStore::invalidate);
    }

    /// Drops the value cached under `key`, then refreshes it like
    /// [`invalidate`](Self::invalidate)
    ///
    /// For records the server has confirmed are gone: a failing refetch must
    /// not leave the old value on screen.
    pub fn evict(&self, key: &QueryKey) {
        self.expire(key, CacheStore::evict);
    }

    fn expire(&self, key: &QueryKey, mark: fn(&CacheStore, &QueryKey) -> bool) {
        let pending = {
            // Held across the store update so a resolving request cannot
            // slip between the counter bump and the in-flight check.
            let guard = self.in_flight.get(key);
            mark(&self.store, key);
            guard.is_some()
        };

        if pending {
            debug!(%key, "invalidated while in flight");
            return;
        }

        if key.is_ready() && self.store.subscriber_count(key) > 0 {
            debug!(%key, "invalidated with subscribers, refetching");
            // Runs on its own task; the handle is not needed here.
            drop(self.start_or_join(key.clone()));
        }
    }

    fn start_or_join(&self, key: QueryKey) -> PendingFetch {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                debug!(%key, "joining in-flight request");
                pending.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(%key, "starting request");
                let epoch = self.store.begin_fetch(&key);
                let client = self.clone();
                let task_key = key.clone();
                let handle = tokio::spawn(async move { client.run(task_key, epoch).await });

                let store = self.store.clone();
                let in_flight = self.in_flight.clone();
                let pending = async move {
                    match handle.await {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!(%key, error = %e, "fetch task failed");
                            // The task never reached the store; let the next
                            // fetch start over.
                            in_flight.remove(&key);
                            store.get(&key)
                        }
                    }
                }
                .boxed()
                .shared();

                slot.insert(pending.clone());
                pending
            }
        }
    }

    /// Requests `key` until a result is accepted by the store
    async fn run(self, key: QueryKey, mut epoch: u64) -> CacheEntry {
        loop {
            let result = self.request(&key).await;
            let failure = result
                .as_ref()
                .err()
                .map(|e| e.user_message(fetch_failure_message(&key)));

            let accepted = match self.in_flight.entry(key.clone()) {
                Entry::Occupied(pending) => match self.store.resolve_fetch(&key, epoch, result) {
                    Ok(()) => {
                        pending.remove();
                        true
                    }
                    Err(current) => {
                        epoch = current;
                        false
                    }
                },
                Entry::Vacant(_) => self.store.resolve_fetch(&key, epoch, result).is_ok(),
            };

            if !accepted {
                debug!(%key, "result outdated by invalidation, refetching");
                continue;
            }

            match failure {
                Some(message) => {
                    warn!(%key, %message, "fetch failed");
                    self.notifier.notify_failure(&message);
                }
                None => debug!(%key, "fetch succeeded"),
            }
            return self.store.get(&key);
        }
    }

    async fn request(&self, key: &QueryKey) -> Result<QueryData, TransportError> {
        match key {
            QueryKey::Markers => self.transport.list_markers().await.map(QueryData::Markers),
            QueryKey::Marker(id) => self.transport.get_marker(id).await.map(QueryData::Marker),
        }
    }
}
