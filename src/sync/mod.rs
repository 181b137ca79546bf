//! Client-side synchronization with the marker API
//!
//! [`query::QueryClient`] resolves reads through the shared cache and
//! [`mutation::MutationClient`] performs writes and invalidates the queries
//! they affect. [`MarkerSync`] wires both to one transport, cache and notifier.

pub mod mutation;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use mutation::{MutationClient, MutationKind, MutationState};
pub use query::{fetch_failure_message, QueryClient};

use std::sync::Arc;

use crate::cache::{CacheEntry, QueryKey, Subscription};
use crate::data::Transport;
use crate::notify::Notifier;

/// Read and write access to markers sharing one cache
#[derive(Clone)]
pub struct MarkerSync {
    queries: QueryClient,
    mutations: MutationClient,
}

impl MarkerSync {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        let queries = QueryClient::new(transport.clone(), notifier.clone());
        let mutations = MutationClient::new(transport, queries.clone(), notifier);
        Self { queries, mutations }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn mutations(&self) -> &MutationClient {
        &self.mutations
    }

    /// Resolves the marker list
    pub async fn markers(&self) -> CacheEntry {
        self.queries.fetch(QueryKey::Markers).await
    }

    /// Resolves one marker by id
    pub async fn marker(&self, marker_id: &str) -> CacheEntry {
        self.queries.fetch(QueryKey::marker(marker_id)).await
    }

    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        self.queries.subscribe(key)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeTransport, Op};
    use super::*;
    use crate::data::{sample_marker, Coordinate, NewMarker};
    use crate::notify::{ChannelNotifier, Notification};

    #[tokio::test]
    async fn test_add_then_list_includes_new_marker() {
        let transport = Arc::new(FakeTransport::with_markers(vec![sample_marker("a")]));
        let (notifier, mut rx) = ChannelNotifier::channel();
        let sync = MarkerSync::new(transport.clone(), Arc::new(notifier));
        let mut list_view = sync.subscribe(QueryKey::Markers);

        let initial = sync.markers().await;
        assert_eq!(initial.markers().map(|m| m.len()), Some(1));

        let created = sync
            .mutations()
            .add_marker(NewMarker::at(Coordinate::new(1.0, 1.0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.recv().await, Some(Notification::success("Marker added successfully")));

        let refreshed = loop {
            let entry = list_view.changed().await.unwrap();
            if entry.is_success() && !entry.is_stale {
                break entry;
            }
        };
        let ids: Vec<&str> = refreshed
            .markers()
            .unwrap()
            .iter()
            .map(|m| m.marker_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", created.marker_id.as_str()]);
        assert_eq!(
            transport.calls(),
            vec![
                "GET /markers".to_string(),
                "POST /marker".to_string(),
                "GET /markers".to_string()
            ]
        );
        assert_eq!(transport.count(Op::Create), 1);
    }

    #[tokio::test]
    async fn test_detail_lookup_uses_marker_key() {
        let transport = Arc::new(FakeTransport::with_markers(vec![sample_marker("42")]));
        let (notifier, _rx) = ChannelNotifier::channel();
        let sync = MarkerSync::new(transport.clone(), Arc::new(notifier));

        let entry = sync.marker("42").await;

        assert_eq!(entry.marker().map(|m| m.marker_id.as_str()), Some("42"));
        assert!(sync.queries().get(&QueryKey::marker("42")).is_success());
        assert_eq!(transport.count(Op::Get), 1);
    }
}
