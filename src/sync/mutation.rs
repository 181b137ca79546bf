//! Write coordination: marker mutations and cache reconciliation
//!
//! Mutations are pessimistic: nothing in the cache changes until the server
//! confirms the write. On success the affected query keys are invalidated
//! through the [`QueryClient`], which refetches any key a view is subscribed
//! to. A confirmed delete also evicts the deleted marker's cached detail.
//! Mutations are never deduplicated; each call issues its own request.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::query::QueryClient;
use crate::cache::QueryKey;
use crate::data::{
    DeleteConfirmation, Marker, MarkerUpdate, NewMarker, Transport, TransportError,
};
use crate::notify::Notifier;

/// The three write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Add,
    Edit,
    Delete,
}

impl MutationKind {
    pub fn success_message(self) -> &'static str {
        match self {
            MutationKind::Add => "Marker added successfully",
            MutationKind::Edit => "Marker edited successfully",
            MutationKind::Delete => "Marker deleted successfully",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            MutationKind::Add => "Error adding marker",
            MutationKind::Edit => "Error editing marker",
            MutationKind::Delete => "Error deleting marker",
        }
    }
}

/// The state of the latest mutation of one kind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    /// Mutation is idle (not yet started).
    #[default]
    Idle,
    /// Mutation is in progress.
    Loading,
    /// Mutation succeeded.
    Success,
    /// Mutation failed with the message shown to the user.
    Error(String),
}

impl MutationState {
    /// Returns `true` if the mutation is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self, MutationState::Loading)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, MutationState::Success)
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self, MutationState::Error(_))
    }
}

struct MutationStates {
    add: watch::Sender<MutationState>,
    edit: watch::Sender<MutationState>,
    delete: watch::Sender<MutationState>,
}

impl MutationStates {
    fn new() -> Self {
        Self {
            add: watch::channel(MutationState::Idle).0,
            edit: watch::channel(MutationState::Idle).0,
            delete: watch::channel(MutationState::Idle).0,
        }
    }

    fn get(&self, kind: MutationKind) -> &watch::Sender<MutationState> {
        match kind {
            MutationKind::Add => &self.add,
            MutationKind::Edit => &self.edit,
            MutationKind::Delete => &self.delete,
        }
    }
}

/// What a successful mutation does to one cached query
#[derive(Debug)]
enum Affected {
    /// Still exists on the server but changed
    Stale(QueryKey),
    /// Gone from the server
    Removed(QueryKey),
}

/// Executes marker writes and invalidates the queries they affect
#[derive(Clone)]
pub struct MutationClient {
    transport: Arc<dyn Transport>,
    queries: QueryClient,
    notifier: Arc<dyn Notifier>,
    states: Arc<MutationStates>,
}

impl MutationClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        queries: QueryClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            queries,
            notifier,
            states: Arc::new(MutationStates::new()),
        }
    }

    /// State of the latest mutation of `kind`
    pub fn state(&self, kind: MutationKind) -> MutationState {
        self.states.get(kind).borrow().clone()
    }

    /// Watches the state of mutations of `kind`
    pub fn watch(&self, kind: MutationKind) -> watch::Receiver<MutationState> {
        self.states.get(kind).subscribe()
    }

    /// Returns `kind` to `Idle`, e.g. when a form is reopened
    pub fn reset(&self, kind: MutationKind) {
        self.states.get(kind).send_replace(MutationState::Idle);
    }

    /// Creates a marker, then invalidates the marker list
    pub async fn add_marker(&self, marker: NewMarker) -> Result<Option<Marker>, TransportError> {
        self.run(
            MutationKind::Add,
            vec![Affected::Stale(QueryKey::Markers)],
            self.transport.create_marker(&marker),
        )
        .await
    }

    /// Updates a marker, then invalidates the list and that marker's detail
    pub async fn edit_marker(
        &self,
        marker_id: &str,
        update: MarkerUpdate,
    ) -> Result<Option<Marker>, TransportError> {
        self.run(
            MutationKind::Edit,
            vec![
                Affected::Stale(QueryKey::Markers),
                Affected::Stale(QueryKey::marker(marker_id)),
            ],
            self.transport.update_marker(marker_id, &update),
        )
        .await
    }

    /// Deletes a marker, then invalidates the list and evicts that marker's
    /// detail
    ///
    /// A detail view still showing the marker refetches and lands in an
    /// error with no value, whatever status the server answers the lookup
    /// with, instead of rendering the deleted record.
    pub async fn delete_marker(
        &self,
        marker_id: &str,
    ) -> Result<DeleteConfirmation, TransportError> {
        self.run(
            MutationKind::Delete,
            vec![
                Affected::Stale(QueryKey::Markers),
                Affected::Removed(QueryKey::marker(marker_id)),
            ],
            self.transport.delete_marker(marker_id),
        )
        .await
    }

    async fn run<T, F>(
        &self,
        kind: MutationKind,
        affected: Vec<Affected>,
        request: F,
    ) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let state = self.states.get(kind);
        state.send_replace(MutationState::Loading);

        match request.await {
            Ok(value) => {
                for effect in &affected {
                    match effect {
                        Affected::Stale(key) => self.queries.invalidate(key),
                        Affected::Removed(key) => self.queries.evict(key),
                    }
                }
                info!(?kind, keys = affected.len(), "mutation succeeded");
                state.send_replace(MutationState::Success);
                self.notifier.notify_success(kind.success_message());
                Ok(value)
            }
            Err(err) => {
                let message = err.user_message(kind.failure_message());
                warn!(?kind, error = %err, "mutation failed");
                state.send_replace(MutationState::Error(message.clone()));
                self.notifier.notify_failure(&message);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryStatus;
    use crate::data::{sample_marker, Coordinate, MarkerStatus};
    use crate::notify::{ChannelNotifier, Notification};
    use crate::sync::testing::{FakeTransport, Op};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        transport: Arc<FakeTransport>,
        queries: QueryClient,
        mutations: MutationClient,
        notifications: UnboundedReceiver<Notification>,
    }

    fn harness(markers: Vec<Marker>) -> Harness {
        let transport = Arc::new(FakeTransport::with_markers(markers));
        let (notifier, notifications) = ChannelNotifier::channel();
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let queries = QueryClient::new(transport.clone(), notifier.clone());
        let mutations = MutationClient::new(transport.clone(), queries.clone(), notifier);
        Harness {
            transport,
            queries,
            mutations,
            notifications,
        }
    }

    fn ids(entry: &crate::cache::CacheEntry) -> Vec<String> {
        entry
            .markers()
            .unwrap_or_default()
            .iter()
            .map(|m| m.marker_id.clone())
            .collect()
    }

    #[test]
    fn test_mutation_state_predicates() {
        assert!(!MutationState::Idle.is_loading());
        assert!(MutationState::Loading.is_loading());
        assert!(MutationState::Success.is_success());
        assert!(MutationState::Error("x".into()).is_error());
        assert!(!MutationState::Success.is_error());
    }

    #[tokio::test]
    async fn test_add_marker_notifies_and_refreshes_list() {
        let mut h = harness(vec![sample_marker("a")]);
        h.queries.fetch(QueryKey::Markers).await;

        let created = h
            .mutations
            .add_marker(NewMarker::at(Coordinate::new(1.0, 1.0)))
            .await
            .expect("add should succeed")
            .expect("fake echoes the created marker");

        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::success("Marker added successfully")
        );
        assert_eq!(h.mutations.state(MutationKind::Add), MutationState::Success);

        let entry = h.queries.fetch(QueryKey::Markers).await;
        assert!(ids(&entry).contains(&created.marker_id));
        assert_eq!(h.transport.count(Op::List), 2);
    }

    #[tokio::test]
    async fn test_add_marker_failure_uses_fallback_message() {
        let mut h = harness(vec![]);
        h.transport
            .fail_next(Op::Create, TransportError::Network("refused".into()));

        let result = h
            .mutations
            .add_marker(NewMarker::at(Coordinate::new(1.0, 1.0)))
            .await;

        assert!(result.is_err());
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::failure("Error adding marker")
        );
        assert_eq!(
            h.mutations.state(MutationKind::Add),
            MutationState::Error("Error adding marker".to_string())
        );
    }

    #[tokio::test]
    async fn test_edit_failure_surfaces_server_message_and_keeps_cache() {
        let mut h = harness(vec![sample_marker("42")]);
        let key = QueryKey::marker("42");
        let before = h.queries.fetch(key.clone()).await;
        h.transport.fail_next(
            Op::Update,
            TransportError::Server {
                status: 500,
                message: Some("db down".into()),
            },
        );

        let result = h
            .mutations
            .edit_marker(
                "42",
                MarkerUpdate {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::failure("db down")
        );
        assert_eq!(h.queries.get(&key), before);
    }

    #[tokio::test]
    async fn test_edit_invalidates_list_and_detail() {
        let mut h = harness(vec![sample_marker("42")]);
        h.queries.fetch(QueryKey::Markers).await;
        h.queries.fetch(QueryKey::marker("42")).await;

        h.mutations
            .edit_marker(
                "42",
                MarkerUpdate {
                    status: Some(MarkerStatus::Changed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::success("Marker edited successfully")
        );

        assert!(h.queries.get(&QueryKey::Markers).is_stale);
        assert!(h.queries.get(&QueryKey::marker("42")).is_stale);

        let detail = h.queries.fetch(QueryKey::marker("42")).await;
        assert_eq!(detail.marker().unwrap().status, MarkerStatus::Changed);
        let list = h.queries.fetch(QueryKey::Markers).await;
        assert_eq!(list.markers().unwrap()[0].status, MarkerStatus::Changed);
    }

    #[tokio::test]
    async fn test_delete_removes_marker_from_list_and_detail() {
        let h = harness(vec![sample_marker("a"), sample_marker("b")]);
        h.queries.fetch(QueryKey::Markers).await;
        h.queries.fetch(QueryKey::marker("a")).await;

        h.mutations.delete_marker("a").await.unwrap();

        let list = h.queries.fetch(QueryKey::Markers).await;
        assert_eq!(ids(&list), vec!["b".to_string()]);

        let detail = h.queries.fetch(QueryKey::marker("a")).await;
        assert_eq!(detail.status, QueryStatus::Error);
        assert!(detail.value.is_none());
    }

    #[tokio::test]
    async fn test_deleted_marker_stays_gone_when_lookup_fails_with_server_error() {
        let mut h = harness(vec![sample_marker("a")]);
        let key = QueryKey::marker("a");
        assert!(h.queries.fetch(key.clone()).await.marker().is_some());

        h.mutations.delete_marker("a").await.unwrap();
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::success("Marker deleted successfully")
        );
        assert!(h.queries.get(&key).marker().is_none());

        h.transport.fail_next(
            Op::Get,
            TransportError::Server {
                status: 500,
                message: Some("Failed to retrieve marker.".into()),
            },
        );
        let detail = h.queries.fetch(key).await;

        assert!(detail.is_error());
        assert!(detail.marker().is_none());
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::failure("Failed to retrieve marker.")
        );
    }

    #[tokio::test]
    async fn test_edit_of_unknown_marker_reports_server_message() {
        let mut h = harness(vec![]);

        let result = h
            .mutations
            .edit_marker(
                "ghost",
                MarkerUpdate {
                    name: Some("x".into()),
                    ..Default::default()
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(
            h.notifications.try_recv().unwrap(),
            Notification::failure("Failed to update marker.")
        );
    }

    #[tokio::test]
    async fn test_delete_refetches_subscribed_views() {
        let h = harness(vec![sample_marker("a"), sample_marker("b")]);
        let mut list_view = h.queries.subscribe(QueryKey::Markers);
        let mut detail_view = h.queries.subscribe(QueryKey::marker("a"));
        h.queries.fetch(QueryKey::Markers).await;
        h.queries.fetch(QueryKey::marker("a")).await;

        h.mutations.delete_marker("a").await.unwrap();

        let list = loop {
            let entry = list_view.changed().await.unwrap();
            if entry.is_success() && !entry.is_stale {
                break entry;
            }
        };
        assert_eq!(ids(&list), vec!["b".to_string()]);

        let detail = loop {
            let entry = detail_view.changed().await.unwrap();
            if entry.is_error() {
                break entry;
            }
        };
        assert!(detail.value.is_none());
    }

    #[tokio::test]
    async fn test_mutations_are_not_deduplicated() {
        let h = harness(vec![]);
        let payload = NewMarker::at(Coordinate::new(1.0, 1.0));

        let (a, b) = tokio::join!(
            h.mutations.add_marker(payload.clone()),
            h.mutations.add_marker(payload.clone())
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.transport.count(Op::Create), 2);
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_invalidate() {
        let h = harness(vec![sample_marker("a")]);
        h.queries.fetch(QueryKey::Markers).await;
        h.transport.fail_next(
            Op::Delete,
            TransportError::Server {
                status: 500,
                message: None,
            },
        );

        assert!(h.mutations.delete_marker("a").await.is_err());

        assert!(h.queries.get(&QueryKey::Markers).is_fresh());
        h.queries.fetch(QueryKey::Markers).await;
        assert_eq!(h.transport.count(Op::List), 1);
    }

    #[tokio::test]
    async fn test_reset_and_watch_state() {
        let h = harness(vec![sample_marker("a")]);
        let mut rx = h.mutations.watch(MutationKind::Delete);

        h.mutations.delete_marker("a").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_success());

        h.mutations.reset(MutationKind::Delete);
        assert_eq!(h.mutations.state(MutationKind::Delete), MutationState::Idle);
    }
}
