//! In-memory collaborators for tests and the demo binary.
//!
//! [`InMemoryRemoteStore`] and [`InMemoryChangeFeed`] are cheap to clone and
//! share their state, so several sessions can point at the same backend. When
//! a feed is attached, every accepted mutation is announced on it, the way the
//! managed backend fans changes out to all connected clients.

use crate::feed::{ChangeFeed, ChangeStream, FeedError};
use crate::reducer::IdGenerator;
use crate::remote::{RemoteError, RemoteFuture, RemoteStore};
use crate::types::{ChangeKind, ChangeNotification, ClientId, TodoId, TodoItem};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Remote operations, for failure injection and call inspection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `fetch_all`
    FetchAll,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `create_collection`
    CreateCollection,
}

/// A recorded call against [`InMemoryRemoteStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    /// `fetch_all()`
    FetchAll,
    /// `create(item, origin)`
    Create {
        /// Item sent
        item: TodoItem,
        /// Origin tag sent with it
        origin: ClientId,
    },
    /// `update(item)`
    Update {
        /// Item sent
        item: TodoItem,
    },
    /// `delete(id)`
    Delete {
        /// Id sent
        id: TodoId,
    },
    /// `create_collection()`
    CreateCollection,
}

impl RemoteCall {
    /// Operation this call belongs to
    #[must_use]
    pub const fn op(&self) -> RemoteOp {
        match self {
            Self::FetchAll => RemoteOp::FetchAll,
            Self::Create { .. } => RemoteOp::Create,
            Self::Update { .. } => RemoteOp::Update,
            Self::Delete { .. } => RemoteOp::Delete,
            Self::CreateCollection => RemoteOp::CreateCollection,
        }
    }
}

#[derive(Debug)]
struct Backend {
    collection: String,
    exists: bool,
    items: Vec<(TodoItem, ClientId)>,
    failing: HashSet<RemoteOp>,
    calls: Vec<RemoteCall>,
}

/// In-memory stand-in for the managed backend
#[derive(Clone)]
pub struct InMemoryRemoteStore {
    backend: Arc<Mutex<Backend>>,
    feed: Option<InMemoryChangeFeed>,
    gate: Arc<watch::Sender<bool>>,
}

impl InMemoryRemoteStore {
    /// Creates an empty store whose collection already exists
    #[must_use]
    pub fn new() -> Self {
        Self::named("todos")
    }

    /// Creates an empty store for a named collection
    #[must_use]
    pub fn named(collection: impl Into<String>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            backend: Arc::new(Mutex::new(Backend {
                collection: collection.into(),
                exists: true,
                items: Vec::new(),
                failing: HashSet::new(),
                calls: Vec::new(),
            })),
            feed: None,
            gate: Arc::new(gate),
        }
    }

    /// Seeds stored items, attributed to an unknown client
    #[must_use]
    pub fn with_items(self, items: Vec<TodoItem>) -> Self {
        let origin = ClientId::from_uuid(Uuid::nil());
        self.lock()
            .items
            .extend(items.into_iter().map(|item| (item, origin)));
        self
    }

    /// Starts without a collection: `fetch_all` reports `NotFound` until
    /// `create_collection` succeeds
    #[must_use]
    pub fn without_collection(self) -> Self {
        self.lock().exists = false;
        self
    }

    /// Announces accepted mutations on `feed`
    #[must_use]
    pub fn with_feed(mut self, feed: InMemoryChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Makes every subsequent call of `op` fail with `Transport`
    pub fn fail(&self, op: RemoteOp) {
        self.lock().failing.insert(op);
    }

    /// Undoes [`fail`](Self::fail)
    pub fn recover(&self, op: RemoteOp) {
        self.lock().failing.remove(&op);
    }

    /// Holds every call until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held calls
    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Collection name
    #[must_use]
    pub fn collection(&self) -> String {
        self.lock().collection.clone()
    }

    /// Whether the collection exists
    #[must_use]
    pub fn collection_exists(&self) -> bool {
        self.lock().exists
    }

    /// Stored items, in creation order
    #[must_use]
    pub fn items(&self) -> Vec<TodoItem> {
        self.lock().items.iter().map(|(item, _)| item.clone()).collect()
    }

    /// Every call received so far, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls received for `op`
    #[must_use]
    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.lock().calls.iter().filter(|call| call.op() == op).count()
    }

    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, waits at the gate, then runs `op` against the backend
    fn call<T, F>(&self, call: RemoteCall, op: F) -> RemoteFuture<'_, T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Backend) -> Result<(T, Option<ChangeNotification>), RemoteError>
            + Send
            + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let feed = self.feed.clone();
        let mut gate = self.gate.subscribe();

        Box::pin(async move {
            let operation = call.op();
            backend
                .lock()
                .map_err(|_| RemoteError::Transport("Mutex lock failed".to_string()))?
                .calls
                .push(call);

            // A closed gate lets the call through
            let _ = gate.wait_for(|open| *open).await;

            let (value, notification) = {
                let mut backend = backend
                    .lock()
                    .map_err(|_| RemoteError::Transport("Mutex lock failed".to_string()))?;

                if backend.failing.contains(&operation) {
                    return Err(RemoteError::Transport(format!("{operation:?} unavailable")));
                }
                op(&mut *backend)?
            };

            if let (Some(feed), Some(notification)) = (feed, notification) {
                feed.publish(notification);
            }

            Ok(value)
        })
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRemoteStore")
            .field("backend", &self.backend)
            .field("feed", &self.feed.is_some())
            .finish_non_exhaustive()
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn fetch_all(&self) -> RemoteFuture<'_, Vec<TodoItem>> {
        self.call(RemoteCall::FetchAll, |backend| {
            if !backend.exists {
                return Err(RemoteError::NotFound);
            }
            let items = backend.items.iter().map(|(item, _)| item.clone()).collect();
            Ok((items, None))
        })
    }

    fn create(&self, item: TodoItem, origin: ClientId) -> RemoteFuture<'_, ()> {
        let call = RemoteCall::Create {
            item: item.clone(),
            origin,
        };
        self.call(call, move |backend| {
            if !backend.exists {
                return Err(RemoteError::NotFound);
            }
            if backend.items.iter().any(|(stored, _)| stored.id == item.id) {
                return Err(RemoteError::Rejected(format!("item {} already exists", item.id)));
            }
            backend.items.push((item.clone(), origin));
            Ok(((), Some(ChangeNotification::created(item, origin))))
        })
    }

    fn update(&self, item: TodoItem) -> RemoteFuture<'_, ()> {
        let call = RemoteCall::Update { item: item.clone() };
        self.call(call, move |backend| {
            let Some(slot) = backend
                .items
                .iter_mut()
                .find(|(stored, _)| stored.id == item.id)
            else {
                return Err(RemoteError::Rejected(format!("item {} does not exist", item.id)));
            };
            slot.0 = item.clone();
            let origin = slot.1;
            Ok(((), Some(ChangeNotification::updated(item, origin))))
        })
    }

    fn delete(&self, id: TodoId) -> RemoteFuture<'_, ()> {
        let call = RemoteCall::Delete { id: id.clone() };
        self.call(call, move |backend| {
            let Some(index) = backend.items.iter().position(|(stored, _)| stored.id == id) else {
                return Err(RemoteError::Rejected(format!("item {id} does not exist")));
            };
            let (item, origin) = backend.items.remove(index);
            Ok(((), Some(ChangeNotification::deleted(item, origin))))
        })
    }

    fn create_collection(&self) -> RemoteFuture<'_, ()> {
        self.call(RemoteCall::CreateCollection, |backend| {
            backend.exists = true;
            Ok(((), None))
        })
    }
}

/// Capacity of each per-kind channel
const FEED_CAPACITY: usize = 64;

#[derive(Debug)]
struct FeedChannels {
    senders: HashMap<ChangeKind, broadcast::Sender<ChangeNotification>>,
    refused: Mutex<HashSet<ChangeKind>>,
}

/// In-memory change feed: one broadcast channel per [`ChangeKind`]
#[derive(Clone, Debug)]
pub struct InMemoryChangeFeed {
    channels: Arc<FeedChannels>,
}

impl InMemoryChangeFeed {
    /// Creates a feed with no subscribers
    #[must_use]
    pub fn new() -> Self {
        let senders = ChangeKind::ALL
            .into_iter()
            .map(|kind| (kind, broadcast::channel(FEED_CAPACITY).0))
            .collect();

        Self {
            channels: Arc::new(FeedChannels {
                senders,
                refused: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Delivers a notification to every subscriber of its kind
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, notification: ChangeNotification) -> usize {
        self.channels
            .senders
            .get(&notification.kind)
            .and_then(|sender| sender.send(notification).ok())
            .unwrap_or(0)
    }

    /// Number of live subscriptions for `kind`
    #[must_use]
    pub fn subscriber_count(&self, kind: ChangeKind) -> usize {
        self.channels
            .senders
            .get(&kind)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total live subscriptions across all kinds
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        ChangeKind::ALL
            .into_iter()
            .map(|kind| self.subscriber_count(kind))
            .sum()
    }

    /// Makes `subscribe(kind)` fail
    pub fn refuse(&self, kind: ChangeKind) {
        self.channels
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
    }
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for InMemoryChangeFeed {
    fn subscribe(
        &self,
        kind: ChangeKind,
    ) -> Pin<Box<dyn Future<Output = Result<ChangeStream, FeedError>> + Send + '_>> {
        Box::pin(async move {
            let refused = self
                .channels
                .refused
                .lock()
                .map_err(|_| FeedError::SubscriptionFailed {
                    kind,
                    reason: "Mutex lock failed".to_string(),
                })?
                .contains(&kind);

            if refused {
                return Err(FeedError::SubscriptionFailed {
                    kind,
                    reason: "refused by feed".to_string(),
                });
            }

            let mut rx = self
                .channels
                .senders
                .get(&kind)
                .map(broadcast::Sender::subscribe)
                .ok_or_else(|| FeedError::SubscriptionFailed {
                    kind,
                    reason: "no channel for kind".to_string(),
                })?;

            let stream = async_stream::stream! {
                loop {
                    match rx.recv().await {
                        Ok(notification) => yield notification,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(%kind, skipped, "Subscriber lagged, notifications lost");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as ChangeStream)
        })
    }
}

/// Deterministic ids: `00000000-0000-0000-0000-000000000001`, `...02`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Starts at 1
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> TodoId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        TodoId::from_uuid(Uuid::from_u128(u128::from(n)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;

    fn item(text: &str) -> TodoItem {
        TodoItem::new(TodoId::new(), text.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn crud_round_trip_announces_changes() {
        let feed = InMemoryChangeFeed::new();
        let remote = InMemoryRemoteStore::new().with_feed(feed.clone());
        let origin = ClientId::generate();

        let mut created = feed.subscribe(ChangeKind::Created).await.unwrap();
        let mut deleted = feed.subscribe(ChangeKind::Deleted).await.unwrap();

        let todo = item("a");
        remote.create(todo.clone(), origin).await.unwrap();
        remote.update(todo.with_text("alpha")).await.unwrap();
        assert_eq!(remote.fetch_all().await.unwrap(), vec![todo.with_text("alpha")]);

        remote.delete(todo.id.clone()).await.unwrap();
        assert!(remote.items().is_empty());

        let first = created.next().await.unwrap();
        assert_eq!(first, ChangeNotification::created(todo.clone(), origin));

        let gone = deleted.next().await.unwrap();
        assert_eq!(gone.item.id, todo.id);
        assert_eq!(gone.origin, origin, "delete keeps the creator as origin");
    }

    #[tokio::test]
    async fn missing_collection_until_bootstrapped() {
        let remote = InMemoryRemoteStore::new().without_collection();

        assert_eq!(remote.fetch_all().await, Err(RemoteError::NotFound));
        remote.create_collection().await.unwrap();
        remote.create_collection().await.unwrap();

        assert!(remote.collection_exists());
        assert_eq!(remote.fetch_all().await, Ok(vec![]));
        assert_eq!(remote.call_count(RemoteOp::CreateCollection), 2);
    }

    #[tokio::test]
    async fn injected_failures_and_recovery() {
        let remote = InMemoryRemoteStore::new();
        remote.fail(RemoteOp::Create);

        let todo = item("a");
        let result = remote.create(todo.clone(), ClientId::generate()).await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
        assert!(remote.items().is_empty());

        remote.recover(RemoteOp::Create);
        remote.create(todo, ClientId::generate()).await.unwrap();
        assert_eq!(remote.items().len(), 1);
        assert_eq!(remote.call_count(RemoteOp::Create), 2);
    }

    #[tokio::test]
    async fn update_of_unknown_item_is_rejected() {
        let remote = InMemoryRemoteStore::new();
        let result = remote.update(item("ghost")).await;
        assert!(matches!(result, Err(RemoteError::Rejected(_))));
    }

    #[tokio::test]
    async fn refused_subscription() {
        let feed = InMemoryChangeFeed::new();
        feed.refuse(ChangeKind::Updated);

        assert!(feed.subscribe(ChangeKind::Created).await.is_ok());
        let err = feed.subscribe(ChangeKind::Updated).await.err().unwrap();
        assert!(matches!(
            err,
            FeedError::SubscriptionFailed {
                kind: ChangeKind::Updated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn dropping_stream_releases_subscription() {
        let feed = InMemoryChangeFeed::new();
        let stream = feed.subscribe(ChangeKind::Created).await.unwrap();
        assert_eq!(feed.subscriber_count(ChangeKind::Created), 1);

        drop(stream);
        assert_eq!(feed.total_subscribers(), 0);
    }

    #[test]
    fn sequential_ids() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id(), TodoId::from_uuid(Uuid::from_u128(1)));
        assert_eq!(ids.next_id(), TodoId::from_uuid(Uuid::from_u128(2)));
    }
}
