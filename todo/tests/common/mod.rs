//! Shared fixtures for session-level tests.

#![allow(dead_code)] // Not every test binary uses every fixture

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use todo_sync::mocks::{InMemoryChangeFeed, InMemoryRemoteStore};
use todo_sync::{
    ClientId, IdGenerator, TodoConfig, TodoEnvironment, TodoId, TodoItem, TodoSession,
    UuidGenerator,
};
use todo_sync_core::environment::Clock as _;
use todo_sync_testing::test_clock;

/// A backend with its feed attached
pub fn backend() -> (InMemoryRemoteStore, InMemoryChangeFeed) {
    let feed = InMemoryChangeFeed::new();
    let remote = InMemoryRemoteStore::new().with_feed(feed.clone());
    (remote, feed)
}

/// Environment with a fixed clock and a fresh client id
pub fn environment(remote: &InMemoryRemoteStore) -> TodoEnvironment {
    environment_with_ids(remote, Arc::new(UuidGenerator))
}

/// Environment with a fixed clock, a fresh client id and the given id source
pub fn environment_with_ids(
    remote: &InMemoryRemoteStore,
    ids: Arc<dyn IdGenerator>,
) -> TodoEnvironment {
    TodoEnvironment::new(
        Arc::new(test_clock()),
        ids,
        Arc::new(remote.clone()),
        ClientId::generate(),
    )
}

/// Configuration with a short teardown timeout
pub fn config() -> TodoConfig {
    TodoConfig {
        shutdown_timeout_secs: 2,
        ..TodoConfig::default()
    }
}

/// Starts a session against `remote` and `feed`
pub async fn start(remote: &InMemoryRemoteStore, feed: &InMemoryChangeFeed) -> TodoSession {
    TodoSession::start(environment(remote), feed, config())
        .await
        .expect("session should start")
}

/// An item with a random id
pub fn item(text: &str) -> TodoItem {
    TodoItem::new(TodoId::new(), text.to_string(), test_clock().now())
}

/// Polls `check` until it holds, panicking after two seconds
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if check().await {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
