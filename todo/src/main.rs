//! Two clients sharing one in-memory backend.
//!
//! The first client adds, edits and deletes items; the second only watches
//! the merged result arrive over the change feed.

use std::sync::Arc;
use std::time::Duration;
use todo_sync::mocks::{InMemoryChangeFeed, InMemoryRemoteStore};
use todo_sync::{ClientId, TodoConfig, TodoEnvironment, TodoSession, TodoState, UuidGenerator};
use todo_sync_core::environment::SystemClock;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to let feed notifications propagate between steps
const PROPAGATION: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TodoConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(collection = %config.collection, "Starting todo sync demo");

    let feed = InMemoryChangeFeed::new();
    let backend = InMemoryRemoteStore::named(config.collection.clone())
        .without_collection()
        .with_feed(feed.clone());

    let writer = TodoSession::start(environment(&backend), &feed, config.clone()).await?;
    let watcher = TodoSession::start(environment(&backend), &feed, config).await?;

    tokio::time::sleep(PROPAGATION).await;
    info!(
        exists = backend.collection_exists(),
        "Collection bootstrapped"
    );

    for text in ["Buy milk", "Walk the dog", "Water the plants"] {
        writer.set_pending_input(text).await?;
        writer.submit_new_item().await?.wait().await;
    }
    tokio::time::sleep(PROPAGATION).await;
    print_lists("After adding", &writer, &watcher).await;

    let items = writer.items().await;
    if let Some(first) = items.first() {
        let edited = first.with_text("Buy oat milk");
        writer.edit_item(edited.clone()).await?;
        writer.push_item(edited).await?.wait().await;
    }
    if let Some(second) = items.get(1) {
        writer.delete_item(second.clone()).await?.wait().await;
    }
    tokio::time::sleep(PROPAGATION).await;
    print_lists("After editing and deleting", &writer, &watcher).await;

    writer.teardown().await?;
    watcher.teardown().await?;

    info!(stored = backend.items().len(), "Demo finished");
    Ok(())
}

fn environment(backend: &InMemoryRemoteStore) -> TodoEnvironment {
    TodoEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(UuidGenerator),
        Arc::new(backend.clone()),
        ClientId::generate(),
    )
}

async fn print_lists(title: &str, writer: &TodoSession, watcher: &TodoSession) {
    println!("=== {title} ===");
    print_state("writer", &writer.snapshot().await);
    print_state("watcher", &watcher.snapshot().await);
    println!();
}

fn print_state(label: &str, state: &TodoState) {
    println!("  {label} ({} items)", state.count());
    for item in &state.items {
        let mark = if item.completed { "x" } else { " " };
        println!("    [{mark}] {} ({})", item.text, item.id);
    }
}
