//! Client-side state reconciler for a collaborative todo list.
//!
//! Each client keeps a local list plus the text of its new-item form. Local
//! edits are applied optimistically and sent to a shared backend; changes made
//! by other clients arrive on a change feed and are merged in. A per-session
//! [`ClientId`] lets a client recognise its own creates coming back and skip
//! them.
//!
//! - [`TodoState::apply`] is the pure transition function
//! - [`TodoReducer`] applies user commands, feed notifications and remote
//!   outcomes, describing remote calls as effects
//! - [`TodoSession`] wires the reducer into a store, loads the initial list,
//!   keeps the three feed subscriptions alive and tears them down
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use todo_sync::mocks::{InMemoryChangeFeed, InMemoryRemoteStore};
//! use todo_sync::{ClientId, TodoConfig, TodoEnvironment, TodoSession, UuidGenerator};
//! use todo_sync_core::environment::SystemClock;
//!
//! # async fn example() -> todo_sync::Result<()> {
//! let feed = InMemoryChangeFeed::new();
//! let remote = InMemoryRemoteStore::new().with_feed(feed.clone());
//!
//! let env = TodoEnvironment::new(
//!     Arc::new(SystemClock),
//!     Arc::new(UuidGenerator),
//!     Arc::new(remote),
//!     ClientId::generate(),
//! );
//! let session = TodoSession::start(env, &feed, TodoConfig::default()).await?;
//!
//! session.set_pending_input("Buy milk").await?;
//! session.submit_new_item().await?.wait().await;
//!
//! println!("{} items", session.items().await.len());
//! session.teardown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod mocks;
pub mod reducer;
pub mod remote;
pub mod session;
pub mod subscription;
mod transition;
pub mod types;

// Re-export commonly used types
pub use config::TodoConfig;
pub use error::{Result, TodoError};
pub use feed::{ChangeFeed, ChangeStream, FeedError};
pub use reducer::{IdGenerator, TodoEnvironment, TodoReducer, UuidGenerator};
pub use remote::{RemoteError, RemoteStore};
pub use session::{TodoSession, TodoStore};
pub use subscription::FeedSubscriptions;
pub use types::{
    ChangeKind, ChangeNotification, ClientId, RemoteIntent, RemoteOutcome, TodoAction, TodoId,
    TodoItem, TodoState, Transition,
};
