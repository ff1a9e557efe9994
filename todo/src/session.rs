//! A client session: initial load, store, live subscriptions and teardown.
//!
//! ```ignore
//! let session = TodoSession::start(env, &feed, TodoConfig::from_env()).await?;
//!
//! session.set_pending_input("buy milk").await?;
//! let mut handle = session.submit_new_item().await?;
//! handle.wait().await; // remote create settled
//!
//! session.teardown().await?;
//! ```

use crate::config::TodoConfig;
use crate::error::Result;
use crate::feed::ChangeFeed;
use crate::reducer::{TodoEnvironment, TodoReducer};
use crate::remote::RemoteError;
use crate::subscription::FeedSubscriptions;
use crate::types::{ClientId, TodoAction, TodoItem, TodoState, Transition};
use tokio::sync::broadcast;
use todo_sync_runtime::{EffectHandle, Store};
use tracing::{info, warn};

/// Store specialised for the todo reducer
pub type TodoStore = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

/// One client's view of the shared list
pub struct TodoSession {
    store: TodoStore,
    subscriptions: Option<FeedSubscriptions>,
    config: TodoConfig,
    client_id: ClientId,
}

impl TodoSession {
    /// Starts a session
    ///
    /// 1. Fetches the current list; any failure degrades to an empty list
    /// 2. Builds the store seeded with that list
    /// 3. Subscribes to created, updated and deleted notifications
    /// 4. If the collection did not exist, requests it (fire-and-forget)
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Feed`](crate::TodoError::Feed) if the change feed
    /// refuses a subscription. Remote failures never fail a start.
    #[tracing::instrument(skip_all, fields(client_id = %env.client_id, collection = %config.collection))]
    pub async fn start(
        env: TodoEnvironment,
        feed: &dyn ChangeFeed,
        config: TodoConfig,
    ) -> Result<Self> {
        let client_id = env.client_id;

        let (initial, missing_collection) = match env.remote.fetch_all().await {
            Ok(items) => {
                info!(count = items.len(), "Loaded initial list");
                (TodoState::with_items(items), false)
            },
            Err(RemoteError::NotFound) => {
                info!("Collection does not exist yet, starting empty");
                (TodoState::new(), true)
            },
            Err(error) => {
                warn!(%error, "Initial load failed, starting empty");
                (TodoState::new(), false)
            },
        };

        let store = Store::with_broadcast_capacity(
            initial,
            TodoReducer::new(),
            env,
            config.broadcast_capacity,
        );

        let subscriptions = match FeedSubscriptions::open(feed, &store).await {
            Ok(subscriptions) => subscriptions,
            Err(error) => {
                if let Err(shutdown_error) = store.shutdown(config.shutdown_timeout()).await {
                    warn!(error = %shutdown_error, "Store shutdown after failed start timed out");
                }
                return Err(error.into());
            },
        };

        if missing_collection {
            // Not awaited: bootstrap failure is only logged
            store.send(TodoAction::BootstrapCollection).await?;
        }

        info!("Session started");

        Ok(Self {
            store,
            subscriptions: Some(subscriptions),
            config,
            client_id,
        })
    }

    /// Dispatches a transition
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn dispatch(&self, transition: Transition) -> Result<EffectHandle> {
        self.send(TodoAction::Apply(transition)).await
    }

    /// Decodes and dispatches a transition in its JSON form
    ///
    /// # Errors
    ///
    /// - [`TodoError::UnknownTransition`](crate::TodoError::UnknownTransition) for a tag outside the four transitions
    /// - [`TodoError::InvalidTransition`](crate::TodoError::InvalidTransition) for a malformed payload
    /// - [`TodoError::Store`](crate::TodoError::Store) after teardown
    pub async fn dispatch_encoded(&self, json: &str) -> Result<EffectHandle> {
        let transition = Transition::decode(json)?;
        self.dispatch(transition).await
    }

    /// Replaces the pending input
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn set_pending_input(&self, text: impl Into<String>) -> Result<EffectHandle> {
        self.dispatch(Transition::SetPendingInput(text.into())).await
    }

    /// Turns the pending input into a new item and creates it remotely
    ///
    /// The returned handle completes once the remote create has settled.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn submit_new_item(&self) -> Result<EffectHandle> {
        self.send(TodoAction::SubmitNewItem).await
    }

    /// Replaces an item locally without contacting the backend
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn edit_item(&self, item: TodoItem) -> Result<EffectHandle> {
        self.send(TodoAction::EditItem { item }).await
    }

    /// Sends an item's current version to the backend
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn push_item(&self, item: TodoItem) -> Result<EffectHandle> {
        self.send(TodoAction::PushItem { item }).await
    }

    /// Removes an item locally and remotely
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) after teardown.
    pub async fn delete_item(&self, item: TodoItem) -> Result<EffectHandle> {
        self.send(TodoAction::DeleteItem { item }).await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> TodoState {
        self.store.state(TodoState::clone).await
    }

    /// Copy of the current items
    pub async fn items(&self) -> Vec<TodoItem> {
        self.store.state(|state| state.items.clone()).await
    }

    /// Current pending input
    pub async fn pending_input(&self) -> String {
        self.store.state(|state| state.pending_input.clone()).await
    }

    /// This session's identity
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Configuration the session was started with
    #[must_use]
    pub const fn config(&self) -> &TodoConfig {
        &self.config
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &TodoStore {
        &self.store
    }

    /// Whether the feed subscriptions are still forwarding
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscriptions
            .as_ref()
            .is_some_and(FeedSubscriptions::is_active)
    }

    /// Observe actions fed back by effects (e.g. `RemoteSettled`)
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<TodoAction> {
        self.store.subscribe_actions()
    }

    /// Ends the session
    ///
    /// Cancels all three subscriptions first, then shuts the store down so
    /// no later dispatch is accepted, waiting up to the configured timeout for
    /// in-flight remote calls.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`](crate::TodoError::Store) if remote calls
    /// are still running when the timeout expires.
    #[tracing::instrument(skip_all, fields(client_id = %self.client_id))]
    pub async fn teardown(mut self) -> Result<()> {
        if let Some(subscriptions) = self.subscriptions.take() {
            subscriptions.cancel().await;
        }

        self.store.shutdown(self.config.shutdown_timeout()).await?;

        info!("Session ended");
        Ok(())
    }

    async fn send(&self, action: TodoAction) -> Result<EffectHandle> {
        Ok(self.store.send(action).await?)
    }
}

impl std::fmt::Debug for TodoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoSession")
            .field("client_id", &self.client_id)
            .field("subscriptions", &self.subscriptions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
