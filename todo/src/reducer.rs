//! Reducer logic for the todo reconciler.
//!
//! Every state write goes through a [`Transition`]. User commands apply their
//! transitions immediately and describe the matching remote call as an
//! effect; the remote verdict comes back as [`TodoAction::RemoteSettled`].
//! Feed notifications are merged with a self-origin filter on `Created`.

use crate::remote::RemoteStore;
use crate::types::{
    ChangeKind, ChangeNotification, ClientId, RemoteIntent, RemoteOutcome, TodoAction, TodoId,
    TodoItem, TodoState, Transition,
};
use std::sync::Arc;
use todo_sync_core::{
    SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use tracing::{debug, warn};

/// Source of ids for newly created items
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh, never reused id
    fn next_id(&self) -> TodoId;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> TodoId {
        TodoId::new()
    }
}

/// Environment dependencies for the todo reducer
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Clock for `created_at` timestamps
    pub clock: Arc<dyn Clock>,
    /// Id source for new items
    pub ids: Arc<dyn IdGenerator>,
    /// Persistence backend
    pub remote: Arc<dyn RemoteStore>,
    /// This session's identity
    pub client_id: ClientId,
}

impl TodoEnvironment {
    /// Creates a new `TodoEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        remote: Arc<dyn RemoteStore>,
        client_id: ClientId,
    ) -> Self {
        Self {
            clock,
            ids,
            remote,
            client_id,
        }
    }
}

impl std::fmt::Debug for TodoEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoEnvironment")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Reducer for the todo list
#[derive(Clone, Debug, Default)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Replaces the state with the result of a transition
    fn commit(state: &mut TodoState, transition: Transition) {
        *state = state.apply(transition);
    }

    /// Describes a remote call whose verdict is fed back as `RemoteSettled`
    fn remote_effect(env: &TodoEnvironment, intent: RemoteIntent) -> Effect<TodoAction> {
        let remote = Arc::clone(&env.remote);

        Effect::future(async move {
            debug!(operation = intent.operation(), "Issuing remote call");

            let result = match &intent {
                RemoteIntent::Create { item, origin } => remote.create(item.clone(), *origin).await,
                RemoteIntent::Update { item } => remote.update(item.clone()).await,
                RemoteIntent::Delete { id } => remote.delete(id.clone()).await,
                RemoteIntent::BootstrapCollection => remote.create_collection().await,
            };

            Some(TodoAction::RemoteSettled {
                intent,
                outcome: RemoteOutcome::from(result),
            })
        })
    }

    /// Builds the item for the current pending input
    fn draft_item(state: &TodoState, env: &TodoEnvironment) -> TodoItem {
        TodoItem::new(
            env.ids.next_id(),
            state.pending_input.clone(),
            env.clock.now(),
        )
    }

    /// Merges a feed notification into local state
    fn merge(state: &mut TodoState, notification: ChangeNotification, env: &TodoEnvironment) {
        let ChangeNotification { kind, item, origin } = notification;

        match kind {
            ChangeKind::Created => {
                if origin == env.client_id {
                    debug!(id = %item.id, "Dropping self-originated create");
                    return;
                }
                if state.exists(&item.id) {
                    warn!(id = %item.id, %origin, "Dropping duplicate create for existing item");
                    return;
                }
                debug!(id = %item.id, %origin, "Merging remote create");
                Self::commit(state, Transition::AddItem(item));
            },
            ChangeKind::Updated => {
                debug!(id = %item.id, %origin, "Merging remote update");
                Self::commit(state, Transition::UpdateItem(item));
            },
            ChangeKind::Deleted => {
                debug!(id = %item.id, %origin, "Merging remote delete");
                Self::commit(state, Transition::DeleteItem(item));
            },
        }
    }

    /// Applies the compensation policy for a settled remote call
    fn settle(state: &mut TodoState, intent: RemoteIntent, outcome: RemoteOutcome) {
        let operation = intent.operation();

        let RemoteOutcome::Failed { reason } = outcome else {
            debug!(operation, "Remote call confirmed");
            return;
        };

        match intent {
            RemoteIntent::Create { item, .. } => {
                // The optimistic item stays; only the form text comes back
                warn!(operation, id = %item.id, %reason, "Create failed, restoring pending input");
                Self::commit(state, Transition::SetPendingInput(item.text));
            },
            RemoteIntent::Update { item } => {
                warn!(operation, id = %item.id, %reason, "Update failed");
            },
            RemoteIntent::Delete { id } => {
                warn!(operation, %id, %reason, "Delete failed, local removal stands");
            },
            RemoteIntent::BootstrapCollection => {
                warn!(operation, %reason, "Collection bootstrap failed");
            },
        }
    }
}

impl Reducer for TodoReducer {
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            TodoAction::Apply(transition) => {
                Self::commit(state, transition);
                SmallVec::new()
            },

            TodoAction::SubmitNewItem => {
                let item = Self::draft_item(state, env);

                Self::commit(state, Transition::AddItem(item.clone()));
                Self::commit(state, Transition::SetPendingInput(String::new()));

                smallvec![Self::remote_effect(
                    env,
                    RemoteIntent::Create {
                        item,
                        origin: env.client_id,
                    },
                )]
            },

            TodoAction::EditItem { item } => {
                Self::commit(state, Transition::UpdateItem(item));
                SmallVec::new()
            },

            TodoAction::PushItem { item } => {
                smallvec![Self::remote_effect(env, RemoteIntent::Update { item })]
            },

            TodoAction::DeleteItem { item } => {
                let id = item.id.clone();
                Self::commit(state, Transition::DeleteItem(item));
                smallvec![Self::remote_effect(env, RemoteIntent::Delete { id })]
            },

            TodoAction::BootstrapCollection => {
                smallvec![Self::remote_effect(env, RemoteIntent::BootstrapCollection)]
            },

            // ========== Events ==========
            TodoAction::ChangeReceived(notification) => {
                Self::merge(state, notification, env);
                SmallVec::new()
            },

            TodoAction::RemoteSettled { intent, outcome } => {
                Self::settle(state, intent, outcome);
                SmallVec::new()
            },
        }
    }
}
