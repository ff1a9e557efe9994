//! Domain types for the todo reconciler.
//!
//! The client keeps an ordered list of items plus the text of the
//! not-yet-submitted form. Items are keyed by an id generated on the client
//! at creation time; the list order is insertion order, never `created_at`.

use crate::remote::RemoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a todo item
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(Uuid);

impl TodoId {
    /// Creates a new random `TodoId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `TodoId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one client session
///
/// Generated once when a session starts. Outgoing creates are tagged with it
/// and `Created` notifications carrying it are recognized as our own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generates a fresh session identity
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `ClientId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    /// Unique identifier, assigned by the creating client
    pub id: TodoId,
    /// Free-form content
    pub text: String,
    /// Completion flag (carried as data, never toggled by a transition)
    pub completed: bool,
    /// Creation time, a display hint only
    pub created_at: DateTime<Utc>,
}

impl TodoItem {
    /// Creates a new, uncompleted todo item
    #[must_use]
    pub const fn new(id: TodoId, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at,
        }
    }

    /// Returns a copy of this item with different text
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Client state: the ordered list and the pending form input
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoState {
    /// Items in insertion order, ids unique
    pub items: Vec<TodoItem>,
    /// Content of the new-item form
    pub pending_input: String,
}

impl TodoState {
    /// Creates a new empty state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            pending_input: String::new(),
        }
    }

    /// Creates a state seeded with items in the given order
    #[must_use]
    pub const fn with_items(items: Vec<TodoItem>) -> Self {
        Self {
            items,
            pending_input: String::new(),
        }
    }

    /// Returns the number of items
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Returns the index of the item with the given id
    #[must_use]
    pub fn position(&self, id: &TodoId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// Returns an item by ID
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Checks if an item exists
    #[must_use]
    pub fn exists(&self, id: &TodoId) -> bool {
        self.position(id).is_some()
    }
}

/// The four state transitions
///
/// Every change to [`TodoState`] is one of these. The encoded form is
/// `{"type": "<Variant>", "payload": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Transition {
    /// Replace the pending input
    SetPendingInput(String),
    /// Append an item
    AddItem(TodoItem),
    /// Replace the item with the same id, keeping its position
    UpdateItem(TodoItem),
    /// Remove the item with the same id
    DeleteItem(TodoItem),
}

impl Transition {
    /// Tags accepted at the encoded boundary
    pub const TAGS: [&'static str; 4] = ["SetPendingInput", "AddItem", "UpdateItem", "DeleteItem"];

    /// The variant tag
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::SetPendingInput(_) => "SetPendingInput",
            Self::AddItem(_) => "AddItem",
            Self::UpdateItem(_) => "UpdateItem",
            Self::DeleteItem(_) => "DeleteItem",
        }
    }
}

/// Kind of change carried by a feed notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// An item was created
    Created,
    /// An item was updated
    Updated,
    /// An item was deleted
    Deleted,
}

impl ChangeKind {
    /// Every kind, in subscription order
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A change announced by the feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    /// What happened
    pub kind: ChangeKind,
    /// The full item payload
    pub item: TodoItem,
    /// Session that originated the change
    pub origin: ClientId,
}

impl ChangeNotification {
    /// `Created` notification
    #[must_use]
    pub const fn created(item: TodoItem, origin: ClientId) -> Self {
        Self {
            kind: ChangeKind::Created,
            item,
            origin,
        }
    }

    /// `Updated` notification
    #[must_use]
    pub const fn updated(item: TodoItem, origin: ClientId) -> Self {
        Self {
            kind: ChangeKind::Updated,
            item,
            origin,
        }
    }

    /// `Deleted` notification
    #[must_use]
    pub const fn deleted(item: TodoItem, origin: ClientId) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            item,
            origin,
        }
    }
}

/// An outgoing mutation, already applied locally, awaiting the remote verdict
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteIntent {
    /// Create an item, tagged with the creating session
    Create {
        /// Item as added locally
        item: TodoItem,
        /// Creating session
        origin: ClientId,
    },
    /// Push the local version of an item
    Update {
        /// Item to store
        item: TodoItem,
    },
    /// Delete an item
    Delete {
        /// Item to delete
        id: TodoId,
    },
    /// Create the backing collection (first run)
    BootstrapCollection,
}

impl RemoteIntent {
    /// Short operation name for logs
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::BootstrapCollection => "create_collection",
        }
    }
}

/// Remote verdict on an intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteOutcome {
    /// The backend accepted the mutation
    Confirmed,
    /// The backend rejected it or could not be reached
    Failed {
        /// Error description
        reason: String,
    },
}

impl From<Result<(), RemoteError>> for RemoteOutcome {
    fn from(result: Result<(), RemoteError>) -> Self {
        match result {
            Ok(()) => Self::Confirmed,
            Err(error) => Self::Failed {
                reason: error.to_string(),
            },
        }
    }
}

/// Actions handled by the todo reducer
///
/// Commands come from the local user; events are outcomes fed back by
/// effects or delivered by the change feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoAction {
    // ========== Commands ==========
    /// Command: apply one transition as-is
    Apply(Transition),

    /// Command: turn the pending input into a new item (optimistic)
    SubmitNewItem,

    /// Command: edit an item locally, without contacting the backend
    EditItem {
        /// Edited item
        item: TodoItem,
    },

    /// Command: push the local version of an item to the backend
    PushItem {
        /// Item to push
        item: TodoItem,
    },

    /// Command: delete an item locally and remotely
    DeleteItem {
        /// Item to delete
        item: TodoItem,
    },

    /// Command: create the backing collection
    BootstrapCollection,

    // ========== Events ==========
    /// Event: the change feed delivered a notification
    ChangeReceived(ChangeNotification),

    /// Event: a remote call finished
    RemoteSettled {
        /// What was attempted
        intent: RemoteIntent,
        /// How it ended
        outcome: RemoteOutcome,
    },
}

impl TodoAction {
    /// Returns `true` for user-issued commands
    #[must_use]
    pub const fn is_command(&self) -> bool {
        !self.is_event()
    }

    /// Returns `true` for effect or feed outcomes
    #[must_use]
    pub const fn is_event(&self) -> bool {
        matches!(self, Self::ChangeReceived(_) | Self::RemoteSettled { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    fn item(text: &str) -> TodoItem {
        TodoItem::new(TodoId::new(), text.to_string(), Utc::now())
    }

    #[test]
    fn todo_id_display() {
        let id = TodoId::new();
        assert_eq!(format!("{id}"), id.as_uuid().to_string());
    }

    #[test]
    fn todo_item_new_is_not_completed() {
        let id = TodoId::new();
        let now = Utc::now();
        let todo = TodoItem::new(id.clone(), "Test todo".to_string(), now);

        assert_eq!(todo.id, id);
        assert_eq!(todo.text, "Test todo");
        assert!(!todo.completed);
        assert_eq!(todo.created_at, now);
    }

    #[test]
    fn with_text_keeps_identity() {
        let original = item("milk");
        let edited = original.with_text("oat milk");

        assert_eq!(edited.id, original.id);
        assert_eq!(edited.created_at, original.created_at);
        assert_eq!(edited.text, "oat milk");
    }

    #[test]
    fn item_serializes_camel_case() {
        let todo = item("milk");
        let json = serde_json::to_value(&todo).unwrap();

        assert!(json.get("createdAt").unwrap().is_string());
        assert_eq!(json["completed"], serde_json::json!(false));
        assert_eq!(json["id"], serde_json::json!(todo.id.to_string()));
    }

    #[test]
    fn state_lookups() {
        let a = item("a");
        let b = item("b");
        let state = TodoState::with_items(vec![a.clone(), b.clone()]);

        assert_eq!(state.count(), 2);
        assert_eq!(state.position(&b.id), Some(1));
        assert_eq!(state.get(&a.id), Some(&a));
        assert!(!state.exists(&TodoId::new()));
        assert!(state.pending_input.is_empty());
    }

    #[test]
    fn transition_encoding_is_tagged() {
        let json = serde_json::to_value(Transition::SetPendingInput("x".to_string())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "SetPendingInput", "payload": "x"})
        );
    }

    #[test]
    fn transition_tags_match_variants() {
        let todo = item("a");
        let transitions = [
            Transition::SetPendingInput(String::new()),
            Transition::AddItem(todo.clone()),
            Transition::UpdateItem(todo.clone()),
            Transition::DeleteItem(todo),
        ];
        let tags: Vec<_> = transitions.iter().map(Transition::tag).collect();
        assert_eq!(tags, Transition::TAGS);
    }

    #[test]
    fn remote_outcome_from_result() {
        assert_eq!(RemoteOutcome::from(Ok(())), RemoteOutcome::Confirmed);
        assert_eq!(
            RemoteOutcome::from(Err(RemoteError::Rejected("nope".to_string()))),
            RemoteOutcome::Failed {
                reason: "Request rejected: nope".to_string()
            }
        );
    }

    #[test]
    fn action_classification() {
        assert!(TodoAction::SubmitNewItem.is_command());
        assert!(!TodoAction::SubmitNewItem.is_event());

        let event = TodoAction::ChangeReceived(ChangeNotification::created(
            item("a"),
            ClientId::generate(),
        ));
        assert!(event.is_event());
        assert!(!event.is_command());
    }

    #[test]
    fn change_kind_display() {
        let names: Vec<_> = ChangeKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["created", "updated", "deleted"]);
    }
}
