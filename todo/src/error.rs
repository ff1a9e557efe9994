//! Error types for the todo reconciler.
//!
//! Remote failures are not errors at this level: they settle as
//! [`RemoteOutcome::Failed`](crate::types::RemoteOutcome) and are handled by
//! the reducer. What remains are contract violations at the encoded boundary
//! and failures of the session plumbing itself.

use crate::feed::FeedError;
use thiserror::Error;
use todo_sync_runtime::StoreError;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, TodoError>;

/// Errors surfaced by the reconciler.
#[derive(Debug, Error)]
pub enum TodoError {
    /// A transition tag outside the closed set was dispatched.
    ///
    /// This is a caller bug, never a runtime condition.
    #[error("Unknown transition '{tag}': expected one of SetPendingInput, AddItem, UpdateItem, DeleteItem")]
    UnknownTransition {
        /// Offending tag (empty when missing)
        tag: String,
    },

    /// A known transition tag with a payload that does not decode.
    #[error("Malformed transition: {0}")]
    InvalidTransition(#[from] serde_json::Error),

    /// The store rejected the action (e.g. after teardown).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Subscribing to the change feed failed.
    #[error(transparent)]
    Feed(#[from] FeedError),
}
