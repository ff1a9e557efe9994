//! Remote store abstraction.
//!
//! The managed backend that persists items. Every call is asynchronous and
//! may fail; the reconciler never retries.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! store can be shared as `Arc<dyn RemoteStore>` and captured by effects.

use crate::types::{ClientId, TodoId, TodoItem};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by a remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The collection does not exist yet
    #[error("Collection not found")]
    NotFound,

    /// The backend refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Boxed future returned by [`RemoteStore`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Persistence backend for todo items.
pub trait RemoteStore: Send + Sync {
    /// Fetch every item, in server order (creation order).
    ///
    /// # Errors
    ///
    /// - [`RemoteError::NotFound`] if the collection does not exist yet
    /// - any other variant on failure
    fn fetch_all(&self) -> RemoteFuture<'_, Vec<TodoItem>>;

    /// Store a new item created by `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot receive the item.
    fn create(&self, item: TodoItem, origin: ClientId) -> RemoteFuture<'_, ()>;

    /// Replace a stored item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot receive the item.
    fn update(&self, item: TodoItem) -> RemoteFuture<'_, ()>;

    /// Delete a stored item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot receive the request.
    fn delete(&self, id: TodoId) -> RemoteFuture<'_, ()>;

    /// Create the backing collection. Idempotent, best effort.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot receive the request.
    fn create_collection(&self) -> RemoteFuture<'_, ()>;
}
