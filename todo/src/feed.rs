//! Change feed abstraction.
//!
//! The feed delivers create/update/delete notifications produced by any
//! session, this one included. Delivery order is not guaranteed, neither
//! across kinds nor relative to local transitions.
//!
//! Subscribing returns a [`ChangeStream`]; dropping the stream releases the
//! subscription. Session code never holds raw streams: see
//! [`FeedSubscriptions`](crate::subscription::FeedSubscriptions).

use crate::types::{ChangeKind, ChangeNotification};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur when subscribing to the feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The transport refused the subscription
    #[error("Subscription to {kind} notifications failed: {reason}")]
    SubscriptionFailed {
        /// Kind that could not be subscribed
        kind: ChangeKind,
        /// The reason for failure
        reason: String,
    },
}

/// Stream of notifications for one [`ChangeKind`].
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeNotification> + Send>>;

/// Source of server-originated change notifications.
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to notifications of one kind.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscriptionFailed`] if the subscription cannot be
    /// established.
    fn subscribe(
        &self,
        kind: ChangeKind,
    ) -> Pin<Box<dyn Future<Output = Result<ChangeStream, FeedError>> + Send + '_>>;
}
