//! Cancellable feed subscriptions.
//!
//! One forwarding task per [`ChangeKind`] turns feed notifications into
//! [`TodoAction::ChangeReceived`] dispatches. A single [`FeedSubscriptions::cancel`]
//! releases all three: the tasks observe a shutdown broadcast, drop their
//! streams and exit, so nothing is dispatched into a discarded session.

use crate::feed::{ChangeFeed, ChangeStream, FeedError};
use crate::session::TodoStore;
use crate::types::{ChangeKind, TodoAction};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Live subscriptions to every change kind
pub struct FeedSubscriptions {
    shutdown: broadcast::Sender<()>,
    tasks: Vec<(ChangeKind, JoinHandle<()>)>,
}

impl FeedSubscriptions {
    /// Subscribes to all three kinds and starts forwarding into `store`
    ///
    /// If any subscription fails, the ones already opened are cancelled
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscriptionFailed`] from the first kind that
    /// could not be subscribed.
    pub async fn open(feed: &dyn ChangeFeed, store: &TodoStore) -> Result<Self, FeedError> {
        let (shutdown, _) = broadcast::channel(1);
        let mut subscriptions = Self {
            shutdown,
            tasks: Vec::with_capacity(ChangeKind::ALL.len()),
        };

        for kind in ChangeKind::ALL {
            match feed.subscribe(kind).await {
                Ok(stream) => {
                    let cancelled = subscriptions.shutdown.subscribe();
                    let task = tokio::spawn(forward(kind, stream, store.clone(), cancelled));
                    subscriptions.tasks.push((kind, task));
                    debug!(%kind, "Subscribed to change feed");
                },
                Err(error) => {
                    warn!(%kind, %error, "Subscription failed, releasing partial set");
                    subscriptions.cancel().await;
                    return Err(error);
                },
            }
        }

        info!("Change feed subscriptions open");
        Ok(subscriptions)
    }

    /// Kinds currently subscribed, in subscription order
    #[must_use]
    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.tasks.iter().map(|(kind, _)| *kind).collect()
    }

    /// Whether any forwarding task is still running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|(_, task)| !task.is_finished())
    }

    /// Releases every subscription and waits for the forwarding tasks
    pub async fn cancel(mut self) {
        // No receivers left means every task already exited
        let _ = self.shutdown.send(());

        for (kind, task) in std::mem::take(&mut self.tasks) {
            if let Err(error) = task.await {
                warn!(%kind, %error, "Forwarding task did not exit cleanly");
            }
        }

        info!("Change feed subscriptions released");
    }
}

impl Drop for FeedSubscriptions {
    fn drop(&mut self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for FeedSubscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscriptions")
            .field("kinds", &self.kinds())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Forwards one kind of notification until cancelled
async fn forward(
    kind: ChangeKind,
    mut stream: ChangeStream,
    store: TodoStore,
    mut cancelled: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancelled.recv() => {
                debug!(%kind, "Subscription cancelled");
                break;
            }

            next = stream.next() => {
                let Some(notification) = next else {
                    debug!(%kind, "Change stream ended");
                    break;
                };

                if notification.kind != kind {
                    warn!(
                        expected = %kind,
                        received = %notification.kind,
                        "Dropping notification delivered on the wrong subscription"
                    );
                    continue;
                }

                if let Err(error) = store.send(TodoAction::ChangeReceived(notification)).await {
                    debug!(%kind, %error, "Store closed, stopping subscription");
                    break;
                }
            }
        }
    }
}
