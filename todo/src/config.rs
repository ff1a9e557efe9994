//! Configuration for a todo session.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Session configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoConfig {
    /// Name of the backing collection (used in logs and by the in-memory backend)
    pub collection: String,
    /// Capacity of the store's action broadcast channel
    pub broadcast_capacity: usize,
    /// How long teardown waits for in-flight remote calls, in seconds
    pub shutdown_timeout_secs: u64,
    /// `tracing_subscriber::EnvFilter` directives for the demo binary
    pub log_filter: String,
}

impl TodoConfig {
    /// Default collection name
    pub const DEFAULT_COLLECTION: &'static str = "todos";
    /// Default broadcast capacity
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;
    /// Default teardown timeout
    pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
    /// Default log filter
    pub const DEFAULT_LOG_FILTER: &'static str = "info,todo_sync=debug";

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TODO_SYNC_COLLECTION` | `todos` |
    /// | `TODO_SYNC_BROADCAST_CAPACITY` | `64` |
    /// | `TODO_SYNC_SHUTDOWN_TIMEOUT_SECS` | `5` |
    /// | `TODO_SYNC_LOG` | `info,todo_sync=debug` |
    ///
    /// Unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            collection: lookup("TODO_SYNC_COLLECTION")
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| Self::DEFAULT_COLLECTION.to_string()),
            // A zero-capacity broadcast channel cannot be built
            broadcast_capacity: lookup("TODO_SYNC_BROADCAST_CAPACITY")
                .and_then(|s| s.parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(Self::DEFAULT_BROADCAST_CAPACITY),
            shutdown_timeout_secs: lookup("TODO_SYNC_SHUTDOWN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(Self::DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            log_filter: lookup("TODO_SYNC_LOG")
                .unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Teardown timeout as a [`Duration`]
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
