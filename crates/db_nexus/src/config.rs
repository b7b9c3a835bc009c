//! Session manager options.
//!
//! # Invariants
//! - Every field has a default, so partial documents deserialize.
//! - `validate()` runs before any backend resource is created.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_POOL_SIZE: u32 = 5;
const DEFAULT_POOL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 15_000;

/// Backend and pool configuration for `SessionManager::initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Log every SQL statement at `debug` level (target `db_nexus::echo`).
    pub echo: bool,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// Maximum wait for a free connection, in milliseconds.
    pub pool_timeout_ms: u64,
    /// Validate pooled connections before handing them out.
    pub pre_ping: bool,
    /// SQLite lock wait per connection, in milliseconds. Applies to file
    /// targets; in-memory lock waits last until the holder finishes.
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo: false,
            pool_size: DEFAULT_POOL_SIZE,
            pool_timeout_ms: DEFAULT_POOL_TIMEOUT_MS,
            pre_ping: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
        }
    }
}

impl SessionOptions {
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Rejects values the pool cannot be built with.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pool_size == 0 {
            return Err(ConfigurationError::InvalidOption {
                name: "pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool_timeout_ms == 0 {
            return Err(ConfigurationError::InvalidOption {
                name: "pool_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
