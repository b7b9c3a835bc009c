//! Session lifecycle management.
//!
//! # Responsibility
//! - Own the engine (connection pool) for one target database.
//! - Hand out scoped sessions with automatic commit/rollback/release.
//! - Materialize the schema of every registered entity.
//!
//! # Invariants
//! - One manager per target database; the engine lives as long as it.
//! - Repositories never open or finalize sessions; only this module does.

mod scope;

pub use scope::Session;

use crate::config::SessionOptions;
use crate::db::{open_engine, schema, ConnectionTarget, Engine};
use crate::error::{ConfigurationError, Error, Result};
use crate::model::entity::Entity;
use crate::model::registry::{EntityDef, EntityRegistry};
use log::{error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

/// Snapshot of pool usage, mainly for leak diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open pooled connections, idle or checked out.
    pub connections: u32,
    pub idle_connections: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle_connections)
    }
}

/// Owns the backend engine and the entity registry of one database.
pub struct SessionManager {
    engine: Engine,
    target: ConnectionTarget,
    options: SessionOptions,
    registry: RwLock<EntityRegistry>,
    next_session_id: AtomicU64,
}

impl SessionManager {
    /// Configures and validates the engine for `connection_url`.
    ///
    /// # Errors
    /// - `ConfigurationError::InvalidUrl` / `UnsupportedBackend` for a bad URL.
    /// - `ConfigurationError::InvalidOption` for unusable options.
    /// - `ConfigurationError::Unreachable` when the backend cannot be opened.
    /// - `ConfigurationError::Pool` when the pool cannot be built.
    pub fn initialize(connection_url: &str, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        let target = ConnectionTarget::parse(connection_url)?;
        let engine = open_engine(&target, &options)?;

        Ok(Self {
            engine,
            target,
            options,
            registry: RwLock::new(EntityRegistry::new()),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Adds `T` to this database's registry.
    ///
    /// Returns `false` when `T` was already registered with the same
    /// definition.
    pub fn register<T: Entity>(&self) -> Result<bool> {
        Ok(self.registry_mut().register::<T>()?)
    }

    pub fn register_def(&self, def: EntityDef) -> Result<bool> {
        Ok(self.registry_mut().register_def(def)?)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, EntityRegistry> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the registered definitions, in registration order.
    pub fn registry(&self) -> EntityRegistry {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Creates every registered relation that does not exist yet.
    ///
    /// Returns the relations created by this call; an empty list means the
    /// schema was already complete.
    ///
    /// # Errors
    /// - `SchemaError::Conflict` when an existing relation differs from its
    ///   definition. Nothing is created in that case.
    pub fn create_all_tables(&self) -> Result<Vec<&'static str>> {
        let registry = self.registry();
        let mut conn = self
            .engine
            .pool
            .get()
            .map_err(ConfigurationError::from)?;
        Ok(schema::create_all_tables(&mut conn, &registry)?)
    }

    /// Opens a session: checks out a connection and begins a transaction.
    ///
    /// The returned guard must be finalized with `commit()`; dropping it
    /// without commit rolls back.
    ///
    /// # Errors
    /// - `ConfigurationError::Pool` when no connection frees up within
    ///   `pool_timeout_ms`.
    /// - `PersistenceError::Begin` when the transaction cannot start.
    pub fn get_session(&self) -> Result<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let conn = match self.engine.pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=session_begin module=session status=error session_id={id} error_code=pool_checkout_failed error={err}"
                );
                return Err(ConfigurationError::from(err).into());
            }
        };
        Ok(Session::begin(conn, id)?)
    }

    /// Runs `work` inside one session.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err` or
    /// panics. The connection is released before this function returns.
    pub fn with_session<R, E, F>(&self, work: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&Session) -> std::result::Result<R, E>,
        E: From<Error>,
    {
        let session = self.get_session()?;
        match work(&session) {
            Ok(value) => {
                session.commit().map_err(Error::from)?;
                Ok(value)
            }
            Err(err) => {
                // The work error wins; rollback failures are already logged.
                let _ = session.rollback();
                Err(err)
            }
        }
    }

    pub fn pool_status(&self) -> PoolStatus {
        let state = self.engine.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        info!(
            "event=db_close module=db status=ok target={}",
            self.target
        );
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("target", &self.target)
            .field("options", &self.options)
            .field("pool", &self.pool_status())
            .finish_non_exhaustive()
    }
}
