//! Scoped unit-of-work over one pooled connection.
//!
//! # Responsibility
//! - Own one checked-out connection and one open transaction.
//! - Finalize the transaction exactly once: commit, rollback, or rollback on
//!   drop.
//!
//! # Invariants
//! - The connection returns to the pool when the `Session` is dropped, on
//!   every exit path, whether or not COMMIT/ROLLBACK succeeded.
//! - A failed COMMIT is followed by ROLLBACK before the error propagates.
//! - `Session` is `Send` but not `Sync`: one logical caller at a time.

use crate::error::PersistenceError;
use log::{debug, error, warn};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Committed,
    RolledBack,
}

impl SessionState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// One transactional unit-of-work.
///
/// Obtain it from `SessionManager::get_session` (guard form) or let
/// `SessionManager::with_session` drive it (closure form). Dropping an
/// unfinished session rolls it back.
pub struct Session {
    conn: PooledConnection<SqliteConnectionManager>,
    id: u64,
    state: SessionState,
    opened_at: Instant,
}

impl Session {
    pub(crate) fn begin(
        conn: PooledConnection<SqliteConnectionManager>,
        id: u64,
    ) -> Result<Self, PersistenceError> {
        if !conn.is_autocommit() {
            // Left open by a session whose rollback failed.
            warn!("event=session_begin module=session status=recovered session_id={id} reason=stale_transaction");
            conn.execute_batch("ROLLBACK;")
                .map_err(PersistenceError::Rollback)?;
        }

        conn.execute_batch("BEGIN DEFERRED;")
            .map_err(PersistenceError::Begin)?;
        debug!("event=session_begin module=session status=ok session_id={id}");

        Ok(Self {
            conn,
            id,
            state: SessionState::Active,
            opened_at: Instant::now(),
        })
    }

    /// Connection bound to this session's transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Commits the transaction and releases the connection.
    ///
    /// # Errors
    /// - `PersistenceError::Commit` when the backend refuses the commit (for
    ///   example a deferred constraint). The transaction is rolled back
    ///   before this error is returned.
    pub fn commit(mut self) -> Result<(), PersistenceError> {
        match self.conn.execute_batch("COMMIT;") {
            Ok(()) => {
                self.state = SessionState::Committed;
                debug!(
                    "event=session_commit module=session status=ok session_id={}",
                    self.id
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=session_commit module=session status=error session_id={} error={}",
                    self.id, err
                );
                // Rollback failures are logged by finish_rollback.
                let _ = self.finish_rollback("commit_failed");
                Err(PersistenceError::Commit(err))
            }
        }
    }

    /// Rolls the transaction back and releases the connection.
    pub fn rollback(mut self) -> Result<(), PersistenceError> {
        self.finish_rollback("explicit")
    }

    fn finish_rollback(&mut self, reason: &str) -> Result<(), PersistenceError> {
        self.state = SessionState::RolledBack;
        if self.conn.is_autocommit() {
            // SQLite already ended the transaction (e.g. on some commit errors).
            return Ok(());
        }

        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => {
                debug!(
                    "event=session_rollback module=session status=ok session_id={} reason={reason}",
                    self.id
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=session_rollback module=session status=error session_id={} reason={reason} error={}",
                    self.id, err
                );
                Err(PersistenceError::Rollback(err))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            let reason = if std::thread::panicking() {
                "panic"
            } else {
                "dropped"
            };
            let _ = self.finish_rollback(reason);
        }
        debug!(
            "event=session_release module=session status=ok session_id={} outcome={} duration_ms={}",
            self.id,
            self.state.as_str(),
            self.opened_at.elapsed().as_millis()
        );
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
