//! Error taxonomy for session, schema and repository operations.
//!
//! # Responsibility
//! - Classify every backend failure into one of four kinds.
//! - Keep the original `rusqlite`/`r2d2` error reachable through `source()`.
//!
//! # Invariants
//! - Absence of a keyed record is always `RecordNotFoundError`, never a
//!   sentinel value.
//! - Backend errors are wrapped, never swallowed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by every public operation of the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    NotFound(#[from] RecordNotFoundError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl Error {
    /// Returns whether this error reports a missing keyed record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the not-found details when this error reports a missing record.
    pub fn as_not_found(&self) -> Option<&RecordNotFoundError> {
        match self {
            Self::NotFound(err) => Some(err),
            _ => None,
        }
    }

    /// No error is retried automatically; transient backend failures are
    /// surfaced as-is and the caller decides.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Invalid connection string, unreachable backend or bad options.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid connection url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported backend `{scheme}`; expected `sqlite`")]
    UnsupportedBackend { scheme: String },
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("backend `{target}` is unreachable: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Invalid entity definitions or schema conflicts.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid definition for entity `{entity}`: {reason}")]
    InvalidDefinition { entity: &'static str, reason: String },
    #[error("relation `{table}` is already registered by entity `{existing}` with a different definition")]
    DuplicateRelation {
        table: &'static str,
        existing: &'static str,
    },
    #[error("relation `{table}` conflicts with existing schema: {reason}")]
    Conflict { table: &'static str, reason: String },
    #[error("schema statement failed: {0}")]
    Backend(#[from] rusqlite::Error),
}

/// A keyed lookup, update or delete found no matching record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity} with key `{key}` not found")]
pub struct RecordNotFoundError {
    pub entity: &'static str,
    pub key: String,
}

impl RecordNotFoundError {
    pub fn new(entity: &'static str, key: impl ToString) -> Self {
        Self {
            entity,
            key: key.to_string(),
        }
    }
}

/// The backend rejected a write or a transaction could not be finalized.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{entity} write rejected: {source}")]
    Rejected {
        entity: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{entity} query failed: {source}")]
    Query {
        entity: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("invalid changes for {entity}: {reason}")]
    InvalidChanges { entity: &'static str, reason: String },
    #[error("invalid persisted {entity} data: {reason}")]
    InvalidData { entity: &'static str, reason: String },
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] rusqlite::Error),
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] rusqlite::Error),
    #[error("failed to roll back transaction: {0}")]
    Rollback(#[source] rusqlite::Error),
}
