//! Transactional session handling and generic CRUD over SQLite.
//!
//! A `SessionManager` owns the connection pool of one database and hands out
//! scoped `Session`s; a `Repository<T>` performs CRUD for entity `T` on the
//! session it is given.
//!
//! ```
//! use db_nexus::{ColumnDef, Entity, Repository, SessionManager, SessionOptions, SqlType};
//! use rusqlite::types::Value;
//! use rusqlite::Row;
//!
//! struct Usuario {
//!     id: Option<i64>,
//!     nome: String,
//! }
//!
//! impl Entity for Usuario {
//!     type Key = i64;
//!     const NAME: &'static str = "Usuario";
//!     const TABLE: &'static str = "usuarios";
//!     const COLUMNS: &'static [ColumnDef] = &[
//!         ColumnDef::new("id", SqlType::Integer).primary_key().auto_increment(),
//!         ColumnDef::new("nome", SqlType::Text),
//!     ];
//!
//!     fn key(&self) -> Option<i64> {
//!         self.id
//!     }
//!
//!     fn write_values(&self) -> Vec<(&'static str, Value)> {
//!         vec![("nome", Value::Text(self.nome.clone()))]
//!     }
//!
//!     fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
//!         Ok(Self { id: row.get("id")?, nome: row.get("nome")? })
//!     }
//! }
//!
//! # fn main() -> Result<(), db_nexus::Error> {
//! let manager = SessionManager::initialize("sqlite://", SessionOptions::default())?;
//! manager.register::<Usuario>()?;
//! manager.create_all_tables()?;
//!
//! let usuarios = Repository::<Usuario>::new();
//! let id = manager.with_session(|session| {
//!     usuarios.add(session, &Usuario { id: None, nome: "Ana".to_string() })
//! })?;
//!
//! let ana = manager.with_session(|session| usuarios.get_by_id(session, &id))?;
//! assert_eq!(ana.nome, "Ana");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod session;

pub use config::SessionOptions;
pub use db::ConnectionTarget;
pub use error::{
    ConfigurationError, Error, PersistenceError, RecordNotFoundError, Result, SchemaError,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{ColumnDef, Entity, ForeignKey, SqlType};
pub use model::registry::{EntityDef, EntityRegistry};
pub use repo::repository::{Changes, ListQuery, Repository};
pub use session::{PoolStatus, Session, SessionManager};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
