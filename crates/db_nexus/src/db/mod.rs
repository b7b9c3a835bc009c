//! SQLite engine bootstrap and schema initialization.
//!
//! # Responsibility
//! - Resolve connection URLs into storage targets.
//! - Build and configure the bounded connection pool.
//! - Materialize registered entity relations.
//!
//! # Invariants
//! - No pool exists before the backend answered a probe query.
//! - Schema initialization never alters existing relations.

mod open;
pub(crate) mod schema;
pub mod url;

pub(crate) use open::{open_engine, Engine};
pub use url::ConnectionTarget;
