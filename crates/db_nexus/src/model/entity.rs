//! Entity contract and static column definitions.
//!
//! # Responsibility
//! - Describe how an application record maps onto one SQLite relation.
//! - Provide row decoding/encoding hooks used by the generic repository.
//!
//! # Invariants
//! - Every entity has exactly one primary-key column.
//! - `write_values()` never contains the primary-key column; the repository
//!   binds the key itself from `key()`.

use rusqlite::types::{FromSql, ToSql, Value};
use rusqlite::Row;
use std::fmt::{Debug, Display};

/// Storage class of a column, rendered as the declared SQLite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

/// Foreign key target of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

/// Static definition of one column.
///
/// Built with `const` builders so entity definitions can live in a
/// `&'static [ColumnDef]`:
///
/// ```
/// use db_nexus::{ColumnDef, SqlType};
///
/// const COLUMNS: &[ColumnDef] = &[
///     ColumnDef::new("id", SqlType::Integer).primary_key().auto_increment(),
///     ColumnDef::new("email", SqlType::Text).unique(),
/// ];
/// assert!(COLUMNS[0].primary_key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    /// Creates a `NOT NULL` column without constraints.
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            references: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Lets the backend assign the key when the entity has none.
    ///
    /// Only valid on an `INTEGER` primary key (SQLite rowid alias).
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some(ForeignKey { table, column });
        self
    }
}

/// Application record mapped to one relation.
///
/// Implementations are plain structs; the crate never inspects them beyond
/// this trait.
pub trait Entity: Sized {
    /// Primary key type. `Display` is used in not-found diagnostics.
    type Key: ToSql + FromSql + Clone + PartialEq + Debug + Display;

    /// Entity name used in diagnostics, e.g. `Usuario`.
    const NAME: &'static str;
    /// Relation name, e.g. `usuarios`.
    const TABLE: &'static str;
    /// All columns, primary key included.
    const COLUMNS: &'static [ColumnDef];

    /// Current key, or `None` when the backend should assign one.
    fn key(&self) -> Option<Self::Key>;

    /// Non-key column values to persist, by column name.
    fn write_values(&self) -> Vec<(&'static str, Value)>;

    /// Decodes a record from a row selected with every column of `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Returns the primary-key column definition.
    fn primary_key_column() -> Option<&'static ColumnDef> {
        Self::COLUMNS.iter().find(|column| column.primary_key)
    }
}
