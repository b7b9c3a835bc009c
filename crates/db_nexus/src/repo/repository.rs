//! Generic CRUD repository over any `Entity`.
//!
//! # Responsibility
//! - Provide `add`/`get_by_id`/`get_all`/`update`/`delete` for every entity
//!   type without per-entity SQL.
//! - Translate absence into `RecordNotFoundError` and backend failures into
//!   `PersistenceError`.
//!
//! # Invariants
//! - Every operation runs on the caller's `Session`; the repository never
//!   commits, rolls back, or keeps a connection.
//! - `update` never inserts: a missing key is an error, not an upsert.
//! - A failed operation leaves the session usable.

use crate::error::{Error, PersistenceError, RecordNotFoundError, Result, SchemaError};
use crate::model::entity::Entity;
use crate::session::Session;
use rusqlite::types::{ToSql, Value};
use rusqlite::OptionalExtension;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Pagination options for `Repository::list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub offset: u32,
    pub limit: Option<u32>,
}

/// Partial set of column changes applied by `Repository::update`.
///
/// Setting the same column twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    values: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.values.push((column, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Stateless CRUD access object bound to entity type `T`.
///
/// Zero-sized and `Copy`; create one at startup and share it freely.
pub struct Repository<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> Repository<T> {
    pub const fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<T> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Repository<T> {}

impl<T: Entity> Debug for Repository<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &T::NAME)
            .field("table", &T::TABLE)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    /// Inserts `entity` in the session's transaction.
    ///
    /// When `entity.key()` is `None` the key column is left to the backend
    /// and the assigned key is returned.
    ///
    /// # Errors
    /// - `PersistenceError::Rejected` on constraint or type violations.
    pub fn add(&self, session: &Session, entity: &T) -> Result<T::Key> {
        let key_column = key_column::<T>()?;
        let key = entity.key();
        let values = entity.write_values();
        check_columns::<T>(values.iter().map(|(name, _)| *name), key_column)?;

        let mut columns: Vec<&str> = Vec::with_capacity(values.len() + 1);
        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
        if let Some(key) = key.as_ref() {
            columns.push(key_column);
            params.push(key);
        }
        for (name, value) in &values {
            columns.push(*name);
            params.push(value);
        }

        let conn = session.connection();
        if columns.is_empty() {
            conn.execute(&format!("INSERT INTO \"{}\" DEFAULT VALUES;", T::TABLE), [])
                .map_err(write_error::<T>)?;
        } else {
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({placeholders});",
                T::TABLE,
                quote_all(&columns)
            );
            conn.execute(&sql, params.as_slice())
                .map_err(write_error::<T>)?;
        }

        if let Some(key) = key {
            return Ok(key);
        }

        let assigned = conn
            .query_row(
                &format!(
                    "SELECT \"{key_column}\" FROM \"{}\" WHERE rowid = last_insert_rowid();",
                    T::TABLE
                ),
                [],
                |row| row.get::<_, T::Key>(0),
            )
            .map_err(read_error::<T>)?;
        Ok(assigned)
    }

    /// Loads exactly one record by primary key.
    ///
    /// # Errors
    /// - `RecordNotFoundError` when no record has `key`.
    pub fn get_by_id(&self, session: &Session, key: &T::Key) -> Result<T> {
        let key_column = key_column::<T>()?;
        let sql = format!(
            "{} WHERE \"{key_column}\" = ?1;",
            select_sql::<T>()
        );

        session
            .connection()
            .query_row(&sql, [key], |row| T::from_row(row))
            .optional()
            .map_err(read_error::<T>)?
            .ok_or_else(|| RecordNotFoundError::new(T::NAME, key).into())
    }

    /// Returns every record in insertion order; empty when the relation is.
    pub fn get_all(&self, session: &Session) -> Result<Vec<T>> {
        self.list(session, &ListQuery::default())
    }

    /// Returns one page of records in insertion order.
    pub fn list(&self, session: &Session, query: &ListQuery) -> Result<Vec<T>> {
        let mut sql = format!("{} ORDER BY rowid ASC", select_sql::<T>());
        let mut bind_values: Vec<i64> = Vec::new();

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(i64::from(limit));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(i64::from(query.offset));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(i64::from(query.offset));
        }

        let conn = session.connection();
        let mut stmt = conn.prepare(&sql).map_err(read_error::<T>)?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(bind_values))
            .map_err(read_error::<T>)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(read_error::<T>)? {
            records.push(T::from_row(row).map_err(read_error::<T>)?);
        }

        Ok(records)
    }

    /// Applies a partial patch to the record identified by `key`.
    ///
    /// An empty patch only checks that the record exists.
    ///
    /// # Errors
    /// - `RecordNotFoundError` when `key` does not exist; nothing is written.
    /// - `PersistenceError::InvalidChanges` for unknown columns or the key.
    /// - `PersistenceError::Rejected` on constraint violations.
    pub fn update(&self, session: &Session, key: &T::Key, changes: Changes) -> Result<()> {
        let key_column = key_column::<T>()?;
        check_columns::<T>(changes.iter().map(|(name, _)| name), key_column)?;

        if !self.exists(session, key)? {
            return Err(RecordNotFoundError::new(T::NAME, key).into());
        }
        if changes.is_empty() {
            return Ok(());
        }

        let columns: Vec<&str> = changes.iter().map(|(name, _)| name).collect();
        let mut params: Vec<&dyn ToSql> = changes
            .iter()
            .map(|(_, value)| value as &dyn ToSql)
            .collect();
        params.push(key);

        self.write_assignments(session, key, key_column, &columns, &params)
    }

    /// Loads the record, lets `mutate` change it, then writes every non-key
    /// column back. Returns the stored record.
    ///
    /// # Errors
    /// - `RecordNotFoundError` when `key` does not exist.
    /// - `PersistenceError::InvalidChanges` when `mutate` changes the key.
    pub fn update_with<F>(&self, session: &Session, key: &T::Key, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        let key_column = key_column::<T>()?;
        let mut entity = self.get_by_id(session, key)?;
        mutate(&mut entity);

        if entity.key().as_ref() != Some(key) {
            return Err(PersistenceError::InvalidChanges {
                entity: T::NAME,
                reason: format!("primary key `{key_column}` cannot change"),
            }
            .into());
        }

        let values = entity.write_values();
        check_columns::<T>(values.iter().map(|(name, _)| *name), key_column)?;
        if values.is_empty() {
            return Ok(entity);
        }

        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let mut params: Vec<&dyn ToSql> = values
            .iter()
            .map(|(_, value)| value as &dyn ToSql)
            .collect();
        params.push(key);

        self.write_assignments(session, key, key_column, &columns, &params)?;
        Ok(entity)
    }

    /// Removes the record identified by `key`.
    ///
    /// # Errors
    /// - `RecordNotFoundError` when `key` does not exist.
    pub fn delete(&self, session: &Session, key: &T::Key) -> Result<()> {
        let key_column = key_column::<T>()?;
        let changed = session
            .connection()
            .execute(
                &format!("DELETE FROM \"{}\" WHERE \"{key_column}\" = ?1;", T::TABLE),
                [key],
            )
            .map_err(write_error::<T>)?;

        if changed == 0 {
            return Err(RecordNotFoundError::new(T::NAME, key).into());
        }
        Ok(())
    }

    pub fn exists(&self, session: &Session, key: &T::Key) -> Result<bool> {
        let key_column = key_column::<T>()?;
        let exists: i64 = session
            .connection()
            .query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE \"{key_column}\" = ?1);",
                    T::TABLE
                ),
                [key],
                |row| row.get(0),
            )
            .map_err(read_error::<T>)?;
        Ok(exists == 1)
    }

    pub fn count(&self, session: &Session) -> Result<u64> {
        let count: i64 = session
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\";", T::TABLE), [], |row| {
                row.get(0)
            })
            .map_err(read_error::<T>)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn write_assignments(
        &self,
        session: &Session,
        key: &T::Key,
        key_column: &str,
        columns: &[&str],
        params: &[&dyn ToSql],
    ) -> Result<()> {
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, name)| format!("\"{name}\" = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE \"{}\" SET {assignments} WHERE \"{key_column}\" = ?{};",
            T::TABLE,
            columns.len() + 1
        );

        let changed = session
            .connection()
            .execute(&sql, params)
            .map_err(write_error::<T>)?;
        if changed == 0 {
            return Err(RecordNotFoundError::new(T::NAME, key).into());
        }
        Ok(())
    }
}

fn key_column<T: Entity>() -> Result<&'static str> {
    T::primary_key_column()
        .map(|column| column.name)
        .ok_or_else(|| {
            SchemaError::InvalidDefinition {
                entity: T::NAME,
                reason: "missing primary key column".to_string(),
            }
            .into()
        })
}

fn select_sql<T: Entity>() -> String {
    let columns: Vec<&str> = T::COLUMNS.iter().map(|column| column.name).collect();
    format!("SELECT {} FROM \"{}\"", quote_all(&columns), T::TABLE)
}

fn quote_all(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Written columns must be known, non-key and listed once.
fn check_columns<'a, T: Entity>(
    names: impl Iterator<Item = &'a str>,
    key_column: &str,
) -> Result<()> {
    let invalid = |reason: String| PersistenceError::InvalidChanges {
        entity: T::NAME,
        reason,
    };

    let mut seen = HashSet::new();
    for name in names {
        if name == key_column {
            return Err(invalid(format!("primary key `{key_column}` cannot change")).into());
        }
        if !T::COLUMNS.iter().any(|column| column.name == name) {
            return Err(invalid(format!("unknown column `{name}`")).into());
        }
        if !seen.insert(name) {
            return Err(invalid(format!("column `{name}` listed twice")).into());
        }
    }
    Ok(())
}

fn write_error<T: Entity>(err: rusqlite::Error) -> Error {
    PersistenceError::Rejected {
        entity: T::NAME,
        source: err,
    }
    .into()
}

fn read_error<T: Entity>(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => PersistenceError::InvalidData {
            entity: T::NAME,
            reason: err.to_string(),
        }
        .into(),
        other => PersistenceError::Query {
            entity: T::NAME,
            source: other,
        }
        .into(),
    }
}
