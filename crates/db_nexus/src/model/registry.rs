//! Append-only registry of entity definitions.
//!
//! # Responsibility
//! - Collect every entity a database must materialize.
//! - Reject definitions that cannot be rendered as a valid relation.
//!
//! # Invariants
//! - Entries are never removed or reordered.
//! - A relation name maps to exactly one definition.

use super::entity::{ColumnDef, Entity, SqlType};
use crate::error::SchemaError;
use std::collections::HashSet;

/// Type-erased description of one registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
}

impl EntityDef {
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::NAME,
            table: T::TABLE,
            columns: T::COLUMNS,
        }
    }

    pub fn primary_key(&self) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|column| column.primary_key)
    }

    /// Checks identifiers, column uniqueness and primary-key shape.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidDefinition {
            entity: self.name,
            reason,
        };

        if !is_valid_identifier(self.table) {
            return Err(invalid(format!("invalid relation name `{}`", self.table)));
        }
        if self.columns.is_empty() {
            return Err(invalid("no columns defined".to_string()));
        }

        let mut seen = HashSet::new();
        for column in self.columns {
            if !is_valid_identifier(column.name) {
                return Err(invalid(format!("invalid column name `{}`", column.name)));
            }
            if !seen.insert(column.name) {
                return Err(invalid(format!("duplicate column `{}`", column.name)));
            }
            if let Some(fk) = column.references {
                if !is_valid_identifier(fk.table) || !is_valid_identifier(fk.column) {
                    return Err(invalid(format!(
                        "invalid foreign key target `{}.{}` on column `{}`",
                        fk.table, fk.column, column.name
                    )));
                }
            }
            if column.auto_increment
                && !(column.primary_key && column.sql_type == SqlType::Integer)
            {
                return Err(invalid(format!(
                    "auto_increment requires an INTEGER primary key, column `{}`",
                    column.name
                )));
            }
        }

        match self.columns.iter().filter(|column| column.primary_key).count() {
            1 => Ok(()),
            0 => Err(invalid("missing primary key column".to_string())),
            count => Err(invalid(format!(
                "expected one primary key column, found {count}"
            ))),
        }
    }
}

/// Explicit list of entities known to one database.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entries: Vec<EntityDef>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`. Returns `false` when the same definition was already
    /// registered.
    pub fn register<T: Entity>(&mut self) -> Result<bool, SchemaError> {
        self.register_def(EntityDef::of::<T>())
    }

    pub fn register_def(&mut self, def: EntityDef) -> Result<bool, SchemaError> {
        def.validate()?;

        if let Some(existing) = self.entries.iter().find(|entry| entry.table == def.table) {
            if *existing == def {
                return Ok(false);
            }
            return Err(SchemaError::DuplicateRelation {
                table: def.table,
                existing: existing.name,
            });
        }

        self.entries.push(def);
        Ok(true)
    }

    pub fn entries(&self) -> &[EntityDef] {
        &self.entries
    }

    pub fn get(&self, table: &str) -> Option<&EntityDef> {
        self.entries.iter().find(|entry| entry.table == table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`; identifiers are interpolated into SQL text.
pub(crate) fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
