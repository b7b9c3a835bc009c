//! Schema materialization for registered entities.
//!
//! # Responsibility
//! - Create every registered relation that does not exist yet.
//! - Detect existing relations whose shape differs from the definition.
//!
//! # Invariants
//! - The whole pass runs in one immediate transaction: either every missing
//!   relation is created or none is.
//! - Existing relations are never altered.
//! - Relations are `STRICT`, so values that do not fit the declared column
//!   type are rejected by the backend instead of stored.

use crate::error::SchemaError;
use crate::model::registry::{EntityDef, EntityRegistry};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

/// Column shape as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExistingColumn {
    name: String,
    declared_type: String,
    not_null: bool,
    primary_key: bool,
}

/// Creates missing relations and returns their names in registration order.
///
/// # Side effects
/// - Emits `schema_init` logging events.
pub(crate) fn create_all_tables(
    conn: &mut Connection,
    registry: &EntityRegistry,
) -> Result<Vec<&'static str>, SchemaError> {
    let started_at = Instant::now();
    info!(
        "event=schema_init module=db status=start entities={}",
        registry.len()
    );

    match apply_schema(conn, registry) {
        Ok(created) => {
            info!(
                "event=schema_init module=db status=ok created={} duration_ms={}",
                created.len(),
                started_at.elapsed().as_millis()
            );
            Ok(created)
        }
        Err(err) => {
            error!(
                "event=schema_init module=db status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn apply_schema(
    conn: &mut Connection,
    registry: &EntityRegistry,
) -> Result<Vec<&'static str>, SchemaError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut created = Vec::new();

    for def in registry.entries() {
        if table_exists(&tx, def.table)? {
            verify_table(&tx, def)?;
            continue;
        }
        tx.execute_batch(&create_table_sql(def))?;
        created.push(def.table);
    }

    tx.commit()?;
    Ok(created)
}

/// Renders `CREATE TABLE ... STRICT` for one definition. Identifiers are
/// validated at registration, quoting keeps reserved words usable.
pub(crate) fn create_table_sql(def: &EntityDef) -> String {
    let columns = def
        .columns
        .iter()
        .map(|column| {
            let mut sql = format!("\"{}\" {}", column.name, column.sql_type.as_sql());
            if column.primary_key {
                sql.push_str(" PRIMARY KEY");
                if column.auto_increment {
                    sql.push_str(" AUTOINCREMENT");
                }
            }
            if !column.nullable {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(fk) = column.references {
                sql.push_str(&format!(" REFERENCES \"{}\" (\"{}\")", fk.table, fk.column));
            }
            sql
        })
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!("CREATE TABLE \"{}\" (\n    {columns}\n) STRICT;", def.table)
}

fn verify_table(conn: &Connection, def: &EntityDef) -> Result<(), SchemaError> {
    let existing = existing_columns(conn, def.table)?;
    let conflict = |reason: String| SchemaError::Conflict {
        table: def.table,
        reason,
    };

    if !is_strict(conn, def.table)? {
        return Err(conflict(
            "relation is not STRICT; column types are not enforced".to_string(),
        ));
    }

    for column in def.columns {
        let Some(found) = existing.iter().find(|found| found.name == column.name) else {
            return Err(conflict(format!("missing column `{}`", column.name)));
        };
        if !found
            .declared_type
            .eq_ignore_ascii_case(column.sql_type.as_sql())
        {
            return Err(conflict(format!(
                "column `{}` is declared `{}`, expected `{}`",
                column.name,
                found.declared_type,
                column.sql_type.as_sql()
            )));
        }
        if found.not_null == column.nullable {
            return Err(conflict(format!(
                "column `{}` nullability differs",
                column.name
            )));
        }
        if found.primary_key != column.primary_key {
            return Err(conflict(format!(
                "column `{}` primary key membership differs",
                column.name
            )));
        }
    }

    if let Some(extra) = existing
        .iter()
        .find(|found| !def.columns.iter().any(|column| column.name == found.name))
    {
        return Err(conflict(format!("unexpected column `{}`", extra.name)));
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, SchemaError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn is_strict(conn: &Connection, table: &str) -> Result<bool, SchemaError> {
    let strict: i64 = conn.query_row(
        "SELECT \"strict\" FROM pragma_table_list WHERE \"schema\" = 'main' AND \"name\" = ?1;",
        [table],
        |row| row.get(0),
    )?;
    Ok(strict == 1)
}

fn existing_columns(conn: &Connection, table: &str) -> Result<Vec<ExistingColumn>, SchemaError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(ExistingColumn {
            name: row.get("name")?,
            declared_type: row.get("type")?,
            not_null: row.get::<_, i64>("notnull")? != 0,
            primary_key: row.get::<_, i64>("pk")? != 0,
        });
    }
    Ok(columns)
}
