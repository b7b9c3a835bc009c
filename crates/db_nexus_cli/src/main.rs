//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run one add/get/update/list/delete cycle against a database URL.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `db_nexus_cli [connection_url]`, defaulting to `sqlite://`.
//! Set `DB_NEXUS_LOG_DIR` to also write rolling log files there.

use db_nexus::{
    Changes, ColumnDef, Entity, Repository, SessionManager, SessionOptions, SqlType,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::Row;
use std::process::ExitCode;

const DEFAULT_URL: &str = "sqlite://";

#[derive(Debug)]
struct Usuario {
    id: Option<i64>,
    nome: String,
    email: String,
}

impl Entity for Usuario {
    type Key = i64;

    const NAME: &'static str = "Usuario";
    const TABLE: &'static str = "usuarios";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", SqlType::Integer)
            .primary_key()
            .auto_increment(),
        ColumnDef::new("nome", SqlType::Text),
        ColumnDef::new("email", SqlType::Text).unique(),
    ];

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn write_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("nome", Value::Text(self.nome.clone())),
            ("email", Value::Text(self.email.clone())),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            nome: row.get("nome")?,
            email: row.get("email")?,
        })
    }
}

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("DB_NEXUS_LOG_DIR") {
        if let Err(err) = db_nexus::init_logging(db_nexus::default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    println!("db_nexus version={}", db_nexus::core_version());

    match run(&url) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("db_nexus error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(url: &str) -> db_nexus::Result<()> {
    let manager = SessionManager::initialize(url, SessionOptions::default())?;
    manager.register::<Usuario>()?;
    let created = manager.create_all_tables()?;
    println!("db_nexus target={} created={created:?}", manager.target());

    let usuarios = Repository::<Usuario>::new();
    let id = manager.with_session(|session| {
        usuarios.add(
            session,
            &Usuario {
                id: None,
                nome: "Ana".to_string(),
                email: format!("ana+{}@example.com", std::process::id()),
            },
        )
    })?;
    info!("event=cli_smoke module=cli status=ok step=add id={id}");

    let loaded = manager.with_session(|session| {
        usuarios.update(
            session,
            &id,
            Changes::new().set("nome", "Ana Souza".to_string()),
        )?;
        usuarios.get_by_id(session, &id)
    })?;
    println!("db_nexus get id={id} nome={} email={}", loaded.nome, loaded.email);

    let total = manager.with_session(|session| usuarios.get_all(session).map(|all| all.len()))?;
    println!("db_nexus list count={total}");

    manager.with_session(|session| usuarios.delete(session, &id))?;
    let gone = manager
        .with_session(|session| usuarios.get_by_id(session, &id))
        .err()
        .is_some_and(|err| err.is_not_found());
    println!("db_nexus delete id={id} not_found_after={gone}");

    Ok(())
}
