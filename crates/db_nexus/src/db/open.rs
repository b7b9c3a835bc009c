//! Connection bootstrap and pool construction.
//!
//! # Responsibility
//! - Probe the backend once before building the pool.
//! - Configure every pooled connection the same way.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys` and `busy_timeout` applied.
//! - File targets run in WAL mode: readers never wait for a writer, writers
//!   wait up to `busy_timeout` for each other.
//! - In-memory targets keep one anchor connection open for the engine
//!   lifetime, so the shared-cache database outlives idle pool periods.
//!   Table-lock conflicts there block until the holding session ends
//!   (`unlock_notify`); `busy_timeout` does not bound them.

use super::url::ConnectionTarget;
use crate::config::SessionOptions;
use crate::error::ConfigurationError;
use log::{debug, error, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::sync::Mutex;
use std::time::Instant;

pub(crate) type SqlitePool = Pool<SqliteConnectionManager>;

/// Process-wide backend handle owned by one `SessionManager`.
pub(crate) struct Engine {
    pub(crate) pool: SqlitePool,
    _anchor: Option<Mutex<Connection>>,
}

/// Opens the target and builds the connection pool.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub(crate) fn open_engine(
    target: &ConnectionTarget,
    options: &SessionOptions,
) -> Result<Engine, ConfigurationError> {
    let started_at = Instant::now();
    let mode = if target.is_memory() { "memory" } else { "file" };
    info!("event=db_open module=db status=start mode={mode} target={target}");

    let probe = match probe_backend(target, options) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_unreachable error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(ConfigurationError::Unreachable {
                target: target.to_string(),
                source: err,
            });
        }
    };

    let init_options = options.clone();
    let wal = !target.is_memory();
    let manager = SqliteConnectionManager::file(target.open_path())
        .with_flags(OpenFlags::default())
        .with_init(move |conn| configure_connection(conn, &init_options, wal));

    let pool = match Pool::builder()
        .max_size(options.pool_size)
        .connection_timeout(options.pool_timeout())
        .test_on_check_out(options.pre_ping)
        .build(manager)
    {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=pool_build_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    info!(
        "event=db_open module=db status=ok mode={mode} pool_size={} duration_ms={}",
        options.pool_size,
        started_at.elapsed().as_millis()
    );

    let anchor = target.is_memory().then(|| Mutex::new(probe));
    Ok(Engine {
        pool,
        _anchor: anchor,
    })
}

fn probe_backend(
    target: &ConnectionTarget,
    options: &SessionOptions,
) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open_with_flags(target.open_path(), OpenFlags::default())?;
    configure_connection(&mut conn, options, !target.is_memory())?;
    // Opening is lazy; reading the header surfaces "file is not a database".
    conn.query_row("PRAGMA schema_version;", [], |row| row.get::<_, i64>(0))?;
    Ok(conn)
}

fn configure_connection(
    conn: &mut Connection,
    options: &SessionOptions,
    wal: bool,
) -> rusqlite::Result<()> {
    let foreign_keys = if options.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(options.busy_timeout())?;
    if wal {
        // Returns the resulting mode as a row.
        conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get::<_, String>(0))?;
    }
    if options.echo {
        conn.trace(Some(echo_statement));
    }
    Ok(())
}

fn echo_statement(sql: &str) {
    debug!(target: "db_nexus::echo", "{sql}");
}

#[cfg(test)]
mod tests {
    use super::open_engine;
    use crate::config::SessionOptions;
    use crate::db::url::ConnectionTarget;
    use crate::error::ConfigurationError;

    #[test]
    fn pooled_memory_connections_share_one_database() {
        let target = ConnectionTarget::parse("sqlite://").unwrap();
        let engine = open_engine(&target, &SessionOptions::default().with_pool_size(2)).unwrap();

        let first = engine.pool.get().unwrap();
        let second = engine.pool.get().unwrap();
        first
            .execute_batch("CREATE TABLE probe (id INTEGER PRIMARY KEY);")
            .unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM probe;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn pooled_connections_enable_foreign_keys() {
        let target = ConnectionTarget::parse("sqlite://").unwrap();
        let engine = open_engine(&target, &SessionOptions::default()).unwrap();

        let conn = engine.pool.get().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn file_connections_use_wal_and_memory_connections_do_not() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConnectionTarget::File(dir.path().join("app.db"));
        let engine = open_engine(&file, &SessionOptions::default()).unwrap();
        let mode: String = engine
            .pool
            .get()
            .unwrap()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");

        let memory = ConnectionTarget::parse("sqlite://").unwrap();
        let engine = open_engine(&memory, &SessionOptions::default()).unwrap();
        let mode: String = engine
            .pool
            .get()
            .unwrap()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "memory");
    }

    #[test]
    fn missing_parent_directory_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("app.db");
        let target = ConnectionTarget::File(path);

        let err = open_engine(&target, &SessionOptions::default())
            .err()
            .expect("missing directory must fail");
        assert!(matches!(err, ConfigurationError::Unreachable { .. }));
    }
}
