mod common;

use common::{file_url, register_all, Pedido, Produto, Usuario};
use db_nexus::{
    ColumnDef, Entity, EntityDef, Error, Repository, SchemaError, SessionManager, SessionOptions,
    SqlType,
};
use rusqlite::Connection;

fn table_sql(manager: &SessionManager, table: &str) -> String {
    let session = manager.get_session().unwrap();
    session
        .connection()
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn create_all_tables_twice_is_idempotent() {
    let manager = SessionManager::initialize("sqlite://", SessionOptions::default()).unwrap();
    register_all(&manager);

    let created = manager.create_all_tables().unwrap();
    assert_eq!(created, ["usuarios", "produtos", "pedidos"]);
    let before = table_sql(&manager, "usuarios");

    assert!(manager.create_all_tables().unwrap().is_empty());
    assert_eq!(table_sql(&manager, "usuarios"), before);
}

#[test]
fn tables_registered_later_are_created_on_next_call() {
    let manager = SessionManager::initialize("sqlite://", SessionOptions::default()).unwrap();
    manager.register::<Usuario>().unwrap();
    assert_eq!(manager.create_all_tables().unwrap(), ["usuarios"]);

    manager.register::<Produto>().unwrap();
    assert_eq!(manager.create_all_tables().unwrap(), ["produtos"]);
}

#[test]
fn schema_survives_reopening_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = file_url(&dir.path().join("app.db"));

    {
        let manager = SessionManager::initialize(&url, SessionOptions::default()).unwrap();
        register_all(&manager);
        manager.create_all_tables().unwrap();
        manager
            .with_session(|session| {
                Repository::<Usuario>::new().add(session, &Usuario::new("Ana", "ana@example.com"))
            })
            .unwrap();
    }

    let manager = SessionManager::initialize(&url, SessionOptions::default()).unwrap();
    register_all(&manager);
    assert!(manager.create_all_tables().unwrap().is_empty());

    let session = manager.get_session().unwrap();
    let ana = Repository::<Usuario>::new().get_by_id(&session, &1).unwrap();
    assert_eq!(ana.nome, "Ana");
}

#[test]
fn conflicting_existing_relation_is_a_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE usuarios (id INTEGER PRIMARY KEY, nome TEXT NOT NULL);")
        .unwrap();

    let manager = SessionManager::initialize(&file_url(&path), SessionOptions::default()).unwrap();
    manager.register::<Produto>().unwrap();
    manager.register::<Usuario>().unwrap();

    let err = manager.create_all_tables().unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(SchemaError::Conflict {
            table: "usuarios",
            ..
        })
    ));

    let session = manager.get_session().unwrap();
    let produtos: i64 = session
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'produtos';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(produtos, 0, "failed pass must not leave partial schema");
}

#[test]
fn registering_conflicting_definition_for_same_relation_fails() {
    struct OutroUsuario;

    impl Entity for OutroUsuario {
        type Key = String;

        const NAME: &'static str = "OutroUsuario";
        const TABLE: &'static str = "usuarios";
        const COLUMNS: &'static [ColumnDef] =
            &[ColumnDef::new("login", SqlType::Text).primary_key()];

        fn key(&self) -> Option<String> {
            None
        }

        fn write_values(&self) -> Vec<(&'static str, rusqlite::types::Value)> {
            Vec::new()
        }

        fn from_row(_row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self)
        }
    }

    let manager = SessionManager::initialize("sqlite://", SessionOptions::default()).unwrap();
    assert!(manager.register::<Usuario>().unwrap());
    assert!(!manager.register::<Usuario>().unwrap());

    let err = manager.register::<OutroUsuario>().unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(SchemaError::DuplicateRelation {
            table: "usuarios",
            existing: "Usuario"
        })
    ));
    assert_eq!(manager.registry().len(), 1);
}

#[test]
fn invalid_definition_is_rejected_at_registration() {
    const BROKEN: EntityDef = EntityDef {
        name: "Broken",
        table: "broken; DROP TABLE usuarios",
        columns: &[ColumnDef::new("id", SqlType::Integer).primary_key()],
    };

    let manager = SessionManager::initialize("sqlite://", SessionOptions::default()).unwrap();
    let err = manager.register_def(BROKEN).unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(SchemaError::InvalidDefinition {
            entity: "Broken",
            ..
        })
    ));
    assert!(manager.registry().is_empty());
}

#[test]
fn registry_lists_definitions_in_registration_order() {
    let manager = SessionManager::initialize("sqlite://", SessionOptions::default()).unwrap();
    manager.register::<Pedido>().unwrap();
    manager.register::<Usuario>().unwrap();

    let registry = manager.registry();
    let tables: Vec<_> = registry.entries().iter().map(|def| def.table).collect();
    assert_eq!(tables, ["pedidos", "usuarios"]);
    assert_eq!(
        registry.get("usuarios").and_then(|def| def.primary_key()).map(|c| c.name),
        Some("id")
    );
}
