#![allow(dead_code)]

use db_nexus::{ColumnDef, Entity, SessionManager, SessionOptions, SqlType};
use rusqlite::types::Value;
use rusqlite::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usuario {
    pub id: Option<i64>,
    pub nome: String,
    pub email: String,
}

impl Usuario {
    pub fn new(nome: &str, email: &str) -> Self {
        Self {
            id: None,
            nome: nome.to_string(),
            email: email.to_string(),
        }
    }
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

/// Caller-assigned text key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produto {
    pub sku: String,
    pub nome: String,
    pub preco_centavos: i64,
}

impl Entity for Produto {
    type Key = String;

    const NAME: &'static str = "Produto";
    const TABLE: &'static str = "produtos";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("sku", SqlType::Text).primary_key(),
        ColumnDef::new("nome", SqlType::Text),
        ColumnDef::new("preco_centavos", SqlType::Integer),
    ];

    fn key(&self) -> Option<String> {
        Some(self.sku.clone())
    }

    fn write_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("nome", Value::Text(self.nome.clone())),
            ("preco_centavos", Value::Integer(self.preco_centavos)),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sku: row.get("sku")?,
            nome: row.get("nome")?,
            preco_centavos: row.get("preco_centavos")?,
        })
    }
}

/// References `usuarios`, used to trigger foreign-key failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pedido {
    pub id: Option<i64>,
    pub usuario_id: i64,
    pub descricao: Option<String>,
}

impl Entity for Pedido {
    type Key = i64;

    const NAME: &'static str = "Pedido";
    const TABLE: &'static str = "pedidos";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::new("id", SqlType::Integer)
            .primary_key()
            .auto_increment(),
        ColumnDef::new("usuario_id", SqlType::Integer).references("usuarios", "id"),
        ColumnDef::new("descricao", SqlType::Text).nullable(),
    ];

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn write_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("usuario_id", Value::Integer(self.usuario_id)),
            ("descricao", Value::from(self.descricao.clone())),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            usuario_id: row.get("usuario_id")?,
            descricao: row.get("descricao")?,
        })
    }
}

pub fn memory_manager() -> SessionManager {
    memory_manager_with(SessionOptions::default())
}

/// In-memory manager with every test entity registered and created.
pub fn memory_manager_with(options: SessionOptions) -> SessionManager {
    let manager = SessionManager::initialize("sqlite://", options).unwrap();
    register_all(&manager);
    manager.create_all_tables().unwrap();
    manager
}

pub fn register_all(manager: &SessionManager) {
    manager.register::<Usuario>().unwrap();
    manager.register::<Produto>().unwrap();
    manager.register::<Pedido>().unwrap();
}

pub fn file_url(path: &std::path::Path) -> String {
    format!("sqlite:///{}", path.display())
}
