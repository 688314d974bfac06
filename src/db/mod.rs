//! Reference query engine over SQLite.
//!
//! The manager layer only depends on the surface exposed here: a
//! [`Session`] with a `query(entity)` entry point, an immutable
//! copy-on-refine [`Query`] with native primitives, and entity inheritance
//! metadata from [`crate::models`].

mod expr;
mod query;
mod schema;

pub use expr::*;
pub use query::*;
pub use schema::{create_all, Schema};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params_from_iter, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EntityType, Value};
use expr::check_identifier;

#[derive(Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    schema: Arc<Schema>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, schema)
    }

    pub fn open_memory(schema: Schema) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, schema)
    }

    fn from_connection(conn: Connection, schema: Schema) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema: Arc::new(schema),
        })
    }

    /// Create the tables of every entity in the schema.
    pub fn create_all(&self) -> Result<()> {
        let conn = self.conn();
        schema::create_all(&conn, &self.schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn session(&self) -> Session {
        Session {
            id: Uuid::new_v4(),
            db: self.clone(),
        }
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database lock poisoned")
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            schema: self.schema.clone(),
        }
    }
}

/// A unit of work against a [`Database`]. Queries borrow their session.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    db: Database,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn query(&self, entity: &'static EntityType) -> Query<'_> {
        Query::new(self, entity)
    }

    /// Insert a row of `entity`, filling in its discriminator. Returns the new id.
    pub fn insert(&self, entity: &'static EntityType, values: &[(&str, Value)]) -> Result<i64> {
        schema::check_columns(entity, values.iter().map(|(name, _)| *name))?;

        let mut columns = Vec::with_capacity(values.len() + 1);
        let mut params = Vec::with_capacity(values.len() + 1);
        for (name, value) in values {
            columns.push(check_identifier(name)?.to_string());
            params.push(value.clone());
        }
        if let Some(discriminator) = entity.discriminator {
            columns.push(discriminator.column.to_string());
            params.push(Value::from(discriminator.identity));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", entity.table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                entity.table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };

        let conn = self.db.conn();
        conn.execute(&sql, params_from_iter(params.iter()))?;
        let id = conn.last_insert_rowid();
        tracing::debug!(entity = entity.name, id, session = %self.id, "row inserted");
        Ok(id)
    }
}
