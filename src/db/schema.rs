use rusqlite::Connection;

use super::expr::check_identifier;
use crate::error::{Error, Result};
use crate::models::{ColumnDef, ColumnType, EntityType};

/// The set of mapped entities known to a [`Database`](super::Database).
///
/// Adding an entity also adds its ancestors. Entities sharing a table form a
/// single-table hierarchy told apart by their discriminator column.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    entities: Vec<&'static EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: &'static EntityType) -> Self {
        self.add(entity);
        self
    }

    pub fn add(&mut self, entity: &'static EntityType) {
        let mut lineage: Vec<_> = entity.lineage().collect();
        lineage.reverse();
        for level in lineage {
            if !self.entities.iter().any(|known| known.same_as(level)) {
                self.entities.push(level);
            }
        }
    }

    pub fn entities(&self) -> &[&'static EntityType] {
        &self.entities
    }

    pub fn get(&self, name: &str) -> Option<&'static EntityType> {
        self.entities
            .iter()
            .copied()
            .find(|entity| entity.name.eq_ignore_ascii_case(name))
    }

    /// Like [`Schema::get`], failing with [`Error::UnknownEntity`].
    pub fn entity(&self, name: &str) -> Result<&'static EntityType> {
        self.get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.entities.iter().any(|known| known.same_as(entity))
    }

    /// Discriminator identities loaded by a query against `entity`: its own
    /// and those of every known subclass.
    pub fn identities_for(&self, entity: &'static EntityType) -> Vec<&'static str> {
        self.entities
            .iter()
            .filter(|known| known.is_a(entity))
            .filter_map(|known| known.discriminator.map(|d| d.identity))
            .collect()
    }

    /// The entity stored in `table` under discriminator `identity`.
    pub fn entity_for_identity(&self, table: &str, identity: &str) -> Option<&'static EntityType> {
        self.entities.iter().copied().find(|entity| {
            entity.table == table && entity.discriminator.is_some_and(|d| d.identity == identity)
        })
    }

    /// Union of the columns declared by every entity stored in `table`.
    pub fn table_columns(&self, table: &str) -> Vec<&'static ColumnDef> {
        let mut columns: Vec<&'static ColumnDef> = Vec::new();
        for entity in self.entities.iter().filter(|e| e.table == table) {
            for column in entity.columns {
                if !columns.iter().any(|known| known.name == column.name) {
                    columns.push(column);
                }
            }
        }
        columns
    }

    fn tables(&self) -> Vec<&'static str> {
        let mut tables: Vec<&'static str> = Vec::new();
        for entity in &self.entities {
            if !tables.contains(&entity.table) {
                tables.push(entity.table);
            }
        }
        tables
    }

    /// A table's DDL: declared columns of the hierarchy plus the discriminator.
    fn table_sql(&self, table: &str) -> Result<String> {
        let mut lines = vec!["id INTEGER PRIMARY KEY".to_string()];

        let hierarchy: Vec<_> = self.entities.iter().filter(|e| e.table == table).collect();
        for column in self.table_columns(table) {
            // Columns declared below the root are NULL for ancestor rows.
            let declared_on_root = hierarchy
                .iter()
                .any(|e| e.parent.is_none() && e.columns.iter().any(|c| c.name == column.name));
            let mut line = format!(
                "{} {}",
                check_identifier(column.name)?,
                column.ty.as_sql()
            );
            if !column.nullable && declared_on_root {
                line.push_str(" NOT NULL");
            }
            if column.ty == ColumnType::Boolean && !column.nullable && declared_on_root {
                line.push_str(" DEFAULT 0");
            }
            if let Some(target) = column.references {
                line.push_str(&format!(" REFERENCES {}(id)", check_identifier(target)?));
            }
            lines.push(line);
        }

        let discriminator = hierarchy.iter().find_map(|e| e.discriminator);
        if let Some(discriminator) = discriminator {
            if !lines
                .iter()
                .any(|line| line.starts_with(&format!("{} ", discriminator.column)))
            {
                lines.push(format!(
                    "{} TEXT NOT NULL",
                    check_identifier(discriminator.column)?
                ));
            }
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            check_identifier(table)?,
            lines.join(",\n    ")
        ))
    }
}

/// Create every table of `schema` that does not exist yet.
pub fn create_all(conn: &Connection, schema: &Schema) -> Result<()> {
    for table in schema.tables() {
        let sql = schema.table_sql(table)?;
        conn.execute_batch(&sql)?;
        tracing::info!("Ensured table {}", table);
    }
    Ok(())
}

/// Check that every column in `values` is declared on `entity` (or is `id`).
pub(crate) fn check_columns<'a>(
    entity: &'static EntityType,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for name in columns {
        if name != "id" && entity.column(name).is_none() {
            return Err(Error::UnknownColumn {
                entity: entity.name.to_string(),
                column: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Discriminator;

    static VEHICLE: EntityType = EntityType {
        name: "Vehicle",
        table: "vehicles",
        columns: &[
            ColumnDef::new("wheels", ColumnType::Integer),
            ColumnDef::new("electric", ColumnType::Boolean),
        ],
        parent: None,
        discriminator: Some(Discriminator {
            column: "kind",
            identity: "vehicle",
        }),
    };

    static TRUCK: EntityType = EntityType {
        name: "Truck",
        table: "vehicles",
        columns: &[ColumnDef::new("payload", ColumnType::Real)],
        parent: Some(&VEHICLE),
        discriminator: Some(Discriminator {
            column: "kind",
            identity: "truck",
        }),
    };

    fn table_count(conn: &Connection, name: &str) -> i32 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_adding_subclass_adds_ancestors() {
        let schema = Schema::new().with(&TRUCK);
        let names: Vec<_> = schema.entities().iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Vehicle", "Truck"]);
    }

    #[test]
    fn test_entity_lookup_ignores_case() {
        let schema = Schema::new().with(&TRUCK);
        assert_eq!(schema.entity("truck").unwrap().name, "Truck");
        assert!(matches!(schema.entity("Boat"), Err(Error::UnknownEntity(ref name)) if name == "Boat"));
    }

    #[test]
    fn test_identities_cover_subclasses() {
        let schema = Schema::new().with(&TRUCK);
        assert_eq!(schema.identities_for(&VEHICLE), vec!["vehicle", "truck"]);
        assert_eq!(schema.identities_for(&TRUCK), vec!["truck"]);
        assert_eq!(
            schema.entity_for_identity("vehicles", "truck").map(|e| e.name),
            Some("Truck")
        );
    }

    #[test]
    fn test_create_all_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        create_all(&conn, &Schema::new().with(&TRUCK)).unwrap();
        assert_eq!(table_count(&conn, "vehicles"), 1);

        // Subclass columns stay nullable so parent rows can be stored.
        conn.execute(
            "INSERT INTO vehicles (wheels, electric, kind) VALUES (4, 0, 'vehicle')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_create_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = Schema::new().with(&TRUCK);
        create_all(&conn, &schema).unwrap();
        create_all(&conn, &schema).unwrap();
        assert_eq!(table_count(&conn, "vehicles"), 1);
    }

    #[test]
    fn test_check_columns_rejects_undeclared() {
        assert!(check_columns(&TRUCK, ["wheels", "payload", "id"]).is_ok());
        let err = check_columns(&VEHICLE, ["payload"]).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }
}
