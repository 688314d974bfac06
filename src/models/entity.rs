use std::fmt;

use crate::db::Column;

/// Storage type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// A column declared by an entity. The `id` primary key is implicit.
#[derive(Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    /// Table whose `id` this column references.
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            references: None,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn references(self, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..self
        }
    }
}

/// Single-table inheritance marker: rows of this entity carry `identity`
/// in `column`.
#[derive(Debug, Clone, Copy)]
pub struct Discriminator {
    pub column: &'static str,
    pub identity: &'static str,
}

/// A mapped entity declaration.
///
/// Entities are declared as statics so that inheritance can be expressed as a
/// `&'static` link to the parent:
///
/// ```
/// use managed_query::models::{ColumnDef, ColumnType, Discriminator, EntityType};
///
/// static ANIMAL: EntityType = EntityType {
///     name: "Animal",
///     table: "animals",
///     columns: &[ColumnDef::new("name", ColumnType::Text)],
///     parent: None,
///     discriminator: Some(Discriminator { column: "kind", identity: "animal" }),
/// };
///
/// static DOG: EntityType = EntityType {
///     name: "Dog",
///     table: "animals",
///     columns: &[ColumnDef::new("breed", ColumnType::Text)],
///     parent: Some(&ANIMAL),
///     discriminator: Some(Discriminator { column: "kind", identity: "dog" }),
/// };
///
/// let names: Vec<_> = DOG.lineage().map(|e| e.name).collect();
/// assert_eq!(names, ["Dog", "Animal"]);
/// ```
#[derive(Debug)]
pub struct EntityType {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
    pub parent: Option<&'static EntityType>,
    pub discriminator: Option<Discriminator>,
}

impl EntityType {
    /// This entity followed by its ancestors, most-derived first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static EntityType> {
        std::iter::successors(Some(self), |entity| entity.parent)
    }

    pub fn same_as(&self, other: &EntityType) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }

    /// True if `ancestor` is this entity or one of its ancestors.
    pub fn is_a(&'static self, ancestor: &EntityType) -> bool {
        self.lineage().any(|entity| entity.same_as(ancestor))
    }

    /// Columns visible on this entity, root ancestor's first.
    pub fn all_columns(&'static self) -> Vec<&'static ColumnDef> {
        let mut levels: Vec<_> = self.lineage().collect();
        levels.reverse();
        levels
            .into_iter()
            .flat_map(|entity| entity.columns.iter())
            .collect()
    }

    pub fn column(&'static self, name: &str) -> Option<&'static ColumnDef> {
        self.lineage()
            .flat_map(|entity| entity.columns.iter())
            .find(|column| column.name == name)
    }

    /// A column reference qualified with this entity's table.
    pub fn col(&self, name: &str) -> Column {
        Column::qualified(self.table, name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SHAPE: EntityType = EntityType {
        name: "Shape",
        table: "shapes",
        columns: &[ColumnDef::new("sides", ColumnType::Integer)],
        parent: None,
        discriminator: Some(Discriminator {
            column: "kind",
            identity: "shape",
        }),
    };

    static SQUARE: EntityType = EntityType {
        name: "Square",
        table: "shapes",
        columns: &[ColumnDef::new("edge", ColumnType::Real).nullable()],
        parent: Some(&SHAPE),
        discriminator: Some(Discriminator {
            column: "kind",
            identity: "square",
        }),
    };

    #[test]
    fn test_lineage_is_most_derived_first() {
        let names: Vec<_> = SQUARE.lineage().map(|e| e.name).collect();
        assert_eq!(names, vec!["Square", "Shape"]);
    }

    #[test]
    fn test_is_a_follows_ancestors_only() {
        assert!(SQUARE.is_a(&SHAPE));
        assert!(SQUARE.is_a(&SQUARE));
        assert!(!SHAPE.is_a(&SQUARE));
    }

    #[test]
    fn test_columns_include_inherited() {
        let names: Vec<_> = SQUARE.all_columns().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["sides", "edge"]);
        assert!(SQUARE.column("sides").is_some());
        assert!(SHAPE.column("edge").is_none());
    }
}
