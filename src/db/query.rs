use std::collections::BTreeMap;

use rusqlite::params_from_iter;

use super::expr::{check_identifier, Column, Criterion, Ordering};
use super::Session;
use crate::error::{Error, Result};
use crate::models::{ColumnDef, EntityType, Row, Value};

/// Names of the engine's own query primitives.
pub const NATIVE_OPERATIONS: &[&str] = &[
    "filter", "filter_by", "order_by", "limit", "offset", "join", "distinct", "all", "first",
    "one", "count", "exists",
];

/// An inner join onto a secondary entity.
#[derive(Debug, Clone)]
pub struct Join {
    pub entity: &'static EntityType,
    pub on: Criterion,
}

/// An immutable query against a primary entity.
///
/// Every refining method returns a new `Query`; the receiver is left as it
/// was. Terminal methods (`all`, `first`, `one`, `count`, `exists`) run the
/// query on the owning [`Session`].
#[derive(Debug, Clone)]
pub struct Query<'s> {
    session: &'s Session,
    primary: &'static EntityType,
    joins: Vec<Join>,
    criteria: Vec<Criterion>,
    order: Vec<Ordering>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl<'s> Query<'s> {
    pub(crate) fn new(session: &'s Session, primary: &'static EntityType) -> Self {
        Self {
            session,
            primary,
            joins: Vec::new(),
            criteria: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// The entity whose rows this query loads.
    pub fn primary(&self) -> &'static EntityType {
        self.primary
    }

    /// The primary entity followed by joined entities, in join order.
    pub fn targets(&self) -> Vec<&'static EntityType> {
        std::iter::once(self.primary)
            .chain(self.joins.iter().map(|join| join.entity))
            .collect()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    // ============================================================
    // Refining
    // ============================================================

    pub fn filter(&self, criterion: Criterion) -> Self {
        let mut next = self.clone();
        next.criteria.push(criterion);
        next
    }

    /// Equality filter on a column of the primary entity.
    pub fn filter_by(&self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(self.primary.col(column).eq(value))
    }

    pub fn order_by(&self, ordering: impl Into<Ordering>) -> Self {
        let mut next = self.clone();
        next.order.push(ordering.into());
        next
    }

    pub fn limit(&self, limit: u64) -> Self {
        let mut next = self.clone();
        next.limit = Some(limit);
        next
    }

    pub fn offset(&self, offset: u64) -> Self {
        let mut next = self.clone();
        next.offset = Some(offset);
        next
    }

    pub fn join(&self, entity: &'static EntityType, on: Criterion) -> Self {
        let mut next = self.clone();
        next.joins.push(Join { entity, on });
        next
    }

    pub fn distinct(&self) -> Self {
        let mut next = self.clone();
        next.distinct = true;
        next
    }

    // ============================================================
    // Executing
    // ============================================================

    pub fn all(&self) -> Result<Vec<Row>> {
        let (sql, params) = self.select_sql()?;
        let columns = self.selected_columns();
        let schema = self.session.database().schema();
        let table = self.primary.table;

        let conn = self.session.database().conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut loaded = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let mut values = BTreeMap::new();
            for (i, column) in columns.iter().enumerate() {
                values.insert(
                    column.name.to_string(),
                    Value::from_sql(row.get_ref(i + 1)?, column.ty),
                );
            }

            let mut entity = self.primary.name;
            if let Some(discriminator) = self.primary.discriminator {
                let identity: String = row.get(columns.len() + 1)?;
                if let Some(found) = schema.entity_for_identity(table, &identity) {
                    entity = found.name;
                    // Columns of sibling subclasses are not part of this row.
                    values.retain(|name, _| found.column(name).is_some());
                }
                values.insert(discriminator.column.to_string(), Value::Text(identity));
            }

            loaded.push(Row {
                entity,
                id,
                values,
            });
        }

        tracing::debug!(entity = self.primary.name, rows = loaded.len(), "query executed");
        Ok(loaded)
    }

    pub fn first(&self) -> Result<Option<Row>> {
        Ok(self.limit(1).all()?.into_iter().next())
    }

    /// Exactly one row, or [`Error::NoResult`] / [`Error::MultipleResults`].
    /// A limit already set on the query is honoured.
    pub fn one(&self) -> Result<Row> {
        let mut rows = self
            .limit(self.limit.map_or(2, |limit| limit.min(2)))
            .all()?
            .into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row),
            (None, _) => Err(Error::NoResult),
            (Some(_), Some(_)) => Err(Error::MultipleResults),
        }
    }

    pub fn count(&self) -> Result<i64> {
        let (sql, params) = self.select_sql()?;
        let conn = self.session.database().conn();
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM ({}) AS counted", sql),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.first()?.is_some())
    }

    // ============================================================
    // SQL
    // ============================================================

    fn selected_columns(&self) -> Vec<&'static ColumnDef> {
        let schema = self.session.database().schema();
        schema
            .table_columns(self.primary.table)
            .into_iter()
            .filter(|column| Some(column.name) != self.primary.discriminator.map(|d| d.column))
            .collect()
    }

    /// Tables named by criteria or orderings that are neither the primary
    /// table nor joined; they are added to the FROM list.
    fn implicit_tables(&self) -> Vec<&'static str> {
        let mut tables = Vec::new();
        for criterion in &self.criteria {
            criterion.tables(&mut tables);
        }
        for ordering in &self.order {
            if let Some(table) = ordering.column.table() {
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }
        tables.retain(|table| {
            *table != self.primary.table
                && !self.joins.iter().any(|join| join.entity.table == *table)
        });
        tables
    }

    fn select_sql(&self) -> Result<(String, Vec<Value>)> {
        let table = self.primary.table;
        let mut params = Vec::new();

        let mut select = vec![Column::qualified(table, "id").to_sql(table)?];
        for column in self.selected_columns() {
            select.push(Column::qualified(table, column.name).to_sql(table)?);
        }
        if let Some(discriminator) = self.primary.discriminator {
            select.push(Column::qualified(table, discriminator.column).to_sql(table)?);
        }

        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            select.join(", "),
            check_identifier(table)?
        );

        let mut joined = vec![table];
        for join in &self.joins {
            // Tables are not aliased, so each may appear once in the FROM list.
            if joined.contains(&join.entity.table) {
                return Err(Error::TableAlreadyJoined {
                    entity: join.entity.name.to_string(),
                    table: join.entity.table.to_string(),
                });
            }
            joined.push(join.entity.table);
            let on = join.on.to_sql(table, &mut params)?;
            sql.push_str(&format!(
                " JOIN {} ON {}",
                check_identifier(join.entity.table)?,
                on
            ));
        }
        for implicit in self.implicit_tables() {
            sql.push_str(&format!(" CROSS JOIN {}", check_identifier(implicit)?));
        }

        let mut conditions = Vec::new();
        if let Some(discriminator) = self.primary.discriminator {
            let identities = self.session.database().schema().identities_for(self.primary);
            let polymorphic = Column::qualified(table, discriminator.column).in_(identities);
            conditions.push(polymorphic.to_sql(table, &mut params)?);
        }
        for criterion in &self.criteria {
            conditions.push(format!("({})", criterion.to_sql(table, &mut params)?));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order.is_empty() {
            let terms = self
                .order
                .iter()
                .map(|ordering| ordering.to_sql(table))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        } else {
            sql.push_str(&format!(" ORDER BY {}.id", table));
        }

        if self.limit.is_some() || self.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(self.limit.map_or(-1, |n| n as i64)));
            params.push(Value::Integer(self.offset.unwrap_or(0) as i64));
        }

        Ok((sql, params))
    }
}
