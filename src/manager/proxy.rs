use std::collections::BTreeSet;

use super::{Args, ManagedSession, Outcome, Resolution, Terminal};
use crate::db::{Criterion, Ordering, Query};
use crate::error::{Error, Result};
use crate::models::{EntityType, Row, Value};

/// A chainable query that also answers to the operations of its session's
/// managers.
///
/// Native primitives are available both as typed methods and by name
/// through [`ManagedQuery::call`]; either way the result stays managed.
#[derive(Debug, Clone)]
pub struct ManagedQuery<'s> {
    query: Query<'s>,
    owner: &'s ManagedSession,
}

impl<'s> ManagedQuery<'s> {
    pub(crate) fn new(query: Query<'s>, owner: &'s ManagedSession) -> Self {
        Self { query, owner }
    }

    fn rewrap(&self, query: Query<'s>) -> Self {
        Self::new(query, self.owner)
    }

    pub fn query(&self) -> &Query<'s> {
        &self.query
    }

    pub fn into_query(self) -> Query<'s> {
        self.query
    }

    /// The entity operation names are resolved against.
    pub fn target(&self) -> &'static EntityType {
        self.query.primary()
    }

    pub fn resolve(&self, name: &str) -> Result<Resolution<'s>> {
        self.owner
            .resolver()
            .resolve(self.target(), self.owner.global_manager(), name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Every operation name callable on this query.
    pub fn operations(&self) -> BTreeSet<String> {
        self.owner
            .resolver()
            .available(self.target(), self.owner.global_manager())
    }

    /// Call an operation by name.
    ///
    /// A refined query comes back wrapped as [`Step::Query`]; an executed
    /// result comes back as [`Step::Terminal`]. Errors raised by the
    /// operation are returned unchanged.
    pub fn call(&self, name: &str, args: Args) -> Result<Step<'s>> {
        let resolution = self.resolve(name)?;
        tracing::debug!(
            operation = name,
            target = self.target().name,
            source = resolution.source(),
            manager = resolution.manager_name(),
            session = %self.owner.id(),
            "calling operation"
        );

        Ok(match resolution.invoke(self.query.clone(), &args)? {
            Outcome::Refined(query) => Step::Query(self.rewrap(query)),
            Outcome::Terminal(terminal) => Step::Terminal(terminal),
        })
    }

    // ============================================================
    // Native primitives
    // ============================================================

    pub fn filter(&self, criterion: Criterion) -> Self {
        self.rewrap(self.query.filter(criterion))
    }

    pub fn filter_by(&self, column: &str, value: impl Into<Value>) -> Self {
        self.rewrap(self.query.filter_by(column, value))
    }

    pub fn order_by(&self, ordering: impl Into<Ordering>) -> Self {
        self.rewrap(self.query.order_by(ordering))
    }

    pub fn limit(&self, limit: u64) -> Self {
        self.rewrap(self.query.limit(limit))
    }

    pub fn offset(&self, offset: u64) -> Self {
        self.rewrap(self.query.offset(offset))
    }

    pub fn join(&self, entity: &'static EntityType, on: Criterion) -> Self {
        self.rewrap(self.query.join(entity, on))
    }

    pub fn distinct(&self) -> Self {
        self.rewrap(self.query.distinct())
    }

    pub fn all(&self) -> Result<Vec<Row>> {
        self.query.all()
    }

    pub fn first(&self) -> Result<Option<Row>> {
        self.query.first()
    }

    pub fn one(&self) -> Result<Row> {
        self.query.one()
    }

    pub fn count(&self) -> Result<i64> {
        self.query.count()
    }

    pub fn exists(&self) -> Result<bool> {
        self.query.exists()
    }
}

/// Result of a named call: a query to keep chaining on, or a terminal value.
#[derive(Debug, Clone)]
pub enum Step<'s> {
    Query(ManagedQuery<'s>),
    Terminal(Terminal),
}

impl<'s> Step<'s> {
    /// Continue the chain. A terminal value has no operations, so calling
    /// anything on it fails with [`Error::UnknownOperation`] naming the
    /// terminal's kind.
    pub fn call(self, name: &str, args: Args) -> Result<Step<'s>> {
        match self {
            Self::Query(query) => query.call(name, args),
            Self::Terminal(terminal) => Err(Error::unknown_operation(name, terminal.kind())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    pub fn into_query(self) -> Result<ManagedQuery<'s>> {
        match self {
            Self::Query(query) => Ok(query),
            Self::Terminal(terminal) => Err(Error::NotQueryable(terminal.kind())),
        }
    }

    pub fn into_terminal(self) -> Option<Terminal> {
        match self {
            Self::Terminal(terminal) => Some(terminal),
            Self::Query(_) => None,
        }
    }

    /// Rows of the chain: executes a pending query, or unpacks a terminal
    /// holding rows.
    pub fn rows(self) -> Result<Vec<Row>> {
        match self {
            Self::Query(query) => query.all(),
            Self::Terminal(Terminal::Rows(rows)) => Ok(rows),
            Self::Terminal(Terminal::Row(row)) => Ok(row.into_iter().collect()),
            Self::Terminal(terminal) => Err(Error::NotQueryable(terminal.kind())),
        }
    }
}
