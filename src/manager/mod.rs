//! User-defined query operations ("managers") and their dispatch.
//!
//! # Core Concepts
//!
//! - [`ManagerDefinition`]: an immutable, named bundle of operations.
//! - [`Registry`]: type-bound definitions keyed by entity. Lookups walk the
//!   entity's ancestors, most-derived first.
//! - [`Resolver`]: decides what an operation name means for a query: native
//!   primitive, type-bound operation, or session-global operation.
//! - [`ManagedQuery`]: chainable wrapper around an engine [`Query`] that
//!   routes named calls through the resolver and re-wraps refined queries.
//! - [`ManagedSession`]: engine session plus at most one session-global
//!   definition.
//!
//! # Concurrency
//!
//! Registration takes `&mut Registry`; once the registry is moved into a
//! [`Resolver`] it is shared read-only, so lookups may run from any thread.
//! A [`ManagedQuery`] borrows its session, so replacing the session-global
//! definition while queries of that session are alive does not compile.

mod args;
mod proxy;
mod registry;
mod resolve;
mod session;

pub use args::*;
pub use proxy::*;
pub use registry::*;
pub use resolve::*;
pub use session::*;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::db::Query;
use crate::error::Result;
use crate::models::{Row, Value};

/// A user-supplied operation: takes its own copy of the current query plus
/// the call's arguments and returns a refined query or a terminal value.
pub type Operation = Arc<dyn for<'s> Fn(Query<'s>, &Args) -> Result<Outcome<'s>> + Send + Sync>;

/// What an operation produced.
#[derive(Debug)]
pub enum Outcome<'s> {
    /// A further refinable query; the proxy wraps it again.
    Refined(Query<'s>),
    /// An already executed result; returned to the caller as is.
    Terminal(Terminal),
}

impl<'s> From<Query<'s>> for Outcome<'s> {
    fn from(query: Query<'s>) -> Self {
        Self::Refined(query)
    }
}

impl From<Terminal> for Outcome<'_> {
    fn from(terminal: Terminal) -> Self {
        Self::Terminal(terminal)
    }
}

impl From<Vec<Row>> for Outcome<'_> {
    fn from(rows: Vec<Row>) -> Self {
        Self::Terminal(Terminal::Rows(rows))
    }
}

impl From<Option<Row>> for Outcome<'_> {
    fn from(row: Option<Row>) -> Self {
        Self::Terminal(Terminal::Row(row))
    }
}

/// Result of executing a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Terminal {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Count(i64),
    Scalar(Value),
}

impl Terminal {
    /// Name used as the target of errors raised when chaining off a terminal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Row(_) => "row",
            Self::Count(_) => "count",
            Self::Scalar(_) => "scalar",
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<Option<Row>> {
        match self {
            Self::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<i64> {
        match self {
            Self::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// A named bundle of operations, bound to an entity through
/// [`Registry::register`] or to a session through
/// [`ManagedSession::load_manager`].
///
/// ```
/// use managed_query::db::col;
/// use managed_query::manager::ManagerDefinition;
///
/// let manager = ManagerDefinition::new("PersonQueryManager")
///     .operation("older_than", |query, args| {
///         Ok(query.filter(col("age").gt(args.int(0)?)).into())
///     });
/// assert!(manager.get("older_than").is_some());
/// ```
#[derive(Clone)]
pub struct ManagerDefinition {
    name: String,
    operations: Vec<(String, Operation)>,
}

impl ManagerDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn operation<F>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: for<'s> Fn(Query<'s>, &Args) -> Result<Outcome<'s>> + Send + Sync + 'static,
    {
        self.operations.push((name.into(), Arc::new(operation)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, operation)| operation)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Operation names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|(name, _)| name.as_str())
    }

    /// First operation name declared more than once, if any.
    pub(crate) fn repeated_name(&self) -> Option<&str> {
        self.operations.iter().enumerate().find_map(|(i, (name, _))| {
            self.operations[..i]
                .iter()
                .any(|(earlier, _)| earlier == name)
                .then_some(name.as_str())
        })
    }
}

impl fmt::Debug for ManagerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerDefinition")
            .field("name", &self.name)
            .field("operations", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
