use std::collections::BTreeSet;
use std::fmt;

use super::{Args, ManagerDefinition, Operation, Outcome, Registry, Terminal};
use crate::config::{GlobalPrecedence, ResolverConfig};
use crate::db::{col, Query, NATIVE_OPERATIONS};
use crate::error::{Error, Result};
use crate::models::{EntityType, Value};

/// A primitive of the engine's own query interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOperation {
    Filter,
    FilterBy,
    OrderBy,
    Limit,
    Offset,
    Join,
    Distinct,
    All,
    First,
    One,
    Count,
    Exists,
}

impl NativeOperation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "filter" => Some(Self::Filter),
            "filter_by" => Some(Self::FilterBy),
            "order_by" => Some(Self::OrderBy),
            "limit" => Some(Self::Limit),
            "offset" => Some(Self::Offset),
            "join" => Some(Self::Join),
            "distinct" => Some(Self::Distinct),
            "all" => Some(Self::All),
            "first" => Some(Self::First),
            "one" => Some(Self::One),
            "count" => Some(Self::Count),
            "exists" => Some(Self::Exists),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::FilterBy => "filter_by",
            Self::OrderBy => "order_by",
            Self::Limit => "limit",
            Self::Offset => "offset",
            Self::Join => "join",
            Self::Distinct => "distinct",
            Self::All => "all",
            Self::First => "first",
            Self::One => "one",
            Self::Count => "count",
            Self::Exists => "exists",
        }
    }

    /// Run the primitive with arguments given by name-based dispatch.
    ///
    /// - `filter(criterion...)`
    /// - `filter_by(column=value...)` as keyword arguments
    /// - `order_by(column...)`, a leading `-` sorts descending
    /// - `limit(n)`, `offset(n)`
    /// - `join(entity, criterion)`
    pub fn apply<'s>(&self, query: Query<'s>, args: &Args) -> Result<Outcome<'s>> {
        Ok(match self {
            Self::Filter => {
                let mut next = query;
                for index in 0..args.len() {
                    next = next.filter(args.criterion(index)?.clone());
                }
                Outcome::Refined(next)
            }
            Self::FilterBy => {
                let mut next = query;
                for (column, value) in args.keywords() {
                    next = next.filter_by(column, value.clone());
                }
                Outcome::Refined(next)
            }
            Self::OrderBy => {
                let mut next = query;
                for index in 0..args.len() {
                    let term = args.text(index)?;
                    next = match term.strip_prefix('-') {
                        Some(column) => next.order_by(col(column).desc()),
                        None => next.order_by(col(term).asc()),
                    };
                }
                Outcome::Refined(next)
            }
            Self::Limit => Outcome::Refined(query.limit(non_negative(args, 0)?)),
            Self::Offset => Outcome::Refined(query.offset(non_negative(args, 0)?)),
            Self::Join => {
                Outcome::Refined(query.join(args.entity(0)?, args.criterion(1)?.clone()))
            }
            Self::Distinct => Outcome::Refined(query.distinct()),
            Self::All => Terminal::Rows(query.all()?).into(),
            Self::First => Terminal::Row(query.first()?).into(),
            Self::One => Terminal::Row(Some(query.one()?)).into(),
            Self::Count => Terminal::Count(query.count()?).into(),
            Self::Exists => Terminal::Scalar(Value::Bool(query.exists()?)).into(),
        })
    }
}

fn non_negative(args: &Args, index: usize) -> Result<u64> {
    u64::try_from(args.int(index)?).map_err(|_| Error::Argument {
        position: index.to_string(),
        expected: "a non-negative integer",
    })
}

/// What an operation name resolved to.
#[derive(Clone, Copy)]
pub enum Resolution<'a> {
    Native(NativeOperation),
    TypeBound {
        /// Lineage level whose manager defines the operation.
        entity: &'static EntityType,
        manager: &'a ManagerDefinition,
        operation: &'a Operation,
    },
    Global {
        manager: &'a ManagerDefinition,
        operation: &'a Operation,
    },
}

impl Resolution<'_> {
    /// Short label for logs: `native`, `type_bound` or `global`.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Native(_) => "native",
            Self::TypeBound { .. } => "type_bound",
            Self::Global { .. } => "global",
        }
    }

    pub fn manager_name(&self) -> Option<&str> {
        match self {
            Self::Native(_) => None,
            Self::TypeBound { manager, .. } | Self::Global { manager, .. } => Some(manager.name()),
        }
    }

    /// Invoke the resolved operation on `query`.
    pub fn invoke<'s>(&self, query: Query<'s>, args: &Args) -> Result<Outcome<'s>> {
        match self {
            Self::Native(native) => native.apply(query, args),
            Self::TypeBound { operation, .. } | Self::Global { operation, .. } => {
                operation(query, args)
            }
        }
    }
}

impl fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(native) => f.debug_tuple("Native").field(native).finish(),
            Self::TypeBound {
                entity, manager, ..
            } => f
                .debug_struct("TypeBound")
                .field("entity", &entity.name)
                .field("manager", &manager.name())
                .finish(),
            Self::Global { manager, .. } => f
                .debug_struct("Global")
                .field("manager", &manager.name())
                .finish(),
        }
    }
}

/// Maps an operation name on a query to the implementation that handles it.
pub struct Resolver {
    registry: Registry,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(registry: Registry) -> Self {
        Self::with_config(registry, ResolverConfig::default())
    }

    pub fn with_config(registry: Registry, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `name` for a query whose primary target is `entity`.
    ///
    /// Native primitives always win. Type-bound operations are then looked
    /// up along `entity`'s lineage, and `global` (the session's definition)
    /// is consulted last, unless configured with
    /// [`GlobalPrecedence::GlobalFirst`].
    pub fn resolve<'a>(
        &'a self,
        entity: &'static EntityType,
        global: Option<&'a ManagerDefinition>,
        name: &str,
    ) -> Result<Resolution<'a>> {
        if let Some(native) = NativeOperation::from_name(name) {
            return Ok(Resolution::Native(native));
        }

        let type_bound = || {
            self.registry
                .lookup(entity, name)
                .map(|found| Resolution::TypeBound {
                    entity: found.entity,
                    manager: found.manager,
                    operation: found.operation,
                })
        };
        let session_global = || {
            global.and_then(|manager| {
                manager
                    .get(name)
                    .map(|operation| Resolution::Global { manager, operation })
            })
        };

        let resolved = match self.config.global_precedence {
            GlobalPrecedence::TypeBoundFirst => type_bound().or_else(session_global),
            GlobalPrecedence::GlobalFirst => session_global().or_else(type_bound),
        };

        match resolved {
            Some(resolution) => {
                tracing::trace!(
                    operation = name,
                    target = entity.name,
                    source = resolution.source(),
                    "resolved operation"
                );
                Ok(resolution)
            }
            None => Err(Error::unknown_operation(name, entity.name)),
        }
    }

    /// Every name that resolves for `entity`: native, type-bound and global.
    pub fn available(
        &self,
        entity: &'static EntityType,
        global: Option<&ManagerDefinition>,
    ) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = NATIVE_OPERATIONS.iter().map(|n| n.to_string()).collect();
        names.extend(self.registry.operation_names(entity));
        if let Some(manager) = global {
            names.extend(manager.names().map(str::to_string));
        }
        names
    }
}
