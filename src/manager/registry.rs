use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{ManagedSession, ManagerDefinition, Operation};
use crate::error::{Error, Result};
use crate::models::EntityType;

/// Entity name used in errors about session-global definitions.
pub const GLOBAL_SCOPE: &str = "*";

/// A type-bound operation found by [`Registry::lookup`].
#[derive(Clone, Copy)]
pub struct Found<'a> {
    /// The lineage level whose definition matched.
    pub entity: &'static EntityType,
    pub manager: &'a ManagerDefinition,
    pub operation: &'a Operation,
}

/// Map key comparing entity declarations by address, so two entities that
/// happen to share a name keep separate managers.
#[derive(Clone, Copy)]
struct EntityKey(&'static EntityType);

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

/// Type-bound manager definitions, keyed by entity.
///
/// Built once at setup time, then handed to a [`Resolver`](super::Resolver).
#[derive(Default)]
pub struct Registry {
    managers: HashMap<EntityKey, Vec<Arc<ManagerDefinition>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `manager` to `entity`.
    ///
    /// Fails if `manager` repeats a name, or if another definition already
    /// registered for this same entity defines one of its names. Defining a
    /// name that an ancestor's manager also defines is an override and is
    /// allowed.
    pub fn register(&mut self, entity: &'static EntityType, manager: ManagerDefinition) -> Result<()> {
        if let Some(name) = manager.repeated_name() {
            return Err(duplicate(name, entity.name));
        }

        let existing = self.managers.entry(EntityKey(entity)).or_default();
        if let Some(name) = manager
            .names()
            .find(|name| existing.iter().any(|known| known.defines(name)))
        {
            return Err(duplicate(name, entity.name));
        }

        tracing::debug!(
            entity = entity.name,
            manager = manager.name(),
            operations = ?manager.names().collect::<Vec<_>>(),
            "registered manager"
        );
        existing.push(Arc::new(manager));
        Ok(())
    }

    /// Install `manager` as the session's global definition, replacing any
    /// previous one.
    pub fn register_global(&self, session: &mut ManagedSession, manager: ManagerDefinition) -> Result<()> {
        session.load_manager(manager)
    }

    /// First definition along `entity`'s lineage, most-derived first, that
    /// defines `name`.
    pub fn lookup(&self, entity: &'static EntityType, name: &str) -> Option<Found<'_>> {
        entity.lineage().find_map(|level| {
            self.managers.get(&EntityKey(level))?.iter().find_map(|manager| {
                manager.get(name).map(|operation| Found {
                    entity: level,
                    manager,
                    operation,
                })
            })
        })
    }

    pub fn lookup_global<'a>(&self, session: &'a ManagedSession, name: &str) -> Option<&'a Operation> {
        session.global_manager()?.get(name)
    }

    /// Definitions registered directly on `entity`, in registration order.
    pub fn managers_for(&self, entity: &'static EntityType) -> &[Arc<ManagerDefinition>] {
        self.managers
            .get(&EntityKey(entity))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every type-bound operation name visible from `entity`.
    pub fn operation_names(&self, entity: &'static EntityType) -> BTreeSet<String> {
        entity
            .lineage()
            .flat_map(|level| self.managers_for(level))
            .flat_map(|manager| manager.names().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.values().all(Vec::is_empty)
    }
}

pub(crate) fn duplicate(operation: &str, entity: &str) -> Error {
    Error::DuplicateOperation {
        operation: operation.to_string(),
        entity: entity.to_string(),
    }
}
