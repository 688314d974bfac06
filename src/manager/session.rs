use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::registry::{duplicate, GLOBAL_SCOPE};
use super::{ManagedQuery, ManagerDefinition, Resolver};
use crate::db::{Database, Query, Session};
use crate::error::Result;
use crate::models::EntityType;

/// An engine [`Session`] whose queries resolve manager operations.
///
/// Holds at most one session-global [`ManagerDefinition`]. It applies to
/// queries of every entity issued through this session and goes away with
/// the session; other sessions on the same database never see it.
pub struct ManagedSession {
    session: Session,
    resolver: Arc<Resolver>,
    global: Option<Arc<ManagerDefinition>>,
}

impl ManagedSession {
    pub fn new(session: Session, resolver: Arc<Resolver>) -> Self {
        Self {
            session,
            resolver,
            global: None,
        }
    }

    /// Open a new session on `db` resolving through `resolver`.
    pub fn open(db: &Database, resolver: Arc<Resolver>) -> Self {
        Self::new(db.session(), resolver)
    }

    pub fn id(&self) -> Uuid {
        self.session.id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Install the session-global manager. A previous one is replaced.
    pub fn load_manager(&mut self, manager: ManagerDefinition) -> Result<()> {
        if let Some(name) = manager.repeated_name() {
            return Err(duplicate(name, GLOBAL_SCOPE));
        }

        if let Some(previous) = &self.global {
            tracing::warn!(
                session = %self.id(),
                previous = previous.name(),
                manager = manager.name(),
                "replacing session manager"
            );
        } else {
            tracing::debug!(session = %self.id(), manager = manager.name(), "loaded session manager");
        }
        self.global = Some(Arc::new(manager));
        Ok(())
    }

    pub fn unload_manager(&mut self) -> Option<Arc<ManagerDefinition>> {
        self.global.take()
    }

    pub fn global_manager(&self) -> Option<&ManagerDefinition> {
        self.global.as_deref()
    }

    pub fn query(&self, entity: &'static EntityType) -> ManagedQuery<'_> {
        ManagedQuery::new(self.session.query(entity), self)
    }

    /// The plain engine query, without manager resolution.
    pub fn query_native(&self, entity: &'static EntityType) -> Query<'_> {
        self.session.query(entity)
    }
}

impl fmt::Debug for ManagedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedSession")
            .field("id", &self.id())
            .field("global", &self.global.as_ref().map(|m| m.name()))
            .finish()
    }
}
