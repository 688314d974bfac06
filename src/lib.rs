//! Named, reusable, chainable query operations for a relational query layer.
//!
//! Operations are bundled into [`ManagerDefinition`]s and bound either to an
//! entity (and inherited by its subclasses) or to a single session:
//!
//! ```
//! use std::sync::Arc;
//!
//! use managed_query::args;
//! use managed_query::demo::{self, PERSON};
//! use managed_query::manager::{ManagedSession, Resolver};
//!
//! # fn main() -> managed_query::Result<()> {
//! let db = demo::open_seeded()?;
//! let resolver = Arc::new(Resolver::new(demo::registry()?));
//! let session = ManagedSession::open(&db, resolver);
//!
//! let rows = session
//!     .query(&PERSON)
//!     .call("older_than", args![18])?
//!     .call("younger_than", args![40])?
//!     .rows()?;
//! assert_eq!(rows.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod manager;
pub mod models;

pub use error::{Error, Result};
pub use manager::{
    Args, ManagedQuery, ManagedSession, ManagerDefinition, Outcome, Registry, Resolver, Step,
    Terminal,
};
