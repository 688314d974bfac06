//! Data model shared by the query engine and the manager layer.
//!
//! - [`EntityType`]: static declaration of a mapped entity, with an optional
//!   parent forming a single-table inheritance chain.
//! - [`Value`]: a column value or operation argument.
//! - [`Row`]: a loaded entity row.

mod entity;
mod row;
mod value;

pub use entity::*;
pub use row::*;
pub use value::*;
