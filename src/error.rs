//! Crate-wide error type.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// No native, type-bound or session-global operation has this name.
    #[error("'{target}' has no operation '{operation}'")]
    UnknownOperation { operation: String, target: String },

    /// The same operation name was registered twice for one entity.
    #[error("operation '{operation}' is already registered for {entity}")]
    DuplicateOperation { operation: String, entity: String },

    #[error("argument {position}: expected {expected}")]
    Argument {
        position: String,
        expected: &'static str,
    },

    #[error("{0} result cannot be refined further")]
    NotQueryable(&'static str),

    #[error("entity '{0}' is not part of the schema")]
    UnknownEntity(String),

    #[error("entity {entity} has no column '{column}'")]
    UnknownColumn { entity: String, column: String },

    #[error("cannot join {entity}: table '{table}' is already in the query")]
    TableAlreadyJoined { entity: String, table: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("query returned no rows")]
    NoResult,

    #[error("query returned more than one row")]
    MultipleResults,

    #[error(transparent)]
    Engine(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn unknown_operation(operation: &str, target: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.to_string(),
            target: target.into(),
        }
    }

    pub fn is_unknown_operation(&self) -> bool {
        matches!(self, Self::UnknownOperation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
