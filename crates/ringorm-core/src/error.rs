//! Core error types.

use std::fmt;

use ringorm_proto::{CompileError, DriverError};
use thiserror::Error;

/// The kind of command a failed execution was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Core ORM errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A query intent or definition could not be compiled.
    #[error("compilation error: {0}")]
    Compile(#[from] CompileError),

    /// The driver rejected a compiled command.
    #[error("{operation} failed: {source}")]
    Execution {
        operation: Operation,
        #[source]
        source: DriverError,
    },

    /// A relation mutation needs a parent key that is not set.
    #[error("cannot {action} relation '{relation}': key '{key}' is not set")]
    MissingParentKey {
        relation: String,
        key: String,
        action: &'static str,
    },

    /// A polymorphic discriminator has no registered entity type.
    #[error("type '{tag}' is not registered for relation '{relation}'")]
    UnregisteredType { relation: String, tag: String },

    /// No entity type with this name is registered in the session.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// The entity type declares no relation with this name.
    #[error("unknown relation '{relation}' on entity '{entity}'")]
    UnknownRelation { entity: String, relation: String },

    /// The relation exists but has a different shape than requested.
    #[error("relation '{relation}' is not a {expected} relation")]
    RelationKind {
        relation: String,
        expected: &'static str,
    },

    /// Bulk fill hit an entity that guards every attribute.
    #[error("attribute '{key}' is not mass assignable on '{entity}'")]
    MassAssignment { entity: String, key: String },

    /// A stored value could not be coerced by its cast.
    #[error("cannot cast '{key}' to {cast}: {message}")]
    Cast {
        key: String,
        cast: &'static str,
        message: String,
    },

    /// A persisted operation needs the primary key and it is not set.
    #[error("'{entity}' record has no primary key value")]
    MissingPrimaryKey { entity: String },

    /// The record no longer exists in the store.
    #[error("'{entity}' record not found")]
    NotFound { entity: String },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Wrap a driver rejection with the operation that caused it.
    pub fn execution(operation: Operation, source: DriverError) -> Self {
        Error::Execution { operation, source }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_context() {
        let err = Error::execution(Operation::Update, DriverError::new("timeout"));
        assert_eq!(err.to_string(), "update failed: timeout");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_compile_error_converts() {
        let err: Error = CompileError::EmptyColumns { statement: "INSERT" }.into();
        assert!(matches!(err, Error::Compile(_)));
    }
}
