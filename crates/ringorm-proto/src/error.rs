//! Compilation and driver error types.

use thiserror::Error;

use crate::query::Dialect;

/// Errors raised while compiling a query intent or a definition.
///
/// Compilation either produces a complete command or fails with one of
/// these; nothing is partially compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A statement needs at least one column and none were given.
    #[error("{statement} requires at least one column")]
    EmptyColumns { statement: &'static str },

    /// A definition needs at least one partition key.
    #[error("{statement} requires at least one partition key")]
    MissingPartitionKey { statement: &'static str },

    /// A table definition has no partition keys and no primary columns.
    #[error("table '{table}' has no primary key columns")]
    MissingPrimaryKey { table: String },

    /// The dialect cannot express the requested feature.
    #[error("{dialect} grammar does not support {feature}")]
    Unsupported {
        dialect: Dialect,
        feature: &'static str,
    },

    /// An operator string did not name a known comparison.
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),
}

/// Error reported by a data access driver when it rejects a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Driver-provided message.
    pub message: String,
    /// Optional driver-specific error code.
    pub code: Option<String>,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a driver-specific error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
