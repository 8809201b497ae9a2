//! Error types for the in-memory driver.

use ringorm_proto::DriverError;
use thiserror::Error;

use crate::span::{offset_to_column, Span};

/// Error while lexing or parsing command text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Format the error with the command text and a caret under the span.
    pub fn format_with_source(&self, source: &str) -> String {
        let col = offset_to_column(source, self.span.start);
        let mut result = format!("error: {}\n", self.message);
        result.push_str(&format!("  --> column {}\n", col));
        result.push_str(&format!("   | {}\n   | ", source));
        for _ in 1..col {
            result.push(' ');
        }
        result.push('^');
        for _ in 1..self.span.len() {
            result.push('~');
        }
        result.push('\n');
        result
    }
}

/// Errors raised by the in-memory driver.
#[derive(Debug, Error)]
pub enum Error {
    /// Command text could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The command names a table that was never declared.
    #[error("table '{0}' is not configured")]
    UnconfiguredTable(String),

    /// The command uses a feature the engine does not evaluate.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Placeholder count and parameter count disagree.
    #[error("command has {expected} placeholders but {actual} parameters were bound")]
    BindingCount { expected: usize, actual: usize },

    /// A written row lacks one of the table's key columns.
    #[error("row for table '{table}' is missing key column '{column}'")]
    MissingKey { table: String, column: String },
}

impl Error {
    /// Stable code reported through [`DriverError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse(_) => "syntax_error",
            Error::UnconfiguredTable(_) => "unconfigured_table",
            Error::Unsupported(_) => "unsupported",
            Error::BindingCount { .. } => "binding_count",
            Error::MissingKey { .. } => "missing_key",
        }
    }
}

impl From<Error> for DriverError {
    fn from(err: Error) -> Self {
        DriverError::new(err.to_string()).with_code(err.code())
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let source = "SELECT * FRM users";
        let err = ParseError::new("expected FROM, found identifier 'FRM'", Span::new(9, 12));
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("column 10"));
        assert!(formatted.contains("expected FROM"));
        assert!(formatted.ends_with("         ^~~\n"));
    }

    #[test]
    fn test_driver_error_code() {
        let err: DriverError = Error::UnconfiguredTable("users".into()).into();
        assert_eq!(err.code.as_deref(), Some("unconfigured_table"));
        assert_eq!(err.message, "table 'users' is not configured");
    }
}
