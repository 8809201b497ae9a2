//! Embedded in-memory driver for ringorm.
//!
//! [`MemoryDriver`] lexes, parses and evaluates the command text produced by
//! the ringorm grammars, so query compilation and relationship resolution can
//! be exercised end to end without a running store. Every issued command is
//! recorded for later inspection.
//!
//! # Example
//!
//! ```
//! use ringorm_memory::MemoryDriver;
//! use ringorm_proto::{Driver, Value};
//!
//! # tokio_test_block(async {
//! let driver = MemoryDriver::new().with_table("users", ["id"]);
//! driver
//!     .execute("INSERT INTO users (id, name) VALUES (?, ?)", &[Value::Int(1), "ada".into()])
//!     .await
//!     .unwrap();
//! let result = driver.execute("SELECT name FROM users WHERE id = ?", &[Value::Int(1)]).await.unwrap();
//! assert_eq!(result.rows[0]["name"], Value::from("ada"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use ringorm_proto::{CompiledCommand, Driver, DriverError, ResultSet, Row, Value};
use tracing::debug;

use crate::ast::Statement;
use crate::engine::Store;

pub use engine::{APPLIED_COLUMN, COUNT_COLUMN};
pub use error::{Error, ParseError, Result};

/// A driver that keeps every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    store: RwLock<Store>,
    log: Mutex<Vec<CompiledCommand>>,
}

impl MemoryDriver {
    /// Create a driver with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table keyed by `keys` (builder form).
    pub fn with_table<I, S>(self, name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_table(name, keys);
        self
    }

    /// Declare a table keyed by `keys`, dropping any existing rows.
    pub fn create_table<I, S>(&self, name: impl Into<String>, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store
            .write()
            .create_table(name, keys.into_iter().map(Into::into).collect());
    }

    /// Write a row directly, bypassing command parsing and the command log.
    pub fn insert_row(&self, table: &str, row: Row) -> Result<()> {
        self.store.write().table_mut(table)?.upsert(table, row)?;
        Ok(())
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.store.read().table(table)?.rows.clone())
    }

    /// Every command executed so far, in order.
    pub fn executed(&self) -> Vec<CompiledCommand> {
        self.log.lock().clone()
    }

    /// Number of commands executed so far.
    pub fn command_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Forget the executed command history.
    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Parse and evaluate one command.
    pub fn run(&self, command: &str, params: &[Value]) -> Result<ResultSet> {
        self.log.lock().push(CompiledCommand {
            text: command.to_string(),
            params: params.to_vec(),
        });

        let parsed = parser::parse(command)?;
        if parsed.placeholders != params.len() {
            return Err(Error::BindingCount {
                expected: parsed.placeholders,
                actual: params.len(),
            });
        }

        let statement = &parsed.statement;
        let result = match statement {
            Statement::Select(select) => self.store.read().select(select, params),
            Statement::Insert(insert) => self.store.write().insert(insert, params),
            Statement::Update(update) => self.store.write().update(update, params),
            Statement::Delete(delete) => self.store.write().delete(delete, params),
        }?;

        debug!(
            statement = statement.kind(),
            table = statement.table(),
            params = params.len(),
            rows = result.row_count,
            "memory driver executed command"
        );

        Ok(result)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn execute(&self, command: &str, params: &[Value]) -> std::result::Result<ResultSet, DriverError> {
        self.run(command, params).map_err(DriverError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_round_trip() {
        let driver = MemoryDriver::new().with_table("posts", ["author_id", "id"]);
        for (author, id) in [(1, 10), (1, 11), (2, 20)] {
            driver
                .execute(
                    "INSERT INTO posts (author_id, id, title) VALUES (?, ?, ?)",
                    &[Value::Int(author), Value::Int(id), Value::from(format!("post {id}"))],
                )
                .await
                .unwrap();
        }

        let result = driver
            .execute(
                "SELECT id, title FROM posts WHERE author_id = ? ORDER BY id DESC",
                &[Value::Int(1)],
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[0]["id"], Value::Int(11));
        assert_eq!(driver.command_count(), 4);
    }

    #[tokio::test]
    async fn test_binding_count_mismatch() {
        let driver = MemoryDriver::new().with_table("posts", ["id"]);
        let err = driver
            .execute("SELECT * FROM posts WHERE id = ?", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("binding_count"));
    }

    #[tokio::test]
    async fn test_unconfigured_table() {
        let driver = MemoryDriver::new();
        let err = driver.execute("SELECT * FROM ghosts", &[]).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("unconfigured_table"));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let driver = MemoryDriver::new();
        let err = driver.execute("SELEKT * FROM t", &[]).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("syntax_error"));
    }

    #[test]
    fn test_log_records_commands() {
        let driver = MemoryDriver::new().with_table("t", ["id"]);
        driver.run("INSERT INTO t (id) VALUES (?)", &[Value::Int(1)]).unwrap();
        assert_eq!(
            driver.executed(),
            vec![CompiledCommand {
                text: "INSERT INTO t (id) VALUES (?)".into(),
                params: vec![Value::Int(1)],
            }]
        );
        driver.clear_log();
        assert_eq!(driver.command_count(), 0);
        assert_eq!(driver.rows("t").unwrap().len(), 1);
    }
}
