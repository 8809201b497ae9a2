//! Data access driver contract.
//!
//! The driver owns transport, pooling and retries. This crate only states
//! what it must accept: command text plus parameters in placeholder order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::value::Value;

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Rows returned by a command plus the number of rows it touched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl ResultSet {
    /// Create a result from rows; `row_count` is the row total.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// Create an empty result that reports `row_count` affected rows.
    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    /// Check if no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes compiled commands against a store.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute `command` with `params` bound in order.
    async fn execute(&self, command: &str, params: &[Value]) -> Result<ResultSet, DriverError>;

    /// Whether the store can evaluate joins natively.
    fn supports_joins(&self) -> bool {
        false
    }
}
