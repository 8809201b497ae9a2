//! Table, alteration and view definitions handed to grammar DDL compilation.

use serde::{Deserialize, Serialize};

use crate::query::{Order, Selection};

/// A column in a table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Dialect type name, emitted verbatim (e.g. `uuid`, `text`, `map<text, int>`).
    pub data_type: String,
    /// Part of the primary key when no explicit key lists are given.
    pub primary: bool,
    /// Shared by every row of a partition.
    pub is_static: bool,
}

impl ColumnDefinition {
    /// Create a regular column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary: false,
            is_static: false,
        }
    }

    /// Flag the column as primary.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Flag the column as static.
    pub fn static_column(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A `name = value` table option, value emitted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableOption {
    pub name: String,
    pub value: String,
}

/// A table to create.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub partition_keys: Vec<String>,
    pub clustering_keys: Vec<Order>,
    pub options: Vec<TableOption>,
    pub if_not_exists: bool,
}

impl TableDefinition {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a partition key column.
    pub fn partition_key(mut self, column: impl Into<String>) -> Self {
        self.partition_keys.push(column.into());
        self
    }

    /// Add a clustering key column with its order.
    pub fn clustering_key(mut self, order: Order) -> Self {
        self.clustering_keys.push(order);
        self
    }

    /// Add a table option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(TableOption {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Only create the table when it is missing.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

/// Changes to an existing table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlterTable {
    pub table: String,
    pub add: Vec<ColumnDefinition>,
    pub drop: Vec<String>,
    pub options: Vec<TableOption>,
}

impl AlterTable {
    /// Create an empty alteration.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Add a column.
    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.add.push(column);
        self
    }

    /// Drop a column.
    pub fn drop_column(mut self, column: impl Into<String>) -> Self {
        self.drop.push(column.into());
        self
    }

    /// Change a table option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(TableOption {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A materialized view over a base table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterializedView {
    pub name: String,
    pub base_table: String,
    pub columns: Selection,
    pub partition_keys: Vec<String>,
    pub clustering_keys: Vec<Order>,
    pub options: Vec<TableOption>,
    pub if_not_exists: bool,
}

impl MaterializedView {
    /// Create a view selecting every column of `base_table`.
    pub fn new(name: impl Into<String>, base_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_table: base_table.into(),
            ..Self::default()
        }
    }

    /// Add a partition key column.
    pub fn partition_key(mut self, column: impl Into<String>) -> Self {
        self.partition_keys.push(column.into());
        self
    }

    /// Add a clustering key column.
    pub fn clustering_key(mut self, order: Order) -> Self {
        self.clustering_keys.push(order);
        self
    }

    /// Add a view option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(TableOption {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Only create the view when it is missing.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}
