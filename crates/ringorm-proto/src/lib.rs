//! ringorm protocol types.
//!
//! This crate defines the values, query intent model, compiled commands and
//! DDL definitions shared by the grammars, the core and the drivers.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for parameters and rows
//! - [`query`] - Query intent model with its fluent builders
//! - [`command`] - Compiled command text and parameter bindings
//! - [`schema`] - Table, alteration and view definitions
//! - [`driver`] - The data access driver contract
//! - [`error`] - Compilation and driver error types

pub mod command;
pub mod driver;
pub mod error;
pub mod query;
pub mod schema;
pub mod value;

pub use command::{count_placeholders, Bindings, CompiledCommand};
pub use driver::{Driver, ResultSet, Row};
pub use error::{CompileError, DriverError};
pub use query::{
    predicate_bindings, Boolean, Dialect, Direction, Join, JoinKind, Operator, Order, Predicate,
    PredicateKind, QueryIntent, Selection,
};
pub use schema::{AlterTable, ColumnDefinition, MaterializedView, TableDefinition, TableOption};
pub use value::Value;
