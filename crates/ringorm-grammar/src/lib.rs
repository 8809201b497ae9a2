//! Dialect grammars for ringorm.
//!
//! A [`Grammar`] compiles a [`QueryIntent`](ringorm_proto::QueryIntent) into
//! a [`CompiledCommand`](ringorm_proto::CompiledCommand) whose placeholders
//! line up one-to-one with its parameters.
//!
//! # Dialects
//!
//! - [`CqlGrammar`] - partition-oriented stores (token ranges, TTL, LWT conditions)
//! - [`SqlGrammar`] - relational stores (joins, grouping, offsets)

pub mod cql;
pub mod grammar;
pub mod sql;

use std::sync::Arc;

use ringorm_proto::Dialect;

pub use cql::CqlGrammar;
pub use grammar::Grammar;
pub use sql::SqlGrammar;

/// Build the grammar for a dialect, prefixing tables with `namespace`
/// (a CQL keyspace or an SQL schema) when given.
pub fn grammar_for(dialect: Dialect, namespace: Option<&str>) -> Arc<dyn Grammar> {
    match (dialect, namespace) {
        (Dialect::Cql, Some(keyspace)) => Arc::new(CqlGrammar::new().with_keyspace(keyspace)),
        (Dialect::Cql, None) => Arc::new(CqlGrammar::new()),
        (Dialect::Sql, Some(schema)) => Arc::new(SqlGrammar::new().with_schema(schema)),
        (Dialect::Sql, None) => Arc::new(SqlGrammar::new()),
    }
}
