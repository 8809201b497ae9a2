//! Parsed command structure.

use ringorm_proto::{Direction, Operator, Value};

/// A parsed command together with the number of `?` placeholders it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub statement: Statement,
    pub placeholders: usize,
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Statement keyword, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }

    /// Target table.
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) => &s.table,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }
}

/// A value position: a bound parameter or an inline literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Zero-based index into the bound parameters.
    Param(usize),
    Literal(Value),
}

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub name: String,
    pub alias: Option<String>,
}

impl ProjectedColumn {
    /// Name the column appears under in result rows.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Count,
    Columns(Vec<ProjectedColumn>),
}

/// A boolean filter over one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Compare {
        column: String,
        operator: Operator,
        operand: Operand,
    },
    In {
        column: String,
        negated: bool,
        operands: Vec<Operand>,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    Token {
        columns: Vec<String>,
        operator: Operator,
        operands: Vec<Operand>,
    },
}

/// `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub projection: Projection,
    pub filter: Option<Condition>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub allow_filtering: bool,
}

/// `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Operand>,
    pub if_not_exists: bool,
    pub ttl: Option<u64>,
}

/// `UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub ttl: Option<u64>,
    pub assignments: Vec<(String, Operand)>,
    pub filter: Option<Condition>,
    pub conditions: Option<Condition>,
}

/// `DELETE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    /// Columns to clear; empty removes whole rows.
    pub columns: Vec<String>,
    pub filter: Option<Condition>,
    pub conditions: Option<Condition>,
}
