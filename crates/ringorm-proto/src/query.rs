//! Query intent model.
//!
//! A [`QueryIntent`] is the database-agnostic description of a pending
//! command: the target table, the selected columns, an ordered predicate
//! list and the dialect flags a partition store understands. Fluent methods
//! mutate the intent in place; branching a query requires an explicit
//! `clone()`, which deep-copies every list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::value::Value;

/// Target command dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Partition-oriented store dialect (CQL).
    #[default]
    Cql,
    /// Conventional relational dialect.
    Sql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Cql => write!(f, "cql"),
            Dialect::Sql => write!(f, "sql"),
        }
    }
}

/// Comparison operator used by basic, token and having predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Contains,
    ContainsKey,
}

impl Operator {
    /// Operator text as emitted into a command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::Contains => "CONTAINS",
            Operator::ContainsKey => "CONTAINS KEY",
        }
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "LIKE" => Operator::Like,
            "CONTAINS" => Operator::Contains,
            "CONTAINS KEY" => Operator::ContainsKey,
            _ => return Err(CompileError::InvalidOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connector placed before a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    /// Connector keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "AND",
            Boolean::Or => "OR",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl Direction {
    /// Lower-case direction name; grammars upper-case it on output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// The shape of one filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateKind {
    /// `column op value`.
    Basic {
        column: String,
        operator: Operator,
        value: Value,
    },
    /// `column IN (values)`.
    In { column: String, values: Vec<Value> },
    /// `column NOT IN (values)`.
    NotIn { column: String, values: Vec<Value> },
    /// `column >= low AND column <= high`.
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    /// `column IS NULL`.
    Null { column: String },
    /// `column IS NOT NULL`.
    NotNull { column: String },
    /// `TOKEN(columns) op TOKEN(values)`.
    Token {
        columns: Vec<String>,
        operator: Operator,
        values: Vec<Value>,
    },
    /// Verbatim command text.
    Raw { sql: String },
}

/// A filter condition together with the connector that precedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Connector emitted before this predicate when it is not the first.
    pub boolean: Boolean,
    /// The condition itself.
    pub kind: PredicateKind,
}

impl Predicate {
    /// Create a predicate joined with AND.
    pub fn and(kind: PredicateKind) -> Self {
        Self {
            boolean: Boolean::And,
            kind,
        }
    }

    /// Create a predicate joined with OR.
    pub fn or(kind: PredicateKind) -> Self {
        Self {
            boolean: Boolean::Or,
            kind,
        }
    }

    /// Number of placeholders this predicate compiles to.
    pub fn placeholder_count(&self) -> usize {
        match &self.kind {
            PredicateKind::Basic { .. } => 1,
            PredicateKind::In { values, .. }
            | PredicateKind::NotIn { values, .. }
            | PredicateKind::Token { values, .. } => values.len(),
            PredicateKind::Between { .. } => 2,
            PredicateKind::Null { .. } | PredicateKind::NotNull { .. } | PredicateKind::Raw { .. } => 0,
        }
    }

    /// Push this predicate's bound values in placeholder order.
    pub fn push_bindings(&self, out: &mut Vec<Value>) {
        match &self.kind {
            PredicateKind::Basic { value, .. } => out.push(value.clone()),
            PredicateKind::In { values, .. }
            | PredicateKind::NotIn { values, .. }
            | PredicateKind::Token { values, .. } => out.extend(values.iter().cloned()),
            PredicateKind::Between { low, high, .. } => {
                out.push(low.clone());
                out.push(high.clone());
            }
            PredicateKind::Null { .. } | PredicateKind::NotNull { .. } | PredicateKind::Raw { .. } => {}
        }
    }
}

/// Extract the bound values of a predicate list in placeholder order.
pub fn predicate_bindings(predicates: &[Predicate]) -> Vec<Value> {
    let mut out = Vec::new();
    for predicate in predicates {
        predicate.push_bindings(&mut out);
    }
    out
}

/// Column selection of a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Selection {
    /// Every column (`*`).
    #[default]
    All,
    /// An ordered column list.
    Columns(Vec<String>),
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Join keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

/// A join against another table on a column comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub first: String,
    pub operator: Operator,
    pub second: String,
}

/// Ordering on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    /// Create an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// A pending query against one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Target table.
    pub table: String,
    /// Selected columns.
    pub columns: Selection,
    /// WHERE predicates, in declaration order.
    pub wheres: Vec<Predicate>,
    /// Joins (relational dialects only).
    pub joins: Vec<Join>,
    /// GROUP BY columns.
    pub groups: Vec<String>,
    /// HAVING predicates.
    pub havings: Vec<Predicate>,
    /// ORDER BY clauses.
    pub orders: Vec<Order>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Row offset.
    pub offset: Option<u64>,
    /// Append `ALLOW FILTERING` to selects.
    pub allow_filtering: bool,
    /// Time-to-live for written cells, in seconds.
    pub ttl: Option<u32>,
    /// Make inserts conditional on the row not existing.
    pub if_not_exists: bool,
    /// Conditions for lightweight-transaction writes.
    pub if_conditions: Vec<Predicate>,
}

impl QueryIntent {
    /// Create an empty query against a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Select a list of columns.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected = match std::mem::take(&mut self.columns) {
            Selection::All => Vec::new(),
            Selection::Columns(existing) => existing,
        };
        selected.extend(columns.into_iter().map(Into::into));
        self.columns = Selection::Columns(selected);
        self
    }

    /// Select every column.
    pub fn select_all(&mut self) -> &mut Self {
        self.columns = Selection::All;
        self
    }

    fn push_where(&mut self, boolean: Boolean, kind: PredicateKind) -> &mut Self {
        self.wheres.push(Predicate { boolean, kind });
        self
    }

    /// Add one AND-joined equality predicate per `(column, value)` pair.
    pub fn where_all<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self.where_eq(column, value);
        }
        self
    }

    /// `column = value`, joined with AND.
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_op(column, Operator::Eq, value)
    }

    /// `column op value`, joined with AND.
    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(
            Boolean::And,
            PredicateKind::Basic {
                column: column.into(),
                operator,
                value: value.into(),
            },
        )
    }

    /// `column = value`, joined with OR.
    pub fn or_where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.or_where_op(column, Operator::Eq, value)
    }

    /// `column op value`, joined with OR.
    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(
            Boolean::Or,
            PredicateKind::Basic {
                column: column.into(),
                operator,
                value: value.into(),
            },
        )
    }

    /// `column IN (values)`.
    pub fn where_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where(
            Boolean::And,
            PredicateKind::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `column IN (values)`, joined with OR.
    pub fn or_where_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where(
            Boolean::Or,
            PredicateKind::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `column NOT IN (values)`.
    pub fn where_not_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where(
            Boolean::And,
            PredicateKind::NotIn {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `column NOT IN (values)`, joined with OR.
    pub fn or_where_not_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where(
            Boolean::Or,
            PredicateKind::NotIn {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `column >= low AND column <= high`.
    pub fn where_between(
        &mut self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(
            Boolean::And,
            PredicateKind::Between {
                column: column.into(),
                low: low.into(),
                high: high.into(),
            },
        )
    }

    /// Between, joined with OR.
    pub fn or_where_between(
        &mut self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(
            Boolean::Or,
            PredicateKind::Between {
                column: column.into(),
                low: low.into(),
                high: high.into(),
            },
        )
    }

    /// `column IS NULL`.
    pub fn where_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_where(
            Boolean::And,
            PredicateKind::Null {
                column: column.into(),
            },
        )
    }

    /// `column IS NULL`, joined with OR.
    pub fn or_where_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_where(
            Boolean::Or,
            PredicateKind::Null {
                column: column.into(),
            },
        )
    }

    /// `column IS NOT NULL`.
    pub fn where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_where(
            Boolean::And,
            PredicateKind::NotNull {
                column: column.into(),
            },
        )
    }

    /// `column IS NOT NULL`, joined with OR.
    pub fn or_where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_where(
            Boolean::Or,
            PredicateKind::NotNull {
                column: column.into(),
            },
        )
    }

    /// `TOKEN(columns) op TOKEN(values)`, the partition-range predicate.
    pub fn where_token<C, S, I, V>(&mut self, columns: C, operator: Operator, values: I) -> &mut Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_where(
            Boolean::And,
            PredicateKind::Token {
                columns: columns.into_iter().map(Into::into).collect(),
                operator,
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Verbatim predicate text.
    pub fn where_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push_where(Boolean::And, PredicateKind::Raw { sql: sql.into() })
    }

    /// Verbatim predicate text, joined with OR.
    pub fn or_where_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push_where(Boolean::Or, PredicateKind::Raw { sql: sql.into() })
    }

    fn push_join(
        &mut self,
        kind: JoinKind,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: Operator,
        second: impl Into<String>,
    ) -> &mut Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            first: first.into(),
            operator,
            second: second.into(),
        });
        self
    }

    /// Inner join.
    pub fn join(
        &mut self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: Operator,
        second: impl Into<String>,
    ) -> &mut Self {
        self.push_join(JoinKind::Inner, table, first, operator, second)
    }

    /// Left join.
    pub fn left_join(
        &mut self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: Operator,
        second: impl Into<String>,
    ) -> &mut Self {
        self.push_join(JoinKind::Left, table, first, operator, second)
    }

    /// Right join.
    pub fn right_join(
        &mut self,
        table: impl Into<String>,
        first: impl Into<String>,
        operator: Operator,
        second: impl Into<String>,
    ) -> &mut Self {
        self.push_join(JoinKind::Right, table, first, operator, second)
    }

    /// Order by a column.
    pub fn order_by(&mut self, column: impl Into<String>, direction: Direction) -> &mut Self {
        self.orders.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    /// Order by a column, ascending.
    pub fn order_by_asc(&mut self, column: impl Into<String>) -> &mut Self {
        self.order_by(column, Direction::Asc)
    }

    /// Order by a column, descending.
    pub fn order_by_desc(&mut self, column: impl Into<String>) -> &mut Self {
        self.order_by(column, Direction::Desc)
    }

    /// Group by columns.
    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `HAVING column = value`.
    pub fn having_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.having_op(column, Operator::Eq, value)
    }

    /// `HAVING column op value`.
    pub fn having_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.havings.push(Predicate::and(PredicateKind::Basic {
            column: column.into(),
            operator,
            value: value.into(),
        }));
        self
    }

    /// Limit the number of rows.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Alias for [`QueryIntent::limit`].
    pub fn take(&mut self, limit: u64) -> &mut Self {
        self.limit(limit)
    }

    /// Skip a number of rows.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Alias for [`QueryIntent::offset`].
    pub fn skip(&mut self, offset: u64) -> &mut Self {
        self.offset(offset)
    }

    /// Append `ALLOW FILTERING`.
    pub fn allow_filtering(&mut self) -> &mut Self {
        self.allow_filtering = true;
        self
    }

    /// Set a write time-to-live in seconds.
    pub fn ttl(&mut self, seconds: u32) -> &mut Self {
        self.ttl = Some(seconds);
        self
    }

    /// Make an insert conditional on the row not existing.
    pub fn if_not_exists(&mut self) -> &mut Self {
        self.if_not_exists = true;
        self
    }

    /// Add a write condition (`IF column op value`).
    pub fn if_condition(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.if_conditions.push(Predicate::and(PredicateKind::Basic {
            column: column.into(),
            operator,
            value: value.into(),
        }));
        self
    }

    /// Bound values of the WHERE predicates, in placeholder order.
    pub fn where_bindings(&self) -> Vec<Value> {
        predicate_bindings(&self.wheres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_overloads() {
        let mut query = QueryIntent::new("posts");
        query
            .where_all([("author_id", 7), ("status", 1)])
            .where_eq("title", "hello")
            .or_where_op("views", Operator::Gt, 10);

        assert_eq!(query.wheres.len(), 4);
        assert_eq!(query.wheres[0].boolean, Boolean::And);
        assert!(matches!(
            &query.wheres[2].kind,
            PredicateKind::Basic { operator: Operator::Eq, .. }
        ));
        assert_eq!(query.wheres[3].boolean, Boolean::Or);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut base = QueryIntent::new("posts");
        base.where_eq("author_id", 1).order_by_asc("created_at");

        let mut branch = base.clone();
        branch
            .where_in("id", [1, 2, 3])
            .order_by_desc("id")
            .join("users", "users.id", Operator::Eq, "posts.author_id");

        assert_eq!(base.wheres.len(), 1);
        assert_eq!(base.orders.len(), 1);
        assert!(base.joins.is_empty());
        assert_eq!(branch.wheres.len(), 2);
        assert_eq!(branch.orders.len(), 2);
        assert_eq!(branch.joins.len(), 1);
    }

    #[test]
    fn test_limit_aliases() {
        let mut query = QueryIntent::new("posts");
        query.take(5).skip(10);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(10));
    }

    #[test]
    fn test_select_appends_columns() {
        let mut query = QueryIntent::new("posts");
        assert_eq!(query.columns, Selection::All);
        query.select(["id"]).select(["title"]);
        assert_eq!(
            query.columns,
            Selection::Columns(vec!["id".into(), "title".into()])
        );
    }

    #[test]
    fn test_placeholder_counts() {
        let mut query = QueryIntent::new("posts");
        query
            .where_eq("a", 1)
            .where_in("b", [1, 2, 3])
            .where_between("c", 1, 9)
            .where_null("d")
            .where_token(["id"], Operator::Gt, [5])
            .where_raw("e = 1");

        let counts: Vec<usize> = query.wheres.iter().map(Predicate::placeholder_count).collect();
        assert_eq!(counts, vec![1, 3, 2, 0, 1, 0]);
        assert_eq!(query.where_bindings().len(), 7);
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("contains key".parse::<Operator>().unwrap(), Operator::ContainsKey);
        assert!(matches!(
            "~".parse::<Operator>(),
            Err(CompileError::InvalidOperator(_))
        ));
    }
}
