//! The grammar contract and the compilation shared by every dialect.

use std::fmt;

use ringorm_proto::{
    AlterTable, Bindings, CompileError, CompiledCommand, Dialect, MaterializedView, Order,
    Predicate, PredicateKind, QueryIntent, Selection, TableDefinition, TableOption, Value,
};

/// A dialect-specific compiler from query intents to command text.
///
/// Placeholders are only ever produced through [`Bindings::bind`], which
/// records the value at the same moment the placeholder is emitted. WHERE,
/// HAVING and IF clauses all go through [`Grammar::compile_wheres`], so
/// text and parameters are built by a single walk over each predicate list.
pub trait Grammar: Send + Sync + fmt::Debug {
    /// The dialect this grammar emits.
    fn dialect(&self) -> Dialect;

    /// Quote a table name according to the dialect's identifier policy.
    fn wrap_table(&self, table: &str) -> String;

    /// Quote a single identifier segment.
    fn quote_identifier(&self, segment: &str) -> String;

    /// Placeholder token for a bound value.
    fn parameter(&self, _value: &Value) -> String {
        "?".to_string()
    }

    /// Compile a SELECT.
    fn compile_select(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError>;

    /// Compile an INSERT of `values`.
    fn compile_insert(
        &self,
        query: &QueryIntent,
        values: &[(String, Value)],
    ) -> Result<CompiledCommand, CompileError>;

    /// Compile an UPDATE setting `values`.
    fn compile_update(
        &self,
        query: &QueryIntent,
        values: &[(String, Value)],
    ) -> Result<CompiledCommand, CompileError>;

    /// Compile a DELETE.
    fn compile_delete(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError>;

    /// Compile a CREATE TABLE.
    fn compile_create_table(&self, table: &TableDefinition) -> Result<String, CompileError>;

    /// Compile an ALTER TABLE into one or more statements.
    fn compile_alter_table(&self, alter: &AlterTable) -> Result<Vec<String>, CompileError>;

    /// Compile a CREATE MATERIALIZED VIEW.
    fn compile_create_materialized_view(
        &self,
        _view: &MaterializedView,
    ) -> Result<String, CompileError> {
        Err(CompileError::Unsupported {
            dialect: self.dialect(),
            feature: "materialized views",
        })
    }

    /// Compile a DROP TABLE.
    fn compile_drop_table(&self, table: &str, if_exists: bool) -> String {
        format!(
            "DROP TABLE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.wrap_table(table)
        )
    }

    /// Compile a `SELECT COUNT(*)` over the query's predicates.
    fn compile_count(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError> {
        let mut counted = query.clone();
        counted.columns = Selection::Columns(vec!["COUNT(*)".to_string()]);
        counted.orders.clear();
        counted.limit = None;
        counted.offset = None;
        self.compile_select(&counted)
    }

    /// Quote a column reference.
    ///
    /// Handles `table.column` paths, `*`, `COUNT(*)` and `expr AS alias`.
    fn wrap_column(&self, column: &str) -> String {
        wrap_reference(column, &|segment| self.quote_identifier(segment))
    }

    /// Comma-separated wrapped column list.
    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap_column(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Comma-separated placeholders for `values`, binding each one.
    fn parameterize(&self, values: &[Value], bindings: &mut Bindings) -> String {
        values
            .iter()
            .map(|v| bindings.bind(self.parameter(v), v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Select list text.
    fn compile_columns(&self, selection: &Selection) -> String {
        match selection {
            Selection::All => "*".to_string(),
            Selection::Columns(columns) if columns.is_empty() => "*".to_string(),
            Selection::Columns(columns) => self.columnize(columns),
        }
    }

    /// ` ORDER BY ...` text, or empty.
    fn compile_orders(&self, orders: &[Order]) -> String {
        if orders.is_empty() {
            return String::new();
        }
        let clauses: Vec<String> = orders
            .iter()
            .map(|o| {
                format!(
                    "{} {}",
                    self.wrap_column(&o.column),
                    o.direction.as_str().to_uppercase()
                )
            })
            .collect();
        format!(" ORDER BY {}", clauses.join(", "))
    }

    /// `SET a = ?, b = ?` body, binding each value.
    fn compile_assignments(&self, values: &[(String, Value)], bindings: &mut Bindings) -> String {
        values
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    self.wrap_column(column),
                    bindings.bind(self.parameter(value), value)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Compile a predicate list; empty input yields empty text.
    ///
    /// No connector precedes the first predicate. Every later predicate is
    /// preceded by its own connector.
    fn compile_wheres(&self, predicates: &[Predicate], bindings: &mut Bindings) -> String {
        let mut sql = String::new();
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(predicate.boolean.as_str());
                sql.push(' ');
            }
            sql.push_str(&self.compile_predicate(predicate, bindings));
        }
        sql
    }

    /// Compile one predicate, binding its values in emission order.
    fn compile_predicate(&self, predicate: &Predicate, bindings: &mut Bindings) -> String {
        match &predicate.kind {
            PredicateKind::Basic {
                column,
                operator,
                value,
            } => format!(
                "{} {} {}",
                self.wrap_column(column),
                operator.as_str(),
                bindings.bind(self.parameter(value), value)
            ),
            PredicateKind::In { column, values } => format!(
                "{} IN ({})",
                self.wrap_column(column),
                self.parameterize(values, bindings)
            ),
            PredicateKind::NotIn { column, values } => format!(
                "{} NOT IN ({})",
                self.wrap_column(column),
                self.parameterize(values, bindings)
            ),
            PredicateKind::Between { column, low, high } => {
                let wrapped = self.wrap_column(column);
                let low = bindings.bind(self.parameter(low), low);
                let high = bindings.bind(self.parameter(high), high);
                format!("{wrapped} >= {low} AND {wrapped} <= {high}")
            }
            PredicateKind::Null { column } => format!("{} IS NULL", self.wrap_column(column)),
            PredicateKind::NotNull { column } => {
                format!("{} IS NOT NULL", self.wrap_column(column))
            }
            PredicateKind::Token {
                columns,
                operator,
                values,
            } => format!(
                "TOKEN({}) {} TOKEN({})",
                self.columnize(columns),
                operator.as_str(),
                self.parameterize(values, bindings)
            ),
            PredicateKind::Raw { sql } => sql.clone(),
        }
    }

    /// ` WITH a AND b ...` text for table options, or empty.
    fn compile_table_options(&self, clustering: &[Order], options: &[TableOption]) -> String {
        let mut clauses = Vec::new();
        if clustering.iter().any(|o| o.direction == ringorm_proto::Direction::Desc) {
            let orders: Vec<String> = clustering
                .iter()
                .map(|o| {
                    format!(
                        "{} {}",
                        self.wrap_column(&o.column),
                        o.direction.as_str().to_uppercase()
                    )
                })
                .collect();
            clauses.push(format!("CLUSTERING ORDER BY ({})", orders.join(", ")));
        }
        clauses.extend(options.iter().map(|o| format!("{} = {}", o.name, o.value)));

        clauses
            .iter()
            .enumerate()
            .map(|(i, clause)| format!(" {} {}", if i == 0 { "WITH" } else { "AND" }, clause))
            .collect()
    }
}

/// Wrap a column reference segment by segment.
pub(crate) fn wrap_reference(reference: &str, quote: &dyn Fn(&str) -> String) -> String {
    if let Some((expr, alias)) = split_alias(reference) {
        return format!("{} AS {}", wrap_path(expr, quote), quote(alias));
    }
    wrap_path(reference, quote)
}

fn wrap_path(path: &str, quote: &dyn Fn(&str) -> String) -> String {
    if path.contains('(') {
        // Function calls such as COUNT(*) pass through untouched.
        return path.to_string();
    }
    path.split('.')
        .map(|segment| {
            if segment == "*" {
                segment.to_string()
            } else {
                quote(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn split_alias(reference: &str) -> Option<(&str, &str)> {
    let lower = reference.to_ascii_lowercase();
    lower
        .find(" as ")
        .map(|i| (reference[..i].trim(), reference[i + 4..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CqlGrammar, SqlGrammar};
    use proptest::prelude::*;
    use ringorm_proto::{count_placeholders, predicate_bindings, Boolean, Operator};

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,8}".prop_map(Value::Text),
            any::<bool>().prop_map(Value::Bool),
            Just(Value::Null),
        ]
    }

    fn kind_strategy() -> impl Strategy<Value = PredicateKind> {
        let column = "[a-z][a-z_]{0,6}";
        prop_oneof![
            (column, value_strategy()).prop_map(|(column, value)| PredicateKind::Basic {
                column,
                operator: Operator::Eq,
                value
            }),
            (column, prop::collection::vec(value_strategy(), 0..5))
                .prop_map(|(column, values)| PredicateKind::In { column, values }),
            (column, prop::collection::vec(value_strategy(), 0..5))
                .prop_map(|(column, values)| PredicateKind::NotIn { column, values }),
            (column, value_strategy(), value_strategy())
                .prop_map(|(column, low, high)| PredicateKind::Between { column, low, high }),
            column.prop_map(|column| PredicateKind::Null { column }),
            column.prop_map(|column| PredicateKind::NotNull { column }),
            (
                prop::collection::vec(column, 1..3),
                prop::collection::vec(value_strategy(), 1..3)
            )
                .prop_map(|(columns, values)| PredicateKind::Token {
                    columns,
                    operator: Operator::Gt,
                    values
                }),
            Just(PredicateKind::Raw {
                sql: "deleted = false".to_string()
            }),
        ]
    }

    fn predicate_strategy() -> impl Strategy<Value = Predicate> {
        (kind_strategy(), any::<bool>()).prop_map(|(kind, or)| Predicate {
            boolean: if or { Boolean::Or } else { Boolean::And },
            kind,
        })
    }

    proptest! {
        #[test]
        fn placeholders_match_parameters(predicates in prop::collection::vec(predicate_strategy(), 0..12)) {
            for grammar in [&CqlGrammar::new() as &dyn Grammar, &SqlGrammar::new()] {
                let mut bindings = Bindings::new();
                let text = grammar.compile_wheres(&predicates, &mut bindings);

                let expected: usize = predicates.iter().map(Predicate::placeholder_count).sum();
                prop_assert_eq!(count_placeholders(&text), bindings.len());
                prop_assert_eq!(bindings.len(), expected);
                let expected_bindings = predicate_bindings(&predicates);
                prop_assert_eq!(bindings.values(), expected_bindings.as_slice());
                prop_assert!(!text.starts_with("AND ") && !text.starts_with("OR "));
            }
        }
    }

    #[test]
    fn test_connectors_follow_each_predicate() {
        let grammar = CqlGrammar::new();
        let predicates = vec![
            Predicate::or(PredicateKind::Null { column: "a".into() }),
            Predicate::or(PredicateKind::Null { column: "b".into() }),
            Predicate::and(PredicateKind::Null { column: "c".into() }),
        ];
        let mut bindings = Bindings::new();
        let text = grammar.compile_wheres(&predicates, &mut bindings);
        assert_eq!(text, "a IS NULL OR b IS NULL AND c IS NULL");
    }

    #[test]
    fn test_wrap_reference_forms() {
        let quote = |s: &str| format!("\"{}\"", s);
        assert_eq!(wrap_reference("posts.id", &quote), "\"posts\".\"id\"");
        assert_eq!(wrap_reference("posts.*", &quote), "\"posts\".*");
        assert_eq!(wrap_reference("COUNT(*)", &quote), "COUNT(*)");
        assert_eq!(
            wrap_reference("tags.tag_id as pivot_tag_id", &quote),
            "\"tags\".\"tag_id\" AS \"pivot_tag_id\""
        );
    }
}
