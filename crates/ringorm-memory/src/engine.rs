//! Row storage and statement evaluation.
//!
//! Tables keep rows in insertion order and identify them by their declared
//! key columns. Writes with the same key overwrite in place, so inserts
//! behave as upserts the way a partition store does.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ringorm_proto::{Direction, Operator, ResultSet, Row, Value};

use crate::ast::*;
use crate::error::{Error, Result};

/// Column carrying the outcome of a conditional write.
pub const APPLIED_COLUMN: &str = "[applied]";

/// Column carrying the result of `COUNT(*)`.
pub const COUNT_COLUMN: &str = "count";

static NULL: Value = Value::Null;

/// One table: its key columns and rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub keys: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Create an empty table keyed by `keys`.
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            rows: Vec::new(),
        }
    }

    fn key_of(&self, table: &str, row: &Row) -> Result<Vec<Value>> {
        self.keys
            .iter()
            .map(|key| match row.get(key) {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(Error::MissingKey {
                    table: table.to_string(),
                    column: key.clone(),
                }),
            })
            .collect()
    }

    fn position(&self, key: &[Value]) -> Option<usize> {
        self.rows.iter().position(|row| {
            self.keys
                .iter()
                .zip(key)
                .all(|(column, value)| row.get(column) == Some(value))
        })
    }

    /// Insert or overwrite a row by key.
    pub fn upsert(&mut self, table: &str, row: Row) -> Result<bool> {
        let key = self.key_of(table, &row)?;
        match self.position(&key) {
            Some(i) => {
                self.rows[i].extend(row);
                Ok(false)
            }
            None => {
                self.rows.push(row);
                Ok(true)
            }
        }
    }
}

/// All tables of one driver.
#[derive(Debug, Default)]
pub struct Store {
    tables: BTreeMap<String, Table>,
}

impl Store {
    /// Declare a table, replacing any previous one with the same name.
    pub fn create_table(&mut self, name: impl Into<String>, keys: Vec<String>) {
        self.tables.insert(name.into(), Table::new(keys));
    }

    /// Look up a table.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnconfiguredTable(name.to_string()))
    }

    /// Look up a table for writing.
    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::UnconfiguredTable(name.to_string()))
    }

    /// Evaluate a SELECT.
    pub fn select(&self, select: &Select, params: &[Value]) -> Result<ResultSet> {
        if !select.group_by.is_empty() {
            return Err(Error::Unsupported("GROUP BY".to_string()));
        }
        let table = self.table(&select.table)?;

        let mut rows: Vec<&Row> = table
            .rows
            .iter()
            .filter(|row| row_matches(select.filter.as_ref(), row, params))
            .collect();

        if let Projection::Count = select.projection {
            let mut row = Row::new();
            row.insert(COUNT_COLUMN.to_string(), Value::Int(rows.len() as i64));
            return Ok(ResultSet::from_rows(vec![row]));
        }

        if !select.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &select.order_by {
                    let cmp = sort_order(
                        a.get(column).unwrap_or(&NULL),
                        b.get(column).unwrap_or(&NULL),
                    );
                    let cmp = match direction {
                        Direction::Asc => cmp,
                        Direction::Desc => cmp.reverse(),
                    };
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = select.offset.unwrap_or(0) as usize;
        let limit = select.limit.map_or(usize::MAX, |l| l as usize);
        let rows = rows.into_iter().skip(offset).take(limit);

        let rows: Vec<Row> = match &select.projection {
            Projection::Columns(columns) => rows
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| {
                            (
                                c.output_name().to_string(),
                                row.get(&c.name).cloned().unwrap_or(Value::Null),
                            )
                        })
                        .collect()
                })
                .collect(),
            _ => rows.cloned().collect(),
        };

        Ok(ResultSet::from_rows(rows))
    }

    /// Evaluate an INSERT.
    pub fn insert(&mut self, insert: &Insert, params: &[Value]) -> Result<ResultSet> {
        let table = self.table_mut(&insert.table)?;
        let row: Row = insert
            .columns
            .iter()
            .zip(&insert.values)
            .map(|(column, operand)| (column.clone(), resolve(operand, params).clone()))
            .collect();

        if insert.if_not_exists {
            let key = table.key_of(&insert.table, &row)?;
            if let Some(i) = table.position(&key) {
                return Ok(applied(false, Some(&table.rows[i]), 0));
            }
            table.rows.push(row);
            return Ok(applied(true, None, 1));
        }

        table.upsert(&insert.table, row)?;
        Ok(ResultSet::affected(1))
    }

    /// Evaluate an UPDATE.
    pub fn update(&mut self, update: &Update, params: &[Value]) -> Result<ResultSet> {
        let table = self.table_mut(&update.table)?;
        let targets = matching_indices(table, update.filter.as_ref(), params);

        if let Some(conditions) = &update.conditions {
            if !conditions_hold(table, &targets, conditions, params) {
                let current = targets.first().map(|&i| &table.rows[i]);
                return Ok(applied(false, current, 0));
            }
        }

        for &i in &targets {
            for (column, operand) in &update.assignments {
                table.rows[i].insert(column.clone(), resolve(operand, params).clone());
            }
        }

        let count = targets.len() as u64;
        if update.conditions.is_some() {
            Ok(applied(true, None, count))
        } else {
            Ok(ResultSet::affected(count))
        }
    }

    /// Evaluate a DELETE.
    pub fn delete(&mut self, delete: &Delete, params: &[Value]) -> Result<ResultSet> {
        let table = self.table_mut(&delete.table)?;
        let targets = matching_indices(table, delete.filter.as_ref(), params);

        if let Some(conditions) = &delete.conditions {
            if !conditions_hold(table, &targets, conditions, params) {
                let current = targets.first().map(|&i| &table.rows[i]);
                return Ok(applied(false, current, 0));
            }
        }

        if delete.columns.is_empty() {
            let doomed: BTreeSet<usize> = targets.iter().copied().collect();
            let mut index = 0;
            table.rows.retain(|_| {
                let keep = !doomed.contains(&index);
                index += 1;
                keep
            });
        } else {
            if let Some(key) = delete.columns.iter().find(|c| table.keys.contains(*c)) {
                return Err(Error::Unsupported(format!(
                    "clearing key column '{key}'"
                )));
            }
            for &i in &targets {
                for column in &delete.columns {
                    table.rows[i].remove(column);
                }
            }
        }

        let count = targets.len() as u64;
        if delete.conditions.is_some() {
            Ok(applied(true, None, count))
        } else {
            Ok(ResultSet::affected(count))
        }
    }
}

fn matching_indices(table: &Table, filter: Option<&Condition>, params: &[Value]) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row_matches(filter, row, params))
        .map(|(i, _)| i)
        .collect()
}

fn conditions_hold(table: &Table, targets: &[usize], conditions: &Condition, params: &[Value]) -> bool {
    !targets.is_empty()
        && targets
            .iter()
            .all(|&i| evaluate(conditions, &table.rows[i], params))
}

/// Result of a conditional write: an `[applied]` row, plus the current
/// row values when the write was rejected.
fn applied(ok: bool, current: Option<&Row>, row_count: u64) -> ResultSet {
    let mut row = current.cloned().unwrap_or_default();
    row.insert(APPLIED_COLUMN.to_string(), Value::Bool(ok));
    ResultSet {
        rows: vec![row],
        row_count,
    }
}

fn resolve<'a>(operand: &'a Operand, params: &'a [Value]) -> &'a Value {
    match operand {
        Operand::Param(i) => params.get(*i).unwrap_or(&NULL),
        Operand::Literal(value) => value,
    }
}

fn row_matches(filter: Option<&Condition>, row: &Row, params: &[Value]) -> bool {
    filter.map_or(true, |condition| evaluate(condition, row, params))
}

/// Evaluate a condition against one row.
pub fn evaluate(condition: &Condition, row: &Row, params: &[Value]) -> bool {
    match condition {
        Condition::And(terms) => terms.iter().all(|t| evaluate(t, row, params)),
        Condition::Or(terms) => terms.iter().any(|t| evaluate(t, row, params)),
        Condition::Compare {
            column,
            operator,
            operand,
        } => compare(
            *operator,
            row.get(column).unwrap_or(&NULL),
            resolve(operand, params),
        ),
        Condition::In {
            column,
            negated,
            operands,
        } => {
            let value = row.get(column).unwrap_or(&NULL);
            if value.is_null() {
                return false;
            }
            let found = operands
                .iter()
                .any(|op| values_equal(value, resolve(op, params)));
            found != *negated
        }
        Condition::IsNull { column, negated } => {
            let is_null = row.get(column).map_or(true, Value::is_null);
            is_null != *negated
        }
        Condition::Token {
            columns,
            operator,
            operands,
        } => {
            let row_values: Vec<Value> = columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            let bound: Vec<Value> = operands
                .iter()
                .map(|op| resolve(op, params).clone())
                .collect();
            compare(
                *operator,
                &Value::Int(token(&row_values)),
                &Value::Int(token(&bound)),
            )
        }
    }
}

/// Partition token of a key tuple.
pub fn token(values: &[Value]) -> i64 {
    let bytes = serde_json::to_vec(values).unwrap_or_default();
    let hash = blake3::hash(&bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    i64::from_le_bytes(prefix)
}

fn compare(operator: Operator, left: &Value, right: &Value) -> bool {
    match operator {
        Operator::Eq => values_equal(left, right),
        Operator::Ne => !left.is_null() && !right.is_null() && !values_equal(left, right),
        Operator::Lt => compare_values(left, right) == Some(Ordering::Less),
        Operator::Le => matches!(
            compare_values(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => compare_values(left, right) == Some(Ordering::Greater),
        Operator::Ge => matches!(
            compare_values(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Like => match (left.as_str(), right.as_str()) {
            (Some(value), Some(pattern)) => like_match(value, pattern),
            _ => false,
        },
        Operator::Contains => match left {
            Value::List(items) => items.iter().any(|item| values_equal(item, right)),
            Value::Json(serde_json::Value::Array(items)) => items.contains(&right.to_json()),
            _ => false,
        },
        Operator::ContainsKey => match (left, right.as_str()) {
            (Value::Json(serde_json::Value::Object(map)), Some(key)) => map.contains_key(key),
            _ => false,
        },
    }
}

/// Equality under comparison semantics: NULL equals nothing.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Compare two values, returning their ordering if comparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Int(b)) | (Value::Int(a), Value::Timestamp(b)) => {
            Some(a.cmp(b))
        }
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order for sorting: NULLs first, incomparable values equal.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Match a string against a LIKE pattern with `%` and `_` wildcards.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_at(&value, &pattern)
}

fn like_at(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => (0..=value.len()).any(|i| like_at(&value[i..], rest)),
        Some(('_', rest)) => !value.is_empty() && like_at(&value[1..], rest),
        Some((c, rest)) => value.first() == Some(c) && like_at(&value[1..], rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(store: &mut Store, source: &str, params: &[Value]) -> ResultSet {
        match parse(source).unwrap().statement {
            Statement::Select(s) => store.select(&s, params),
            Statement::Insert(s) => store.insert(&s, params),
            Statement::Update(s) => store.update(&s, params),
            Statement::Delete(s) => store.delete(&s, params),
        }
        .unwrap()
    }

    fn seeded() -> Store {
        let mut store = Store::default();
        store.create_table("users", vec!["id".into()]);
        for (id, name, age) in [(1, "ada", 36), (2, "grace", 45), (3, "alan", 41)] {
            run(
                &mut store,
                "INSERT INTO users (id, name, age) VALUES (?, ?, ?)",
                &[Value::Int(id), Value::from(name), Value::Int(age)],
            );
        }
        store
    }

    fn ids(result: &ResultSet) -> Vec<i64> {
        result
            .rows
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn test_insert_is_upsert() {
        let mut store = seeded();
        run(
            &mut store,
            "INSERT INTO users (id, name) VALUES (?, ?)",
            &[Value::Int(1), Value::from("lovelace")],
        );
        let table = store.table("users").unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].get("name"), Some(&Value::from("lovelace")));
        assert_eq!(table.rows[0].get("age"), Some(&Value::Int(36)));
    }

    #[test]
    fn test_insert_if_not_exists() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "INSERT INTO users (id, name) VALUES (?, ?) IF NOT EXISTS",
            &[Value::Int(2), Value::from("other")],
        );
        assert_eq!(result.rows[0].get(APPLIED_COLUMN), Some(&Value::Bool(false)));
        assert_eq!(result.rows[0].get("name"), Some(&Value::from("grace")));

        let result = run(
            &mut store,
            "INSERT INTO users (id) VALUES (?) IF NOT EXISTS",
            &[Value::Int(9)],
        );
        assert_eq!(result.rows[0].get(APPLIED_COLUMN), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_select_filters_and_orders() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "SELECT id FROM users WHERE age >= ? AND age <= ? ORDER BY age DESC",
            &[Value::Int(40), Value::Int(50)],
        );
        assert_eq!(ids(&result), vec![2, 3]);

        let result = run(
            &mut store,
            "SELECT * FROM users WHERE name LIKE ? OR id = ? ORDER BY id LIMIT 2 OFFSET 1",
            &[Value::from("a%"), Value::Int(2)],
        );
        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[test]
    fn test_select_in_and_count() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "SELECT COUNT(*) FROM users WHERE id IN (?, ?)",
            &[Value::Int(1), Value::Int(3)],
        );
        assert_eq!(result.rows[0].get(COUNT_COLUMN), Some(&Value::Int(2)));

        let result = run(&mut store, "SELECT * FROM users WHERE id IN ()", &[]);
        assert!(result.is_empty());

        let result = run(
            &mut store,
            "SELECT id FROM users WHERE id NOT IN (?)",
            &[Value::Int(1)],
        );
        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[test]
    fn test_conditional_update() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "UPDATE users SET age = ? WHERE id = ? IF age = ?",
            &[Value::Int(37), Value::Int(1), Value::Int(99)],
        );
        assert_eq!(result.rows[0].get(APPLIED_COLUMN), Some(&Value::Bool(false)));

        let result = run(
            &mut store,
            "UPDATE users SET age = ? WHERE id = ? IF age = ?",
            &[Value::Int(37), Value::Int(1), Value::Int(36)],
        );
        assert_eq!(result.rows[0].get(APPLIED_COLUMN), Some(&Value::Bool(true)));
        assert_eq!(
            store.table("users").unwrap().rows[0].get("age"),
            Some(&Value::Int(37))
        );
    }

    #[test]
    fn test_delete_rows_and_columns() {
        let mut store = seeded();
        let result = run(&mut store, "DELETE age FROM users WHERE id = ?", &[Value::Int(2)]);
        assert_eq!(result.row_count, 1);
        assert_eq!(store.table("users").unwrap().rows[1].get("age"), None);

        run(&mut store, "DELETE FROM users WHERE id IN (?, ?)", &[Value::Int(1), Value::Int(2)]);
        let table = store.table("users").unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("id"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_token_predicate_is_consistent() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "SELECT id FROM users WHERE TOKEN(id) = TOKEN(?)",
            &[Value::Int(2)],
        );
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let mut store = seeded();
        let command = parse("INSERT INTO users (name) VALUES (?)").unwrap();
        let Statement::Insert(insert) = command.statement else {
            panic!("expected insert");
        };
        assert!(matches!(
            store.insert(&insert, &[Value::from("x")]),
            Err(Error::MissingKey { .. })
        ));
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("hello", "h%"));
        assert!(like_match("hello", "%ll%"));
        assert!(like_match("hello", "h_llo"));
        assert!(!like_match("hello", "h_lo"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn test_contains_on_collections() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(compare(Operator::Contains, &list, &Value::Int(2)));
        let doc = Value::Json(serde_json::json!({"theme": "dark"}));
        assert!(compare(Operator::ContainsKey, &doc, &Value::from("theme")));
        assert!(!compare(Operator::ContainsKey, &doc, &Value::from("lang")));
    }
}
