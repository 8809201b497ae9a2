//! Grammar for conventional relational stores.

use ringorm_proto::{
    AlterTable, Bindings, Boolean, ColumnDefinition, CompileError, CompiledCommand, Dialect,
    QueryIntent, Selection, TableDefinition, Value,
};

use crate::grammar::Grammar;

/// Relational grammar. Every identifier segment is double-quoted.
#[derive(Debug, Clone, Default)]
pub struct SqlGrammar {
    schema: Option<String>,
}

impl SqlGrammar {
    /// Create a grammar without a schema prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix unqualified table names with `schema`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    fn unsupported(feature: &'static str) -> CompileError {
        CompileError::Unsupported {
            dialect: Dialect::Sql,
            feature,
        }
    }

    /// WHERE clause with write conditions folded in as trailing AND terms.
    fn where_clause(&self, query: &QueryIntent, bindings: &mut Bindings) -> String {
        let wheres = self.compile_wheres(&query.wheres, bindings);
        let conditions = self.compile_wheres(&query.if_conditions, bindings);

        match (wheres.is_empty(), conditions.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!(" WHERE {wheres}"),
            (true, false) => format!(" WHERE {conditions}"),
            (false, false) => {
                let disjunctive = query.wheres.iter().skip(1).any(|p| p.boolean == Boolean::Or);
                if disjunctive {
                    format!(" WHERE ({wheres}) AND {conditions}")
                } else {
                    format!(" WHERE {wheres} AND {conditions}")
                }
            }
        }
    }

    fn column_definition(&self, column: &ColumnDefinition) -> Result<String, CompileError> {
        if column.is_static {
            return Err(Self::unsupported("static columns"));
        }
        Ok(format!("{} {}", self.wrap_column(&column.name), column.data_type))
    }
}

impl Grammar for SqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sql
    }

    fn quote_identifier(&self, segment: &str) -> String {
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    fn wrap_table(&self, table: &str) -> String {
        let wrapped = table
            .split('.')
            .map(|segment| self.quote_identifier(segment))
            .collect::<Vec<_>>()
            .join(".");
        match &self.schema {
            Some(schema) if !table.contains('.') => {
                format!("{}.{}", self.quote_identifier(schema), wrapped)
            }
            _ => wrapped,
        }
    }

    fn compile_select(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError> {
        let mut bindings = Bindings::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.compile_columns(&query.columns),
            self.wrap_table(&query.table)
        );
        for join in &query.joins {
            sql.push_str(&format!(
                " {} JOIN {} ON {} {} {}",
                join.kind.as_str(),
                self.wrap_table(&join.table),
                self.wrap_column(&join.first),
                join.operator.as_str(),
                self.wrap_column(&join.second)
            ));
        }
        let wheres = self.compile_wheres(&query.wheres, &mut bindings);
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres);
        }
        if !query.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.columnize(&query.groups));
        }
        let havings = self.compile_wheres(&query.havings, &mut bindings);
        if !havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&havings);
        }
        sql.push_str(&self.compile_orders(&query.orders));
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_insert(
        &self,
        query: &QueryIntent,
        values: &[(String, Value)],
    ) -> Result<CompiledCommand, CompileError> {
        if values.is_empty() {
            return Err(CompileError::EmptyColumns { statement: "INSERT" });
        }
        if query.ttl.is_some() {
            return Err(Self::unsupported("time-to-live"));
        }

        let mut bindings = Bindings::new();
        let columns: Vec<String> = values.iter().map(|(c, _)| c.clone()).collect();
        let params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.wrap_table(&query.table),
            self.columnize(&columns),
            self.parameterize(&params, &mut bindings)
        );
        if query.if_not_exists {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_update(
        &self,
        query: &QueryIntent,
        values: &[(String, Value)],
    ) -> Result<CompiledCommand, CompileError> {
        if values.is_empty() {
            return Err(CompileError::EmptyColumns { statement: "UPDATE" });
        }
        if query.ttl.is_some() {
            return Err(Self::unsupported("time-to-live"));
        }

        let mut bindings = Bindings::new();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.wrap_table(&query.table),
            self.compile_assignments(values, &mut bindings)
        );
        sql.push_str(&self.where_clause(query, &mut bindings));

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_delete(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError> {
        if matches!(&query.columns, Selection::Columns(columns) if !columns.is_empty()) {
            return Err(Self::unsupported("partial-column deletes"));
        }

        let mut bindings = Bindings::new();
        let mut sql = format!("DELETE FROM {}", self.wrap_table(&query.table));
        sql.push_str(&self.where_clause(query, &mut bindings));

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_create_table(&self, table: &TableDefinition) -> Result<String, CompileError> {
        if table.columns.is_empty() {
            return Err(CompileError::EmptyColumns {
                statement: "CREATE TABLE",
            });
        }
        if !table.options.is_empty() {
            return Err(Self::unsupported("table options"));
        }

        let mut clauses = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect::<Result<Vec<_>, _>>()?;

        let key: Vec<String> = if table.partition_keys.is_empty() {
            if !table.clustering_keys.is_empty() {
                return Err(CompileError::MissingPartitionKey {
                    statement: "CREATE TABLE",
                });
            }
            table
                .columns
                .iter()
                .filter(|c| c.primary)
                .map(|c| c.name.clone())
                .collect()
        } else {
            table
                .partition_keys
                .iter()
                .cloned()
                .chain(table.clustering_keys.iter().map(|o| o.column.clone()))
                .collect()
        };
        if key.is_empty() {
            return Err(CompileError::MissingPrimaryKey {
                table: table.name.clone(),
            });
        }
        clauses.push(format!("PRIMARY KEY ({})", self.columnize(&key)));

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if table.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.wrap_table(&table.name),
            clauses.join(", ")
        ))
    }

    fn compile_alter_table(&self, alter: &AlterTable) -> Result<Vec<String>, CompileError> {
        if alter.add.is_empty() && alter.drop.is_empty() {
            return Err(CompileError::EmptyColumns {
                statement: "ALTER TABLE",
            });
        }
        if !alter.options.is_empty() {
            return Err(Self::unsupported("table options"));
        }

        let table = self.wrap_table(&alter.table);
        let mut statements = Vec::with_capacity(alter.add.len() + alter.drop.len());
        for column in &alter.add {
            statements.push(format!(
                "ALTER TABLE {table} ADD COLUMN {}",
                self.column_definition(column)?
            ));
        }
        for column in &alter.drop {
            statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                self.wrap_column(column)
            ));
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ringorm_proto::{count_placeholders, MaterializedView, Operator, Order};

    fn grammar() -> SqlGrammar {
        SqlGrammar::new()
    }

    #[test]
    fn test_compile_select_with_joins() {
        let mut query = QueryIntent::new("tags");
        query
            .select(["tags.*", "post_tag.post_id as pivot_post_id"])
            .join("post_tag", "post_tag.tag_id", Operator::Eq, "tags.id")
            .where_eq("post_tag.post_id", 4)
            .group_by(["tags.id"])
            .having_op("tags.id", Operator::Gt, 0)
            .order_by_asc("tags.name")
            .limit(20)
            .offset(40);

        let command = grammar().compile_select(&query).unwrap();
        assert_eq!(
            command.text,
            "SELECT \"tags\".*, \"post_tag\".\"post_id\" AS \"pivot_post_id\" FROM \"tags\" \
             INNER JOIN \"post_tag\" ON \"post_tag\".\"tag_id\" = \"tags\".\"id\" \
             WHERE \"post_tag\".\"post_id\" = ? GROUP BY \"tags\".\"id\" HAVING \"tags\".\"id\" > ? \
             ORDER BY \"tags\".\"name\" ASC LIMIT 20 OFFSET 40"
        );
        assert_eq!(command.params, vec![Value::Int(4), Value::Int(0)]);
        assert_eq!(count_placeholders(&command.text), 2);
    }

    #[test]
    fn test_allow_filtering_is_ignored() {
        let mut query = QueryIntent::new("posts");
        query.where_eq("id", 1).allow_filtering();
        let command = grammar().compile_select(&query).unwrap();
        assert_eq!(command.text, "SELECT * FROM \"posts\" WHERE \"id\" = ?");
    }

    #[test]
    fn test_insert_if_not_exists() {
        let mut query = QueryIntent::new("users");
        query.if_not_exists();
        let values = vec![("id".to_string(), Value::Int(1))];
        let command = grammar().compile_insert(&query, &values).unwrap();
        assert_eq!(
            command.text,
            "INSERT INTO \"users\" (\"id\") VALUES (?) ON CONFLICT DO NOTHING"
        );

        query.ttl(10);
        assert!(matches!(
            grammar().compile_insert(&query, &values),
            Err(CompileError::Unsupported { dialect: Dialect::Sql, .. })
        ));
    }

    #[test]
    fn test_update_folds_conditions_into_where() {
        let mut query = QueryIntent::new("users");
        query
            .where_eq("id", 1)
            .or_where_eq("id", 2)
            .if_condition("version", Operator::Eq, 5);
        let values = vec![("name".to_string(), Value::from("x"))];
        let command = grammar().compile_update(&query, &values).unwrap();
        assert_eq!(
            command.text,
            "UPDATE \"users\" SET \"name\" = ? WHERE (\"id\" = ? OR \"id\" = ?) AND \"version\" = ?"
        );
        assert_eq!(
            command.params,
            vec![Value::from("x"), Value::Int(1), Value::Int(2), Value::Int(5)]
        );
    }

    #[test]
    fn test_delete() {
        let mut query = QueryIntent::new("users");
        query.where_in("id", [1, 2]);
        let command = grammar().compile_delete(&query).unwrap();
        assert_eq!(command.text, "DELETE FROM \"users\" WHERE \"id\" IN (?, ?)");

        query.select(["email"]);
        assert!(grammar().compile_delete(&query).is_err());
    }

    #[test]
    fn test_create_and_alter_table() {
        let table = TableDefinition::new("posts")
            .column(ColumnDefinition::new("author_id", "integer"))
            .column(ColumnDefinition::new("id", "integer"))
            .partition_key("author_id")
            .clustering_key(Order::desc("id"));
        assert_eq!(
            grammar().compile_create_table(&table).unwrap(),
            "CREATE TABLE \"posts\" (\"author_id\" integer, \"id\" integer, \
             PRIMARY KEY (\"author_id\", \"id\"))"
        );

        let alter = AlterTable::new("posts")
            .add_column(ColumnDefinition::new("title", "text"))
            .add_column(ColumnDefinition::new("body", "text"))
            .drop_column("legacy");
        assert_eq!(
            grammar().compile_alter_table(&alter).unwrap(),
            vec![
                "ALTER TABLE \"posts\" ADD COLUMN \"title\" text".to_string(),
                "ALTER TABLE \"posts\" ADD COLUMN \"body\" text".to_string(),
                "ALTER TABLE \"posts\" DROP COLUMN \"legacy\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_unsupported_definitions() {
        let view = MaterializedView::new("v", "posts").partition_key("id");
        assert!(grammar().compile_create_materialized_view(&view).is_err());

        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new("id", "int").primary())
            .option("comment", "'x'");
        assert!(grammar().compile_create_table(&table).is_err());
    }

    #[test]
    fn test_schema_prefix() {
        let grammar = grammar().with_schema("app");
        assert_eq!(grammar.wrap_table("users"), "\"app\".\"users\"");
        assert_eq!(
            grammar.compile_drop_table("users", false),
            "DROP TABLE \"app\".\"users\""
        );
    }
}
