//! Grammar for partition-oriented stores speaking CQL.

use ringorm_proto::{
    AlterTable, Bindings, ColumnDefinition, CompileError, CompiledCommand, Dialect,
    MaterializedView, Order, QueryIntent, TableDefinition, Value,
};

use crate::grammar::Grammar;

/// CQL grammar.
///
/// Identifiers that are plain lower-case snake names are emitted bare;
/// anything else is double-quoted so case and reserved characters survive.
#[derive(Debug, Clone, Default)]
pub struct CqlGrammar {
    keyspace: Option<String>,
}

impl CqlGrammar {
    /// Create a grammar without a keyspace prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix unqualified table names with `keyspace`.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// The configured keyspace, if any.
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    fn unsupported(feature: &'static str) -> CompileError {
        CompileError::Unsupported {
            dialect: Dialect::Cql,
            feature,
        }
    }

    fn where_clause(&self, query: &QueryIntent, bindings: &mut Bindings) -> String {
        let wheres = self.compile_wheres(&query.wheres, bindings);
        if wheres.is_empty() {
            String::new()
        } else {
            format!(" WHERE {wheres}")
        }
    }

    fn if_clause(&self, query: &QueryIntent, bindings: &mut Bindings) -> String {
        let conditions = self.compile_wheres(&query.if_conditions, bindings);
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" IF {conditions}")
        }
    }

    fn ttl_clause(query: &QueryIntent) -> String {
        match query.ttl {
            Some(seconds) => format!(" USING TTL {seconds}"),
            None => String::new(),
        }
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut sql = format!("{} {}", self.wrap_column(&column.name), column.data_type);
        if column.is_static {
            sql.push_str(" STATIC");
        }
        sql
    }

    /// `PRIMARY KEY (...)` for a partition/clustering split, or the
    /// fallback list of columns flagged primary.
    fn primary_key(
        &self,
        statement: &'static str,
        table: &str,
        columns: &[ColumnDefinition],
        partition_keys: &[String],
        clustering_keys: &[Order],
    ) -> Result<String, CompileError> {
        if partition_keys.is_empty() {
            if !clustering_keys.is_empty() {
                return Err(CompileError::MissingPartitionKey { statement });
            }
            let primary: Vec<String> = columns
                .iter()
                .filter(|c| c.primary)
                .map(|c| c.name.clone())
                .collect();
            if primary.is_empty() {
                return Err(CompileError::MissingPrimaryKey {
                    table: table.to_string(),
                });
            }
            return Ok(format!("PRIMARY KEY ({})", self.columnize(&primary)));
        }

        let mut key = format!("PRIMARY KEY (({})", self.columnize(partition_keys));
        for order in clustering_keys {
            key.push_str(", ");
            key.push_str(&self.wrap_column(&order.column));
        }
        key.push(')');
        Ok(key)
    }
}

/// Check whether a name can be emitted without quotes.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl Grammar for CqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Cql
    }

    fn quote_identifier(&self, segment: &str) -> String {
        if is_plain_identifier(segment) {
            segment.to_string()
        } else {
            format!("\"{}\"", segment.replace('"', "\"\""))
        }
    }

    fn wrap_table(&self, table: &str) -> String {
        let wrapped = table
            .split('.')
            .map(|segment| self.quote_identifier(segment))
            .collect::<Vec<_>>()
            .join(".");
        match &self.keyspace {
            Some(keyspace) if !table.contains('.') => {
                format!("{}.{}", self.quote_identifier(keyspace), wrapped)
            }
            _ => wrapped,
        }
    }

    fn compile_select(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError> {
        if !query.joins.is_empty() {
            return Err(Self::unsupported("joins"));
        }
        if !query.havings.is_empty() {
            return Err(Self::unsupported("having clauses"));
        }
        if query.offset.is_some() {
            return Err(Self::unsupported("offsets"));
        }

        let mut bindings = Bindings::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.compile_columns(&query.columns),
            self.wrap_table(&query.table)
        );
        sql.push_str(&self.where_clause(query, &mut bindings));
        if !query.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.columnize(&query.groups));
        }
        sql.push_str(&self.compile_orders(&query.orders));
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if query.allow_filtering {
            sql.push_str(" ALLOW FILTERING");
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
            sql.push_str(" IF NOT EXISTS");
        }
        sql.push_str(&Self::ttl_clause(query));

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

        let mut bindings = Bindings::new();
        let mut sql = format!("UPDATE {}", self.wrap_table(&query.table));
        sql.push_str(&Self::ttl_clause(query));
        sql.push_str(" SET ");
        sql.push_str(&self.compile_assignments(values, &mut bindings));
        sql.push_str(&self.where_clause(query, &mut bindings));
        sql.push_str(&self.if_clause(query, &mut bindings));

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_delete(&self, query: &QueryIntent) -> Result<CompiledCommand, CompileError> {
        let mut bindings = Bindings::new();
        let mut sql = String::from("DELETE ");
        if let ringorm_proto::Selection::Columns(columns) = &query.columns {
            if !columns.is_empty() {
                sql.push_str(&self.columnize(columns));
                sql.push(' ');
            }
        }
        sql.push_str("FROM ");
        sql.push_str(&self.wrap_table(&query.table));
        sql.push_str(&self.where_clause(query, &mut bindings));
        sql.push_str(&self.if_clause(query, &mut bindings));

        Ok(CompiledCommand::new(sql, bindings))
    }

    fn compile_create_table(&self, table: &TableDefinition) -> Result<String, CompileError> {
        if table.columns.is_empty() {
            return Err(CompileError::EmptyColumns {
                statement: "CREATE TABLE",
            });
        }

        let mut clauses: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        clauses.push(self.primary_key(
            "CREATE TABLE",
            &table.name,
            &table.columns,
            &table.partition_keys,
            &table.clustering_keys,
        )?);

        Ok(format!(
            "CREATE TABLE {}{} ({}){}",
            if table.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.wrap_table(&table.name),
            clauses.join(", "),
            self.compile_table_options(&table.clustering_keys, &table.options)
        ))
    }

    fn compile_alter_table(&self, alter: &AlterTable) -> Result<Vec<String>, CompileError> {
        if alter.add.is_empty() && alter.drop.is_empty() && alter.options.is_empty() {
            return Err(CompileError::EmptyColumns {
                statement: "ALTER TABLE",
            });
        }

        let table = self.wrap_table(&alter.table);
        let mut statements = Vec::new();
        if !alter.add.is_empty() {
            let columns: Vec<String> = alter.add.iter().map(|c| self.column_definition(c)).collect();
            statements.push(format!("ALTER TABLE {table} ADD ({})", columns.join(", ")));
        }
        if !alter.drop.is_empty() {
            statements.push(format!(
                "ALTER TABLE {table} DROP ({})",
                self.columnize(&alter.drop)
            ));
        }
        if !alter.options.is_empty() {
            statements.push(format!(
                "ALTER TABLE {table}{}",
                self.compile_table_options(&[], &alter.options)
            ));
        }
        Ok(statements)
    }

    fn compile_create_materialized_view(
        &self,
        view: &MaterializedView,
    ) -> Result<String, CompileError> {
        if view.partition_keys.is_empty() {
            return Err(CompileError::MissingPartitionKey {
                statement: "CREATE MATERIALIZED VIEW",
            });
        }

        let key_columns: Vec<String> = view
            .partition_keys
            .iter()
            .cloned()
            .chain(view.clustering_keys.iter().map(|o| o.column.clone()))
            .collect();
        let not_null: Vec<String> = key_columns
            .iter()
            .map(|c| format!("{} IS NOT NULL", self.wrap_column(c)))
            .collect();
        let primary_key = self.primary_key(
            "CREATE MATERIALIZED VIEW",
            &view.name,
            &[],
            &view.partition_keys,
            &view.clustering_keys,
        )?;

        Ok(format!(
            "CREATE MATERIALIZED VIEW {}{} AS SELECT {} FROM {} WHERE {} {}{}",
            if view.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.wrap_table(&view.name),
            self.compile_columns(&view.columns),
            self.wrap_table(&view.base_table),
            not_null.join(" AND "),
            primary_key,
            self.compile_table_options(&view.clustering_keys, &view.options)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ringorm_proto::{count_placeholders, Operator, Selection};

    fn grammar() -> CqlGrammar {
        CqlGrammar::new()
    }

    #[test]
    fn test_compile_select() {
        let mut query = QueryIntent::new("posts");
        query
            .select(["id", "title"])
            .where_eq("author_id", 3)
            .where_in("status", ["draft", "live"])
            .order_by_desc("created_at")
            .limit(10)
            .allow_filtering();

        let command = grammar().compile_select(&query).unwrap();
        assert_eq!(
            command.text,
            "SELECT id, title FROM posts WHERE author_id = ? AND status IN (?, ?) \
             ORDER BY created_at DESC LIMIT 10 ALLOW FILTERING"
        );
        assert_eq!(
            command.params,
            vec![Value::Int(3), Value::from("draft"), Value::from("live")]
        );
    }

    #[test]
    fn test_compile_select_all_predicate_shapes() {
        let mut query = QueryIntent::new("events");
        query
            .where_token(["bucket", "day"], Operator::Gt, [1, 2])
            .where_between("at", 10, 20)
            .or_where_null("deleted_at")
            .where_not_null("kind")
            .where_raw("seen = true");

        let command = grammar().compile_select(&query).unwrap();
        assert_eq!(
            command.text,
            "SELECT * FROM events WHERE TOKEN(bucket, day) > TOKEN(?, ?) \
             AND at >= ? AND at <= ? OR deleted_at IS NULL AND kind IS NOT NULL AND seen = true"
        );
        assert_eq!(count_placeholders(&command.text), command.params.len());
        assert_eq!(command.params, query.where_bindings());
    }

    #[test]
    fn test_empty_in_list() {
        let mut query = QueryIntent::new("posts");
        query.where_in("id", Vec::<i64>::new());
        let command = grammar().compile_select(&query).unwrap();
        assert_eq!(command.text, "SELECT * FROM posts WHERE id IN ()");
        assert!(command.params.is_empty());
    }

    #[test]
    fn test_identifier_quoting() {
        let grammar = grammar().with_keyspace("blog");
        assert_eq!(grammar.wrap_table("posts"), "blog.posts");
        assert_eq!(grammar.wrap_table("other.posts"), "other.posts");
        assert_eq!(grammar.wrap_column("createdAt"), "\"createdAt\"");
        assert_eq!(grammar.wrap_column("posts.author_id"), "posts.author_id");
        assert_eq!(grammar.wrap_column("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(grammar.wrap_column("*"), "*");
    }

    #[test]
    fn test_select_rejects_relational_features() {
        let mut query = QueryIntent::new("posts");
        query.join("users", "users.id", Operator::Eq, "posts.author_id");
        assert!(matches!(
            grammar().compile_select(&query),
            Err(CompileError::Unsupported { feature: "joins", .. })
        ));

        let mut query = QueryIntent::new("posts");
        query.offset(5);
        assert!(grammar().compile_select(&query).is_err());

        let mut query = QueryIntent::new("posts");
        query.having_eq("total", 1);
        assert!(grammar().compile_select(&query).is_err());
    }

    #[test]
    fn test_compile_count() {
        let mut query = QueryIntent::new("posts");
        query.where_eq("author_id", 1).order_by_asc("id").limit(3);
        let command = grammar().compile_count(&query).unwrap();
        assert_eq!(command.text, "SELECT COUNT(*) FROM posts WHERE author_id = ?");
        assert_eq!(command.params, vec![Value::Int(1)]);
    }

    #[test]
    fn test_compile_insert() {
        let mut query = QueryIntent::new("users");
        query.if_not_exists().ttl(60);
        let values = vec![
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::from("ada")),
        ];
        let command = grammar().compile_insert(&query, &values).unwrap();
        assert_eq!(
            command.text,
            "INSERT INTO users (id, name) VALUES (?, ?) IF NOT EXISTS USING TTL 60"
        );
        assert_eq!(command.params, vec![Value::Int(1), Value::from("ada")]);
    }

    #[test]
    fn test_insert_requires_columns() {
        let query = QueryIntent::new("users");
        assert_eq!(
            grammar().compile_insert(&query, &[]),
            Err(CompileError::EmptyColumns { statement: "INSERT" })
        );
    }

    #[test]
    fn test_compile_update() {
        let mut query = QueryIntent::new("users");
        query
            .ttl(30)
            .where_eq("id", 7)
            .if_condition("version", Operator::Eq, 2);
        let values = vec![
            ("name".to_string(), Value::from("grace")),
            ("version".to_string(), Value::Int(3)),
        ];
        let command = grammar().compile_update(&query, &values).unwrap();
        assert_eq!(
            command.text,
            "UPDATE users USING TTL 30 SET name = ?, version = ? WHERE id = ? IF version = ?"
        );
        assert_eq!(
            command.params,
            vec![Value::from("grace"), Value::Int(3), Value::Int(7), Value::Int(2)]
        );
    }

    #[test]
    fn test_compile_delete() {
        let mut query = QueryIntent::new("users");
        query.where_eq("id", 7);
        let command = grammar().compile_delete(&query).unwrap();
        assert_eq!(command.text, "DELETE FROM users WHERE id = ?");

        let mut partial = QueryIntent::new("users");
        partial
            .select(["email", "phone"])
            .where_eq("id", 7)
            .if_condition("active", Operator::Eq, false);
        let command = grammar().compile_delete(&partial).unwrap();
        assert_eq!(
            command.text,
            "DELETE email, phone FROM users WHERE id = ? IF active = ?"
        );
        assert_eq!(command.params, vec![Value::Int(7), Value::Bool(false)]);
    }

    #[test]
    fn test_create_table_with_composite_key() {
        let table = TableDefinition::new("timeline")
            .column(ColumnDefinition::new("user_id", "uuid"))
            .column(ColumnDefinition::new("bucket", "int"))
            .column(ColumnDefinition::new("posted_at", "timestamp"))
            .column(ColumnDefinition::new("owner", "text").static_column())
            .partition_key("user_id")
            .partition_key("bucket")
            .clustering_key(Order::desc("posted_at"))
            .option("comment", "'feed'")
            .if_not_exists();

        assert_eq!(
            grammar().compile_create_table(&table).unwrap(),
            "CREATE TABLE IF NOT EXISTS timeline (user_id uuid, bucket int, posted_at timestamp, \
             owner text STATIC, PRIMARY KEY ((user_id, bucket), posted_at)) \
             WITH CLUSTERING ORDER BY (posted_at DESC) AND comment = 'feed'"
        );
    }

    #[test]
    fn test_create_table_falls_back_to_primary_columns() {
        let table = TableDefinition::new("users")
            .column(ColumnDefinition::new("id", "int").primary())
            .column(ColumnDefinition::new("name", "text"))
            .option("gc_grace_seconds", "0");
        assert_eq!(
            grammar().compile_create_table(&table).unwrap(),
            "CREATE TABLE users (id int, name text, PRIMARY KEY (id)) WITH gc_grace_seconds = 0"
        );
    }

    #[test]
    fn test_create_table_errors() {
        let empty = TableDefinition::new("users");
        assert!(matches!(
            grammar().compile_create_table(&empty),
            Err(CompileError::EmptyColumns { .. })
        ));

        let keyless = TableDefinition::new("users").column(ColumnDefinition::new("id", "int"));
        assert_eq!(
            grammar().compile_create_table(&keyless),
            Err(CompileError::MissingPrimaryKey {
                table: "users".into()
            })
        );

        let clustered = TableDefinition::new("users")
            .column(ColumnDefinition::new("id", "int"))
            .clustering_key(Order::asc("id"));
        assert!(matches!(
            grammar().compile_create_table(&clustered),
            Err(CompileError::MissingPartitionKey { .. })
        ));
    }

    #[test]
    fn test_compile_alter_table() {
        let alter = AlterTable::new("users")
            .add_column(ColumnDefinition::new("age", "int"))
            .add_column(ColumnDefinition::new("bio", "text"))
            .drop_column("nickname")
            .option("comment", "'people'");
        assert_eq!(
            grammar().compile_alter_table(&alter).unwrap(),
            vec![
                "ALTER TABLE users ADD (age int, bio text)".to_string(),
                "ALTER TABLE users DROP (nickname)".to_string(),
                "ALTER TABLE users WITH comment = 'people'".to_string(),
            ]
        );

        assert_eq!(
            grammar().compile_alter_table(&AlterTable::new("users")),
            Err(CompileError::EmptyColumns {
                statement: "ALTER TABLE"
            })
        );
    }

    #[test]
    fn test_compile_materialized_view() {
        let mut view = MaterializedView::new("posts_by_author", "posts")
            .partition_key("author_id")
            .clustering_key(Order::desc("id"));
        view.columns = Selection::Columns(vec!["id".into(), "author_id".into(), "title".into()]);

        assert_eq!(
            grammar().compile_create_materialized_view(&view).unwrap(),
            "CREATE MATERIALIZED VIEW posts_by_author AS SELECT id, author_id, title FROM posts \
             WHERE author_id IS NOT NULL AND id IS NOT NULL PRIMARY KEY ((author_id), id) \
             WITH CLUSTERING ORDER BY (id DESC)"
        );

        let keyless = MaterializedView::new("v", "posts");
        assert!(matches!(
            grammar().compile_create_materialized_view(&keyless),
            Err(CompileError::MissingPartitionKey { .. })
        ));
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(grammar().compile_drop_table("users", true), "DROP TABLE IF EXISTS users");
    }
}
