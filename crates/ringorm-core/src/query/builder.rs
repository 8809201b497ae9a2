//! Entity-scoped query builder.

use std::sync::Arc;

use ringorm_proto::{CompiledCommand, Operator, QueryIntent, Value};

use crate::error::{Error, Operation, Result};
use crate::model::entity::UPDATED_AT;
use crate::model::{EntityType, Record};
use crate::session::Session;

/// A query over one entity type, returning hydrated records.
///
/// Cloning a builder deep-copies its intent, so two branches from a shared
/// base never see each other's constraints.
#[derive(Clone)]
pub struct ModelQuery<'s> {
    session: &'s Session,
    entity: Arc<EntityType>,
    query: QueryIntent,
    eager: Vec<String>,
}

impl<'s> ModelQuery<'s> {
    pub fn new(session: &'s Session, entity: Arc<EntityType>) -> Self {
        let query = QueryIntent::new(entity.table());
        Self {
            session,
            entity,
            query,
            eager: Vec::new(),
        }
    }

    /// Apply arbitrary intent mutations.
    pub fn filter(mut self, f: impl FnOnce(&mut QueryIntent)) -> Self {
        f(&mut self.query);
        self
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select(columns);
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.where_eq(column, value);
        self
    }

    pub fn where_op(
        mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.query.where_op(column, operator, value);
        self
    }

    pub fn or_where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.or_where_eq(column, value);
        self
    }

    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.query.where_in(column, values);
        self
    }

    pub fn where_null(mut self, column: impl Into<String>) -> Self {
        self.query.where_null(column);
        self
    }

    pub fn where_not_null(mut self, column: impl Into<String>) -> Self {
        self.query.where_not_null(column);
        self
    }

    pub fn where_between(
        mut self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.query.where_between(column, low, high);
        self
    }

    pub fn order_by_asc(mut self, column: impl Into<String>) -> Self {
        self.query.order_by_asc(column);
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.query.order_by_desc(column);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset(offset);
        self
    }

    pub fn allow_filtering(mut self) -> Self {
        self.query.allow_filtering();
        self
    }

    /// Eager-load a dot-separated relation path on `get` and `first`.
    pub fn with(mut self, path: impl Into<String>) -> Self {
        self.eager.push(path.into());
        self
    }

    pub fn intent(&self) -> &QueryIntent {
        &self.query
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    /// Compile the select this builder would run.
    pub fn to_command(&self) -> Result<CompiledCommand> {
        Ok(self.session.grammar().compile_select(&self.query)?)
    }

    /// Fetch every matching record.
    pub async fn get(self) -> Result<Vec<Record>> {
        let mut records = self
            .session
            .select_records(&self.entity, &self.query)
            .await?;
        if !self.eager.is_empty() && !records.is_empty() {
            self.session.load(&mut records, self.eager.as_slice()).await?;
        }
        Ok(records)
    }

    /// Fetch the first matching record.
    pub async fn first(self) -> Result<Option<Record>> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }

    /// Fetch a record by primary key.
    pub async fn find(self, id: impl Into<Value>) -> Result<Option<Record>> {
        let key = self.entity.primary_key().to_string();
        self.where_eq(key, id).first().await
    }

    /// Count matching rows.
    pub async fn count(self) -> Result<u64> {
        let command = self.session.grammar().compile_count(&self.query)?;
        let result = self.session.run(Operation::Select, command).await?;
        let cell = result
            .rows
            .first()
            .and_then(|row| row.values().next())
            .ok_or_else(|| Error::InvalidData("count returned no rows".to_string()))?;
        let count = cell.as_i64().ok_or_else(|| {
            Error::InvalidData(format!("count returned a {} value", cell.type_name()))
        })?;
        u64::try_from(count).map_err(|_| Error::InvalidData(format!("count returned {count}")))
    }

    /// Update every matching row, returning the affected count.
    pub async fn update<I, K, V>(self, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut values: Vec<(String, Value)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if self.entity.timestamps() && !values.iter().any(|(k, _)| k == UPDATED_AT) {
            values.push((
                UPDATED_AT.to_string(),
                Value::Timestamp(chrono::Utc::now().timestamp_micros()),
            ));
        }

        let command = self.session.grammar().compile_update(&self.query, &values)?;
        Ok(self.session.run(Operation::Update, command).await?.row_count)
    }

    /// Delete every matching row, returning the affected count.
    pub async fn delete(self) -> Result<u64> {
        let command = self.session.grammar().compile_delete(&self.query)?;
        Ok(self.session.run(Operation::Delete, command).await?.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ringorm_memory::MemoryDriver;
    use ringorm_proto::Dialect;

    use async_trait::async_trait;
    use ringorm_proto::{Driver, DriverError, ResultSet, Row};

    use crate::config::SessionConfig;

    /// Answers every command with the same canned rows.
    struct CannedDriver(Vec<Row>);

    #[async_trait]
    impl Driver for CannedDriver {
        async fn execute(
            &self,
            _command: &str,
            _params: &[Value],
        ) -> std::result::Result<ResultSet, DriverError> {
            Ok(ResultSet::from_rows(self.0.clone()))
        }
    }

    fn canned(rows: Vec<Row>) -> Session {
        Session::new(Arc::new(CannedDriver(rows)), SessionConfig::new(Dialect::Cql))
            .with_entity(EntityType::new("Post", "posts"))
    }

    fn count_row(value: Value) -> Row {
        Row::from([("count".to_string(), value)])
    }

    fn session() -> Session {
        Session::new(
            Arc::new(MemoryDriver::new()),
            SessionConfig::new(Dialect::Cql).with_keyspace("blog"),
        )
        .with_entity(EntityType::new("Post", "posts"))
    }

    #[test]
    fn test_branches_do_not_share_state() {
        let session = session();
        let base = session.query("Post").unwrap().where_eq("author_id", 1);
        let drafts = base.clone().where_eq("status", "draft");
        let recent = base.clone().order_by_desc("created_at").limit(5);

        assert_eq!(base.intent().wheres.len(), 1);
        assert_eq!(drafts.intent().wheres.len(), 2);
        assert!(drafts.intent().orders.is_empty());
        assert_eq!(recent.intent().wheres.len(), 1);
        assert_eq!(recent.intent().limit, Some(5));
    }

    #[test]
    fn test_to_command() {
        let session = session();
        let command = session
            .query("Post")
            .unwrap()
            .select(["id", "title"])
            .where_eq("author_id", 1)
            .where_in("status", ["draft", "live"])
            .allow_filtering()
            .to_command()
            .unwrap();

        assert_eq!(
            command.text,
            "SELECT id, title FROM blog.posts WHERE author_id = ? AND status IN (?, ?) ALLOW FILTERING"
        );
        assert_eq!(
            command.params,
            vec![Value::Int(1), Value::from("draft"), Value::from("live")]
        );
    }

    #[tokio::test]
    async fn test_count_reads_first_cell() {
        let session = canned(vec![count_row(Value::Int(12))]);
        assert_eq!(session.query("Post").unwrap().count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_count_rejects_malformed_results() {
        for rows in [
            Vec::new(),
            vec![Row::new()],
            vec![count_row(Value::from("twelve"))],
            vec![count_row(Value::Int(-1))],
        ] {
            let session = canned(rows);
            let err = session.query("Post").unwrap().count().await.unwrap_err();
            assert!(matches!(err, Error::InvalidData(_)), "unexpected error: {err:?}");
        }
    }
}
