//! The session: driver, grammar, configuration and entity registry.
//!
//! Every query, resolver and persist call goes through a [`Session`]. There
//! is no process-wide registry; tests build as many isolated sessions as they
//! need.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ringorm_grammar::{grammar_for, Grammar};
use ringorm_proto::{CompiledCommand, Driver, QueryIntent, ResultSet, Row, Value};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::eager;
use crate::error::{Error, Operation, Result};
use crate::model::entity::{CREATED_AT, UPDATED_AT};
use crate::model::{EntityType, Record};
use crate::query::ModelQuery;
use crate::relation::descriptor::RelationshipDescriptor;
use crate::relation::{resolver_for, BelongsToMany, RelationResult};

/// Context threaded through every query and relation call.
pub struct Session {
    driver: Arc<dyn Driver>,
    grammar: Arc<dyn Grammar>,
    config: SessionConfig,
    entities: HashMap<String, Arc<EntityType>>,
}

impl Session {
    /// Create a session using the grammar for the configured dialect.
    pub fn new(driver: Arc<dyn Driver>, config: SessionConfig) -> Self {
        let grammar = grammar_for(config.dialect, config.keyspace.as_deref());
        info!(
            dialect = ?config.dialect,
            keyspace = ?config.keyspace,
            joins = driver.supports_joins(),
            "session created"
        );
        Self {
            driver,
            grammar,
            config,
            entities: HashMap::new(),
        }
    }

    /// Replace the grammar.
    pub fn with_grammar(mut self, grammar: Arc<dyn Grammar>) -> Self {
        self.grammar = grammar;
        self
    }

    /// Register an entity type (builder form).
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.register(entity);
        self
    }

    /// Register an entity type under its name, replacing any previous one.
    pub fn register(&mut self, entity: EntityType) -> Arc<EntityType> {
        let entity = Arc::new(entity);
        self.entities
            .insert(entity.name().to_string(), entity.clone());
        entity
    }

    /// Look up a registered entity type.
    pub fn entity(&self, name: &str) -> Result<Arc<EntityType>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Discriminator written for `entity` by polymorphic relations.
    pub fn morph_tag(&self, entity: &EntityType) -> String {
        if self.config.lowercase_morph_tags {
            entity.morph_tag().to_lowercase()
        } else {
            entity.morph_tag().to_string()
        }
    }

    /// Start a query over an entity type.
    pub fn query(&self, entity: &str) -> Result<ModelQuery<'_>> {
        Ok(ModelQuery::new(self, self.entity(entity)?))
    }

    /// An unsaved record of an entity type.
    pub fn new_record(&self, entity: &str) -> Result<Record> {
        Ok(Record::new(self.entity(entity)?))
    }

    /// Execute a compiled command.
    pub async fn run(&self, operation: Operation, command: CompiledCommand) -> Result<ResultSet> {
        debug!(
            %operation,
            command = %command.text,
            params = command.params.len(),
            "executing command"
        );
        self.driver
            .execute(&command.text, &command.params)
            .await
            .map_err(|source| Error::execution(operation, source))
    }

    /// Compile and run a select, returning raw rows.
    pub async fn select_rows(&self, query: &QueryIntent) -> Result<Vec<Row>> {
        let command = self.grammar.compile_select(query)?;
        Ok(self.run(Operation::Select, command).await?.rows)
    }

    /// Compile and run a select, hydrating records.
    pub async fn select_records(&self, entity: &Arc<EntityType>, query: &QueryIntent) -> Result<Vec<Record>> {
        let rows = self.select_rows(query).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::hydrate(entity.clone(), row))
            .collect())
    }

    /// Fill a new record through the mass-assignment gate and insert it.
    pub async fn create<I, K, V>(&self, entity: &str, attributes: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = self.new_record(entity)?;
        record.fill(attributes)?;
        self.save(&mut record).await?;
        Ok(record)
    }

    /// Persist a record.
    ///
    /// New records insert every attribute. Existing records update only the
    /// dirty attributes, keyed by the primary key as last persisted; a clean
    /// record issues no command.
    pub async fn save(&self, record: &mut Record) -> Result<()> {
        let entity = record.entity().clone();

        if !record.exists() {
            if record.key().is_none() {
                return Err(Error::MissingPrimaryKey {
                    entity: entity.name().to_string(),
                });
            }
            if entity.timestamps() {
                let now = now();
                if record.bound(CREATED_AT).is_none() {
                    record.set_attribute(CREATED_AT, now.clone())?;
                }
                record.set_attribute(UPDATED_AT, now)?;
            }

            let values: Vec<(String, Value)> = record
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let query = QueryIntent::new(entity.table());
            let command = self.grammar.compile_insert(&query, &values)?;
            self.run(Operation::Insert, command).await?;

            record.set_exists(true);
            record.sync_original();
            return Ok(());
        }

        if !record.is_dirty() {
            return Ok(());
        }
        if entity.timestamps() {
            record.set_attribute(UPDATED_AT, now())?;
        }

        let key = self.persisted_key(record)?;
        let mut query = QueryIntent::new(entity.table());
        query.where_eq(entity.primary_key(), key);
        let command = self.grammar.compile_update(&query, &record.get_dirty())?;
        self.run(Operation::Update, command).await?;

        record.sync_original();
        Ok(())
    }

    /// Delete a record's row. The record is kept and marked as not existing.
    pub async fn delete(&self, record: &mut Record) -> Result<()> {
        if !record.exists() {
            return Ok(());
        }

        let entity = record.entity().clone();
        let key = self.persisted_key(record)?;
        let mut query = QueryIntent::new(entity.table());
        query.where_eq(entity.primary_key(), key);
        let command = self.grammar.compile_delete(&query)?;
        self.run(Operation::Delete, command).await?;

        record.set_exists(false);
        Ok(())
    }

    /// Reload a record's attributes from its row.
    pub async fn refresh(&self, record: &mut Record) -> Result<()> {
        let entity = record.entity().clone();
        let key = self.persisted_key(record)?;

        let mut query = QueryIntent::new(entity.table());
        query.where_eq(entity.primary_key(), key).limit(1);
        let row = self
            .select_rows(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                entity: entity.name().to_string(),
            })?;

        record.reload(row);
        Ok(())
    }

    fn persisted_key(&self, record: &Record) -> Result<Value> {
        let entity = record.entity();
        record
            .get_original(entity.primary_key())
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| record.key())
            .ok_or_else(|| Error::MissingPrimaryKey {
                entity: entity.name().to_string(),
            })
    }

    /// Resolve one relation of a record.
    pub async fn relation(&self, parent: &Record, name: &str) -> Result<RelationResult> {
        resolver_for(self, parent, name)?.get_results().await
    }

    /// Resolve a relation and attach it to the record.
    pub async fn load_relation(&self, parent: &mut Record, name: &str) -> Result<()> {
        let result = self.relation(parent, name).await?;
        parent.set_relation(name, result);
        Ok(())
    }

    /// The pivot relation `name` of a record, for reads and pivot mutations.
    pub fn belongs_to_many<'a>(&'a self, parent: &'a Record, name: &str) -> Result<BelongsToMany<'a>> {
        match parent.entity().relation_descriptor(name)? {
            RelationshipDescriptor::BelongsToMany(pivot) => {
                Ok(BelongsToMany::new(self, parent, name, pivot))
            }
            _ => Err(Error::RelationKind {
                relation: name.to_string(),
                expected: "belongs-to-many",
            }),
        }
    }

    /// Eager-load dot-separated relation paths onto a record set.
    pub async fn load<S: AsRef<str>>(&self, records: &mut [Record], paths: &[S]) -> Result<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();
        eager::load(self, records, &paths).await
    }
}

fn now() -> Value {
    Value::Timestamp(Utc::now().timestamp_micros())
}
