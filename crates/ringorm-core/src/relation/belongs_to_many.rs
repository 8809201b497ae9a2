//! Many-to-many relations through a pivot table.
//!
//! Reads take one of two paths, chosen by the driver's join capability:
//!
//! - Without joins: read the parent's pivot rows, collect the related ids,
//!   then read the related rows with `WHERE related_key IN (ids)`.
//! - With joins: one query joining the pivot table onto the related table,
//!   selecting pivot columns under a `pivot_` alias prefix.
//!
//! Either way each related record gets the pivot row merged in as a json
//! attribute named by [`SessionConfig::pivot_accessor`](crate::SessionConfig).
//! The two-query path is not isolated from concurrent pivot writes.

use std::sync::Arc;

use async_trait::async_trait;
use ringorm_proto::{Operator, QueryIntent, Row, Value};
use tracing::{debug, trace};

use crate::error::{Error, Operation, Result};
use crate::model::{EntityType, Record};
use crate::relation::descriptor::PivotTable;
use crate::relation::{RelationResult, Resolver};
use crate::session::Session;

/// Alias prefix for pivot columns on the joined path.
const PIVOT_PREFIX: &str = "pivot_";

/// Ids touched by a sync or toggle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncChanges {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
    pub updated: Vec<Value>,
}

/// A pivot relation bound to one parent record.
pub struct BelongsToMany<'a> {
    session: &'a Session,
    parent: &'a Record,
    name: String,
    pivot: PivotTable,
}

impl<'a> BelongsToMany<'a> {
    pub fn new(session: &'a Session, parent: &'a Record, name: &str, pivot: PivotTable) -> Self {
        Self {
            session,
            parent,
            name: name.to_string(),
            pivot,
        }
    }

    pub fn pivot(&self) -> &PivotTable {
        &self.pivot
    }

    fn parent_key(&self) -> Option<Value> {
        self.parent.bound(&self.pivot.parent_key)
    }

    fn require_key(&self, action: &'static str) -> Result<Value> {
        self.parent_key().ok_or_else(|| Error::MissingParentKey {
            relation: self.name.clone(),
            key: self.pivot.parent_key.clone(),
            action,
        })
    }

    /// Pivot columns exposed on the pivot attribute.
    fn pivot_columns(&self) -> Vec<String> {
        let mut columns = vec![
            self.pivot.foreign_pivot_key.clone(),
            self.pivot.related_pivot_key.clone(),
        ];
        for column in &self.pivot.pivot_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }

    fn pivot_value(&self, row: &Row) -> Value {
        let object = self
            .pivot_columns()
            .into_iter()
            .map(|column| {
                let value = row.get(&column).map(Value::to_json).unwrap_or_default();
                (column, value)
            })
            .collect();
        Value::Json(serde_json::Value::Object(object))
    }

    /// Query against the pivot table scoped to this parent.
    fn pivot_query(&self, key: Value) -> QueryIntent {
        let mut query = QueryIntent::new(self.pivot.table.as_str());
        query.where_eq(self.pivot.foreign_pivot_key.as_str(), key);
        for (column, value) in &self.pivot.pivot_wheres {
            query.where_eq(column.as_str(), value.clone());
        }
        query
    }

    async fn pivot_rows(&self, key: Value) -> Result<Vec<Row>> {
        let mut query = self.pivot_query(key);
        query.select(self.pivot_columns());
        if self.session.config().allow_filtering {
            query.allow_filtering();
        }
        self.session.select_rows(&query).await
    }

    fn related_ids(&self, rows: &[Row]) -> Vec<Value> {
        let mut ids = Vec::new();
        for row in rows {
            if let Some(id) = row.get(&self.pivot.related_pivot_key).filter(|v| !v.is_null()) {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    async fn emulated_results(&self, related: &Arc<EntityType>, key: Value) -> Result<RelationResult> {
        let pivot_rows = self.pivot_rows(key).await?;
        let ids = self.related_ids(&pivot_rows);
        if ids.is_empty() {
            return Ok(RelationResult::Many(Vec::new()));
        }

        let mut query = QueryIntent::new(related.table());
        query.where_in(self.pivot.related_key.as_str(), ids);
        if self.session.config().allow_filtering {
            query.allow_filtering();
        }

        let accessor = &self.session.config().pivot_accessor;
        let mut records = self.session.select_records(related, &query).await?;
        for record in &mut records {
            let Some(id) = record.bound(&self.pivot.related_key) else {
                continue;
            };
            let row = pivot_rows
                .iter()
                .find(|row| row.get(&self.pivot.related_pivot_key) == Some(&id));
            if let Some(row) = row {
                let value = self.pivot_value(row);
                record.merge_synthetic(accessor.as_str(), value);
            }
        }
        Ok(RelationResult::Many(records))
    }

    async fn joined_results(&self, related: &Arc<EntityType>) -> Result<RelationResult> {
        let mut query = QueryIntent::new(related.table());
        if !self.add_constraints(&mut query) {
            return Ok(RelationResult::Many(Vec::new()));
        }

        let mut columns = vec![format!("{}.*", related.table())];
        columns.extend(self.pivot_columns().iter().map(|column| {
            format!("{}.{column} as {PIVOT_PREFIX}{column}", self.pivot.table)
        }));
        query.select(columns);

        let aliases: Vec<(String, String)> = self
            .pivot_columns()
            .into_iter()
            .map(|column| (format!("{PIVOT_PREFIX}{column}"), column))
            .collect();

        let accessor = &self.session.config().pivot_accessor;
        let rows = self.session.select_rows(&query).await?;
        let records = rows
            .into_iter()
            .map(|mut attributes| {
                // Only the aliases selected above belong to the pivot.
                let pivot: Row = aliases
                    .iter()
                    .filter_map(|(alias, column)| {
                        attributes.remove(alias).map(|value| (column.clone(), value))
                    })
                    .collect();

                let mut record = Record::hydrate(related.clone(), attributes);
                record.merge_synthetic(accessor.as_str(), self.pivot_value(&pivot));
                record
            })
            .collect();
        Ok(RelationResult::Many(records))
    }

    /// Related ids currently attached to the parent.
    pub async fn current_ids(&self) -> Result<Vec<Value>> {
        let Some(key) = self.parent_key() else {
            return Ok(Vec::new());
        };
        let rows = self.pivot_rows(key).await?;
        Ok(self.related_ids(&rows))
    }

    async fn insert_pivot(&self, key: &Value, id: Value, extra: &[(String, Value)]) -> Result<()> {
        let mut values = vec![
            (self.pivot.foreign_pivot_key.clone(), key.clone()),
            (self.pivot.related_pivot_key.clone(), id),
        ];
        for (column, value) in self.pivot.pivot_wheres.iter().chain(extra) {
            match values.iter_mut().find(|(existing, _)| existing == column) {
                Some(slot) => slot.1 = value.clone(),
                None => values.push((column.clone(), value.clone())),
            }
        }

        let query = QueryIntent::new(self.pivot.table.as_str());
        let command = self.session.grammar().compile_insert(&query, &values)?;
        self.session.run(Operation::Insert, command).await?;
        Ok(())
    }

    async fn delete_pivot(&self, key: Value, ids: Option<Vec<Value>>) -> Result<u64> {
        let mut query = self.pivot_query(key);
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(0);
            }
            query.where_in(self.pivot.related_pivot_key.as_str(), ids);
        }
        let command = self.session.grammar().compile_delete(&query)?;
        let result = self.session.run(Operation::Delete, command).await?;
        Ok(result.row_count)
    }

    /// Insert a pivot row per id, carrying `extra` pivot columns.
    pub async fn attach<I, V>(&self, ids: I, extra: &[(String, Value)]) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = self.require_key("attach")?;
        for id in ids {
            self.insert_pivot(&key, id.into(), extra).await?;
        }
        Ok(())
    }

    /// Delete the pivot rows for the given ids.
    pub async fn detach<I, V>(&self, ids: I) -> Result<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = self.require_key("detach")?;
        let ids = ids.into_iter().map(Into::into).collect();
        self.delete_pivot(key, Some(ids)).await
    }

    /// Delete every pivot row of the parent.
    pub async fn detach_all(&self) -> Result<u64> {
        let key = self.require_key("detach")?;
        self.delete_pivot(key, None).await
    }

    /// Set extra pivot columns on an attached id.
    pub async fn update_existing_pivot(&self, id: impl Into<Value>, values: &[(String, Value)]) -> Result<u64> {
        let key = self.require_key("update pivot of")?;
        if values.is_empty() {
            return Ok(0);
        }

        let mut query = self.pivot_query(key);
        query.where_op(self.pivot.related_pivot_key.as_str(), Operator::Eq, id.into());
        let command = self.session.grammar().compile_update(&query, values)?;
        let result = self.session.run(Operation::Update, command).await?;
        Ok(result.row_count)
    }

    /// Make the attached set equal `ids`.
    ///
    /// Missing ids are attached first, then ids outside the list are detached.
    pub async fn sync<I, V>(&self, ids: I) -> Result<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let entries = ids.into_iter().map(|id| (id.into(), Vec::new())).collect();
        self.sync_entries(entries, true).await
    }

    /// Like [`sync`](Self::sync) with per-id pivot columns. Ids already
    /// attached with non-empty columns are updated and reported as such.
    pub async fn sync_with_pivot_values(
        &self,
        entries: Vec<(Value, Vec<(String, Value)>)>,
    ) -> Result<SyncChanges> {
        self.sync_entries(entries, true).await
    }

    /// Attach missing ids without detaching anything.
    pub async fn sync_without_detaching<I, V>(&self, ids: I) -> Result<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let entries = ids.into_iter().map(|id| (id.into(), Vec::new())).collect();
        self.sync_entries(entries, false).await
    }

    async fn sync_entries(
        &self,
        entries: Vec<(Value, Vec<(String, Value)>)>,
        detaching: bool,
    ) -> Result<SyncChanges> {
        let key = self.require_key("sync")?;
        let current = self.current_ids().await?;

        let mut requested: Vec<Value> = Vec::new();
        let mut changes = SyncChanges::default();

        for (id, extra) in entries {
            if requested.contains(&id) {
                continue;
            }
            requested.push(id.clone());

            if !current.contains(&id) {
                self.insert_pivot(&key, id.clone(), &extra).await?;
                changes.attached.push(id);
            } else if !extra.is_empty() {
                self.update_existing_pivot(id.clone(), &extra).await?;
                changes.updated.push(id);
            }
        }

        if detaching {
            let removed: Vec<Value> = current
                .into_iter()
                .filter(|id| !requested.contains(id))
                .collect();
            if !removed.is_empty() {
                self.delete_pivot(key, Some(removed.clone())).await?;
                changes.detached = removed;
            }
        }

        debug!(
            relation = %self.name,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            updated = changes.updated.len(),
            "synced pivot rows"
        );
        Ok(changes)
    }

    /// Flip the given ids: detach those attached, attach the rest.
    ///
    /// Attached ids outside the list are left alone.
    pub async fn toggle<I, V>(&self, ids: I) -> Result<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = self.require_key("toggle")?;
        let current = self.current_ids().await?;

        let mut changes = SyncChanges::default();
        for id in ids.into_iter().map(Into::into) {
            if changes.attached.contains(&id) || changes.detached.contains(&id) {
                continue;
            }
            if current.contains(&id) {
                changes.detached.push(id);
            } else {
                changes.attached.push(id);
            }
        }

        if !changes.detached.is_empty() {
            self.delete_pivot(key.clone(), Some(changes.detached.clone())).await?;
        }
        for id in &changes.attached {
            self.insert_pivot(&key, id.clone(), &[]).await?;
        }
        Ok(changes)
    }
}

#[async_trait]
impl<'a> Resolver for BelongsToMany<'a> {
    /// Join the pivot table and scope it to the parent.
    fn add_constraints(&self, query: &mut QueryIntent) -> bool {
        let Some(key) = self.parent_key() else {
            return false;
        };

        let pivot = &self.pivot;
        let related_table = query.table.clone();
        query.join(
            pivot.table.as_str(),
            format!("{}.{}", pivot.table, pivot.related_pivot_key),
            Operator::Eq,
            format!("{related_table}.{}", pivot.related_key),
        );
        query.where_eq(format!("{}.{}", pivot.table, pivot.foreign_pivot_key), key);
        for (column, value) in &pivot.pivot_wheres {
            query.where_eq(format!("{}.{column}", pivot.table), value.clone());
        }
        true
    }

    async fn get_results(&self) -> Result<RelationResult> {
        let Some(key) = self.parent_key() else {
            return Ok(RelationResult::Many(Vec::new()));
        };

        let related = self.session.entity(&self.pivot.related)?;
        if self.session.driver().supports_joins() {
            trace!(relation = %self.name, "resolving pivot relation with a join");
            self.joined_results(&related).await
        } else {
            trace!(relation = %self.name, "resolving pivot relation in two queries");
            self.emulated_results(&related, key).await
        }
    }
}
