//! Entity records and their attribute store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ringorm_proto::{Row, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::entity::EntityType;
use crate::relation::RelationResult;

/// One row of a mapped entity type.
///
/// The record tracks the attributes it currently holds, a snapshot of the
/// attributes as last loaded or persisted, and the set of keys whose value
/// differs from that snapshot. The snapshot is captured lazily on the first
/// write to a record that was never hydrated.
#[derive(Debug, Clone)]
pub struct Record {
    entity: Arc<EntityType>,
    attributes: BTreeMap<String, Value>,
    original: Option<BTreeMap<String, Value>>,
    dirty: BTreeSet<String>,
    exists: bool,
    relations: BTreeMap<String, RelationResult>,
}

impl Record {
    /// Create an unsaved record with no attributes.
    pub fn new(entity: Arc<EntityType>) -> Self {
        Self {
            entity,
            attributes: BTreeMap::new(),
            original: None,
            dirty: BTreeSet::new(),
            exists: false,
            relations: BTreeMap::new(),
        }
    }

    /// Build a record from a stored row. The record is clean and exists.
    pub fn hydrate(entity: Arc<EntityType>, row: Row) -> Self {
        Self {
            entity,
            original: Some(row.clone()),
            attributes: row,
            dirty: BTreeSet::new(),
            exists: true,
            relations: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    /// Check if the record is backed by a stored row.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Stored value of an attribute, without transforms or casts.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Stored value of an attribute when it is set and not null.
    pub fn bound(&self, key: &str) -> Option<Value> {
        self.raw(key).filter(|v| !v.is_null()).cloned()
    }

    /// Every stored attribute.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Primary key value, if set.
    pub fn key(&self) -> Option<Value> {
        self.bound(self.entity.primary_key())
    }

    /// Read an attribute in its presented form.
    ///
    /// A registered getter wins over a cast; absent attributes read as null.
    pub fn get_attribute(&self, key: &str) -> Result<Value> {
        let stored = self.attributes.get(key).unwrap_or(&Value::Null);

        if let Some(value) = self.entity.transform(key).and_then(|t| t.apply_get(stored)) {
            return Ok(value);
        }

        match self.entity.cast(key) {
            Some(cast) => cast.get(key, stored),
            None => Ok(stored.clone()),
        }
    }

    /// Write an attribute, applying the setter transform and cast first.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let mut value = value.into();

        if let Some(transform) = self.entity.transform(&key) {
            value = transform.apply_set(value);
        }
        if let Some(cast) = self.entity.cast(&key) {
            value = cast.set(&key, value)?;
        }

        let original = self
            .original
            .get_or_insert_with(|| self.attributes.clone());
        if original.get(&key) == Some(&value) {
            self.dirty.remove(&key);
        } else {
            self.dirty.insert(key.clone());
        }

        self.attributes.insert(key, value);
        Ok(())
    }

    /// Bulk write through the mass-assignment gate.
    ///
    /// Keys that are not fillable are skipped, unless the entity guards
    /// every attribute, in which case the first such key is an error.
    pub fn fill<I, K, V>(&mut self, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in attributes {
            let key = key.into();
            if self.entity.is_fillable(&key) {
                self.set_attribute(key, value)?;
            } else if self.entity.is_totally_guarded() {
                return Err(Error::MassAssignment {
                    entity: self.entity.name().to_string(),
                    key,
                });
            } else {
                debug!(entity = self.entity.name(), attribute = %key, "skipping guarded attribute");
            }
        }
        Ok(())
    }

    /// Bulk write bypassing the mass-assignment gate.
    pub fn force_fill<I, K, V>(&mut self, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in attributes {
            self.set_attribute(key, value)?;
        }
        Ok(())
    }

    /// Check if any attribute changed since the last load or persist.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Check if one attribute changed since the last load or persist.
    pub fn is_attribute_dirty(&self, key: &str) -> bool {
        self.dirty.contains(key)
    }

    /// Changed attributes with their current stored values.
    pub fn get_dirty(&self) -> Vec<(String, Value)> {
        self.dirty
            .iter()
            .map(|key| {
                let value = self.attributes.get(key).cloned().unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect()
    }

    /// Value of an attribute as last loaded or persisted.
    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.as_ref().unwrap_or(&self.attributes).get(key)
    }

    /// Accept the current attributes as the new original snapshot.
    pub fn sync_original(&mut self) {
        self.original = Some(self.attributes.clone());
        self.dirty.clear();
    }

    /// Replace every attribute with a freshly loaded row.
    pub(crate) fn reload(&mut self, row: Row) {
        self.original = Some(row.clone());
        self.attributes = row;
        self.dirty.clear();
        self.exists = true;
    }

    /// Set an attribute that does not count as a change.
    pub(crate) fn merge_synthetic(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let original = self
            .original
            .get_or_insert_with(|| self.attributes.clone());
        original.insert(key.clone(), value.clone());
        self.dirty.remove(&key);
        self.attributes.insert(key, value);
    }

    /// Attach a loaded relation result.
    pub fn set_relation(&mut self, name: impl Into<String>, result: RelationResult) {
        self.relations.insert(name.into(), result);
    }

    /// A loaded relation result.
    pub fn relation(&self, name: &str) -> Option<&RelationResult> {
        self.relations.get(name)
    }

    pub(crate) fn take_relation(&mut self, name: &str) -> Option<RelationResult> {
        self.relations.remove(name)
    }

    /// Every loaded relation result.
    pub fn relations(&self) -> &BTreeMap<String, RelationResult> {
        &self.relations
    }

    /// Check if a relation has been loaded.
    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Serialize presented attributes and loaded relations.
    ///
    /// Hidden attributes and relations are omitted.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();

        for key in self.attributes.keys() {
            if self.entity.is_hidden(key) {
                continue;
            }
            object.insert(key.clone(), self.get_attribute(key)?.to_json());
        }

        for (name, result) in &self.relations {
            if self.entity.is_hidden(name) {
                continue;
            }
            let nested = match result {
                RelationResult::One(None) => serde_json::Value::Null,
                RelationResult::One(Some(record)) => record.to_json()?,
                RelationResult::Many(records) => serde_json::Value::Array(
                    records
                        .iter()
                        .map(Record::to_json)
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            object.insert(name.clone(), nested);
        }

        Ok(serde_json::Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cast::Cast;
    use crate::model::transform::AttributeTransform;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::new("User", "users")
                .with_cast("active", Cast::Bool)
                .with_cast("settings", Cast::Json)
                .with_transform(
                    "name",
                    AttributeTransform::new()
                        .setter(|v| Value::from(v.as_str().unwrap_or_default().trim().to_string()))
                        .getter(|v| Value::from(v.as_str().unwrap_or_default().to_uppercase())),
                )
                .with_fillable(["name", "email"])
                .with_hidden(["password"]),
        )
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_hydrated_record_is_clean() {
        let record = Record::hydrate(
            user_type(),
            row(&[("id", Value::Int(1)), ("name", Value::from("ada"))]),
        );
        assert!(record.exists());
        assert!(!record.is_dirty());
        assert_eq!(record.get_original("name"), Some(&Value::from("ada")));
        assert_eq!(record.key(), Some(Value::Int(1)));
    }

    #[test]
    fn test_single_change_is_tracked() {
        let mut record = Record::hydrate(
            user_type(),
            row(&[("id", Value::Int(1)), ("email", Value::from("a@x.io"))]),
        );

        record.set_attribute("email", "b@x.io").unwrap();
        assert_eq!(record.get_dirty(), vec![("email".to_string(), Value::from("b@x.io"))]);

        record.set_attribute("email", "a@x.io").unwrap();
        assert!(!record.is_dirty());

        record.set_attribute("email", "c@x.io").unwrap();
        record.sync_original();
        assert!(!record.is_dirty());
        assert_eq!(record.get_original("email"), Some(&Value::from("c@x.io")));
    }

    #[test]
    fn test_new_record_captures_original_lazily() {
        let mut record = Record::new(user_type());
        assert!(!record.exists());
        record.set_attribute("id", 5).unwrap();
        assert!(record.is_attribute_dirty("id"));
        assert_eq!(record.get_original("id"), None);
    }

    #[test]
    fn test_getter_wins_over_cast_and_setter_runs_first() {
        let mut record = Record::new(user_type());
        record.set_attribute("name", "  ada ").unwrap();
        assert_eq!(record.raw("name"), Some(&Value::from("ada")));
        assert_eq!(record.get_attribute("name").unwrap(), Value::from("ADA"));
    }

    #[test]
    fn test_casts_round_trip_through_attributes() {
        let mut record = Record::new(user_type());

        record.set_attribute("active", "true").unwrap();
        assert_eq!(record.get_attribute("active").unwrap(), Value::Bool(true));
        record.set_attribute("active", "false").unwrap();
        assert_eq!(record.get_attribute("active").unwrap(), Value::Bool(false));

        let settings = json!({"theme": "dark", "langs": ["en", "fr"]});
        record.set_attribute("settings", settings.clone()).unwrap();
        assert!(matches!(record.raw("settings"), Some(Value::Text(_))));
        assert_eq!(record.get_attribute("settings").unwrap(), Value::Json(settings));

        assert_eq!(record.get_attribute("missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_fill_skips_unfillable_keys() {
        let mut record = Record::new(user_type());
        record
            .fill([("name", Value::from("ada")), ("role", Value::from("admin"))])
            .unwrap();
        assert_eq!(record.raw("name"), Some(&Value::from("ada")));
        assert_eq!(record.raw("role"), None);

        record.force_fill([("role", "admin")]).unwrap();
        assert_eq!(record.raw("role"), Some(&Value::from("admin")));
    }

    #[test]
    fn test_fill_on_totally_guarded_entity_fails() {
        let locked = Arc::new(EntityType::new("Audit", "audits").with_guarded(["*"]));
        let mut record = Record::new(locked);
        let err = record.fill([("action", "login")]).unwrap_err();
        assert!(matches!(err, Error::MassAssignment { ref key, .. } if key == "action"));
    }

    #[test]
    fn test_synthetic_attribute_is_not_dirty() {
        let mut record = Record::hydrate(user_type(), row(&[("id", Value::Int(1))]));
        record.merge_synthetic("pivot", Value::Json(json!({"user_id": 1})));
        assert!(!record.is_dirty());
        assert_eq!(record.raw("pivot"), Some(&Value::Json(json!({"user_id": 1}))));
    }

    #[test]
    fn test_to_json_hides_and_nests() {
        let mut record = Record::hydrate(
            user_type(),
            row(&[
                ("id", Value::Int(1)),
                ("name", Value::from("ada")),
                ("password", Value::from("secret")),
                ("active", Value::Int(1)),
            ]),
        );
        let post_type = Arc::new(EntityType::new("Post", "posts"));
        let post = Record::hydrate(post_type, row(&[("id", Value::Int(9))]));
        record.set_relation("posts", RelationResult::Many(vec![post]));
        record.set_relation("profile", RelationResult::One(None));

        assert_eq!(
            record.to_json().unwrap(),
            json!({
                "id": 1,
                "name": "ADA",
                "active": true,
                "posts": [{"id": 9}],
                "profile": null,
            })
        );
    }
}
