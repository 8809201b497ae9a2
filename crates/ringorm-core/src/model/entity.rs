//! Entity type definitions.
//!
//! An [`EntityType`] is built once, at definition time, and shared by every
//! record of that type. It carries the table mapping, the attribute casts and
//! transforms, the mass-assignment policy and the relation registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::cast::Cast;
use crate::model::transform::AttributeTransform;
use crate::relation::descriptor::{RelationshipDescriptor, DEFAULT_KEY};

/// Factory producing a relation descriptor.
pub type RelationFactory = Arc<dyn Fn() -> RelationshipDescriptor + Send + Sync>;

/// Column set on insert when timestamps are enabled.
pub const CREATED_AT: &str = "created_at";

/// Column set on insert and update when timestamps are enabled.
pub const UPDATED_AT: &str = "updated_at";

/// A mapped entity type.
#[derive(Clone)]
pub struct EntityType {
    name: String,
    table: String,
    primary_key: String,
    morph_tag: String,
    casts: BTreeMap<String, Cast>,
    transforms: BTreeMap<String, AttributeTransform>,
    fillable: Vec<String>,
    guarded: Vec<String>,
    hidden: Vec<String>,
    timestamps: bool,
    relations: BTreeMap<String, RelationFactory>,
}

impl EntityType {
    /// Create an entity type mapped to `table`, keyed by `id`.
    ///
    /// The discriminator tag defaults to the entity name.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            morph_tag: name.clone(),
            name,
            table: table.into(),
            primary_key: DEFAULT_KEY.to_string(),
            casts: BTreeMap::new(),
            transforms: BTreeMap::new(),
            fillable: Vec::new(),
            guarded: Vec::new(),
            hidden: Vec::new(),
            timestamps: false,
            relations: BTreeMap::new(),
        }
    }

    /// Set the primary key column.
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Set the discriminator tag written by polymorphic relations.
    pub fn with_morph_tag(mut self, tag: impl Into<String>) -> Self {
        self.morph_tag = tag.into();
        self
    }

    /// Register a cast for an attribute.
    pub fn with_cast(mut self, key: impl Into<String>, cast: Cast) -> Self {
        self.casts.insert(key.into(), cast);
        self
    }

    /// Register getter/setter transforms for an attribute.
    pub fn with_transform(mut self, key: impl Into<String>, transform: AttributeTransform) -> Self {
        self.transforms.insert(key.into(), transform);
        self
    }

    /// Allow-list for bulk fill.
    pub fn with_fillable<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Deny-list for bulk fill; `"*"` blocks everything not allow-listed.
    pub fn with_guarded<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guarded.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Attributes omitted from serialized output.
    pub fn with_hidden<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Maintain `created_at` and `updated_at` on persist.
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Register a relation under `name`.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> RelationshipDescriptor + Send + Sync + 'static,
    ) -> Self {
        self.relations.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn morph_tag(&self) -> &str {
        &self.morph_tag
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// Cast registered for `key`.
    pub fn cast(&self, key: &str) -> Option<Cast> {
        self.casts.get(key).copied()
    }

    /// Transform registered for `key`.
    pub fn transform(&self, key: &str) -> Option<&AttributeTransform> {
        self.transforms.get(key)
    }

    /// Check if `key` may be written by bulk fill.
    pub fn is_fillable(&self, key: &str) -> bool {
        if !self.fillable.is_empty() {
            return self.fillable.iter().any(|k| k == key);
        }
        !self.guarded.iter().any(|k| k == key || k == "*")
    }

    /// Check if every attribute is blocked from bulk fill.
    pub fn is_totally_guarded(&self) -> bool {
        self.fillable.is_empty() && self.guarded.iter().any(|k| k == "*")
    }

    /// Check if `key` is omitted from serialized output.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.iter().any(|k| k == key)
    }

    /// Build the descriptor registered under `name`.
    pub fn relation_descriptor(&self, name: &str) -> Result<RelationshipDescriptor> {
        self.relations
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownRelation {
                entity: self.name.clone(),
                relation: name.to_string(),
            })
    }

    /// Names of every registered relation.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("morph_tag", &self.morph_tag)
            .field("casts", &self.casts)
            .field("fillable", &self.fillable)
            .field("guarded", &self.guarded)
            .field("hidden", &self.hidden)
            .field("timestamps", &self.timestamps)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}
