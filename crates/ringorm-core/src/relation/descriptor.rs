//! Relationship descriptors.
//!
//! A descriptor states the shape of a relation and the columns that link
//! the two sides. Entity types register a factory per relation name; the
//! session turns a descriptor into a resolver bound to one parent record.

use std::collections::BTreeMap;

use ringorm_proto::Value;

/// Default key column on the owning side.
pub const DEFAULT_KEY: &str = "id";

/// A one-to-one or one-to-many relation where the related rows hold the
/// foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct Owns {
    /// Related entity name.
    pub related: String,
    /// Column on the related rows pointing at the parent.
    pub foreign_key: String,
    /// Column on the parent the foreign key refers to.
    pub local_key: String,
}

/// The inverse of [`Owns`]: the parent holds the foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct BelongsTo {
    /// Related (owner) entity name.
    pub related: String,
    /// Column on the parent pointing at the owner.
    pub foreign_key: String,
    /// Column on the owner the foreign key refers to.
    pub owner_key: String,
}

/// A many-to-many relation through a pivot table.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    /// Related entity name.
    pub related: String,
    /// Pivot table name.
    pub table: String,
    /// Pivot column holding the parent key.
    pub foreign_pivot_key: String,
    /// Pivot column holding the related key.
    pub related_pivot_key: String,
    /// Parent column stored in `foreign_pivot_key`.
    pub parent_key: String,
    /// Related column stored in `related_pivot_key`.
    pub related_key: String,
    /// Extra pivot columns exposed on the pivot attribute.
    pub pivot_columns: Vec<String>,
    /// Equality filters applied to every pivot read.
    pub pivot_wheres: Vec<(String, Value)>,
}

impl PivotTable {
    /// Create a pivot description with `id` keys on both sides.
    pub fn new(
        related: impl Into<String>,
        table: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Self {
            related: related.into(),
            table: table.into(),
            foreign_pivot_key: foreign_pivot_key.into(),
            related_pivot_key: related_pivot_key.into(),
            parent_key: DEFAULT_KEY.to_string(),
            related_key: DEFAULT_KEY.to_string(),
            pivot_columns: Vec::new(),
            pivot_wheres: Vec::new(),
        }
    }

    /// Set the parent column stored in the pivot.
    pub fn with_parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = key.into();
        self
    }

    /// Set the related column stored in the pivot.
    pub fn with_related_key(mut self, key: impl Into<String>) -> Self {
        self.related_key = key.into();
        self
    }

    /// Expose extra pivot columns.
    pub fn with_pivot<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pivot_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Only consider pivot rows where `column = value`.
    pub fn where_pivot(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pivot_wheres.push((column.into(), value.into()));
        self
    }
}

/// A polymorphic owning relation: related rows carry a type tag and an id.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphOwns {
    /// Related entity name.
    pub related: String,
    /// Discriminator column on the related rows.
    pub morph_type: String,
    /// Id column on the related rows.
    pub morph_id: String,
    /// Parent column stored in `morph_id`.
    pub local_key: String,
}

impl MorphOwns {
    /// Columns `{name}_type` and `{name}_id`, keyed on the parent's `id`.
    pub fn new(related: impl Into<String>, name: &str) -> Self {
        Self {
            related: related.into(),
            morph_type: format!("{name}_type"),
            morph_id: format!("{name}_id"),
            local_key: DEFAULT_KEY.to_string(),
        }
    }
}

/// The polymorphic inverse: the parent carries a type tag and an id.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTo {
    /// Discriminator column on the parent.
    pub morph_type: String,
    /// Id column on the parent.
    pub morph_id: String,
    /// Key column on every possible owner.
    pub owner_key: String,
    /// Discriminator tag to entity name.
    pub types: BTreeMap<String, String>,
}

impl MorphTo {
    /// Columns `{name}_type` and `{name}_id`, with an empty type registry.
    pub fn new(name: &str) -> Self {
        Self {
            morph_type: format!("{name}_type"),
            morph_id: format!("{name}_id"),
            owner_key: DEFAULT_KEY.to_string(),
            types: BTreeMap::new(),
        }
    }

    /// Map a discriminator tag to an entity name.
    pub fn register(mut self, tag: impl Into<String>, entity: impl Into<String>) -> Self {
        self.types.insert(tag.into(), entity.into());
        self
    }

    /// Entity name registered for a tag.
    pub fn resolve(&self, tag: &str) -> Option<&str> {
        self.types.get(tag).map(String::as_str)
    }
}

/// The shape of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipDescriptor {
    OwnsOne(Owns),
    OwnsMany(Owns),
    BelongsToOne(BelongsTo),
    BelongsToMany(PivotTable),
    PolymorphicOwnsOne(MorphOwns),
    PolymorphicOwnsMany(MorphOwns),
    PolymorphicBelongsTo(MorphTo),
}

impl RelationshipDescriptor {
    /// One related row holds `foreign_key = parent.local_key`.
    pub fn owns_one(
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        RelationshipDescriptor::OwnsOne(Owns {
            related: related.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
        })
    }

    /// Many related rows hold `foreign_key = parent.local_key`.
    pub fn owns_many(
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        RelationshipDescriptor::OwnsMany(Owns {
            related: related.into(),
            foreign_key: foreign_key.into(),
            local_key: local_key.into(),
        })
    }

    /// The parent holds `foreign_key = owner.owner_key`.
    pub fn belongs_to(
        related: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        RelationshipDescriptor::BelongsToOne(BelongsTo {
            related: related.into(),
            foreign_key: foreign_key.into(),
            owner_key: owner_key.into(),
        })
    }

    /// Many-to-many through a pivot table.
    pub fn belongs_to_many(pivot: PivotTable) -> Self {
        RelationshipDescriptor::BelongsToMany(pivot)
    }

    /// One related row tagged with the parent's type.
    pub fn morph_one(related: impl Into<String>, name: &str) -> Self {
        RelationshipDescriptor::PolymorphicOwnsOne(MorphOwns::new(related, name))
    }

    /// Many related rows tagged with the parent's type.
    pub fn morph_many(related: impl Into<String>, name: &str) -> Self {
        RelationshipDescriptor::PolymorphicOwnsMany(MorphOwns::new(related, name))
    }

    /// The parent points at an owner of any registered type.
    pub fn morph_to(morph: MorphTo) -> Self {
        RelationshipDescriptor::PolymorphicBelongsTo(morph)
    }

    /// Variant name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RelationshipDescriptor::OwnsOne(_) => "owns-one",
            RelationshipDescriptor::OwnsMany(_) => "owns-many",
            RelationshipDescriptor::BelongsToOne(_) => "belongs-to",
            RelationshipDescriptor::BelongsToMany(_) => "belongs-to-many",
            RelationshipDescriptor::PolymorphicOwnsOne(_) => "morph-one",
            RelationshipDescriptor::PolymorphicOwnsMany(_) => "morph-many",
            RelationshipDescriptor::PolymorphicBelongsTo(_) => "morph-to",
        }
    }

    /// Check if the relation resolves to a list.
    pub fn is_many(&self) -> bool {
        matches!(
            self,
            RelationshipDescriptor::OwnsMany(_)
                | RelationshipDescriptor::BelongsToMany(_)
                | RelationshipDescriptor::PolymorphicOwnsMany(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pivot_builder() {
        let pivot = PivotTable::new("Tag", "post_tag", "post_id", "tag_id")
            .with_pivot(["weight"])
            .where_pivot("active", true)
            .with_related_key("tag_id");

        assert_eq!(pivot.parent_key, "id");
        assert_eq!(pivot.related_key, "tag_id");
        assert_eq!(pivot.pivot_columns, vec!["weight".to_string()]);
        assert_eq!(pivot.pivot_wheres, vec![("active".to_string(), Value::Bool(true))]);
    }

    #[test]
    fn test_morph_columns() {
        let owns = MorphOwns::new("Comment", "commentable");
        assert_eq!(owns.morph_type, "commentable_type");
        assert_eq!(owns.morph_id, "commentable_id");

        let to = MorphTo::new("commentable").register("post", "Post");
        assert_eq!(to.resolve("post"), Some("Post"));
        assert_eq!(to.resolve("video"), None);
    }

    #[test]
    fn test_cardinality() {
        assert!(RelationshipDescriptor::owns_many("Post", "author_id", "id").is_many());
        assert!(!RelationshipDescriptor::belongs_to("User", "author_id", "id").is_many());
        assert!(!RelationshipDescriptor::morph_one("Image", "imageable").is_many());
    }
}
