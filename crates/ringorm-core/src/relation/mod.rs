//! Relationship resolution.
//!
//! Every relation shape has a resolver bound to one parent record. A resolver
//! binds the parent's key into a query against the related table and runs it.
//! When the key it needs is unset the resolver reports no results and issues
//! no query.
//!
//! # Modules
//!
//! - [`descriptor`] - Relation shapes and the columns that link them
//! - [`has`] - Owning relations, plain and polymorphic
//! - [`belongs_to`] - The inverse direction with `associate`/`dissociate`
//! - [`belongs_to_many`] - Pivot-table relations and their mutators
//! - [`morph_to`] - Polymorphic inverse resolved through a type registry

pub mod belongs_to;
pub mod belongs_to_many;
pub mod descriptor;
pub mod has;
pub mod morph_to;

use std::sync::Arc;

use async_trait::async_trait;
use ringorm_proto::QueryIntent;

use crate::error::Result;
use crate::model::{EntityType, Record};
use crate::session::Session;

pub use belongs_to::BelongsToResolver;
pub use belongs_to_many::{BelongsToMany, SyncChanges};
pub use descriptor::{BelongsTo, MorphOwns, MorphTo, Owns, PivotTable, RelationshipDescriptor};
pub use has::HasResolver;
pub use morph_to::MorphToResolver;

/// Related records attached under a relation name.
#[derive(Debug, Clone)]
pub enum RelationResult {
    /// Single-cardinality result.
    One(Option<Box<Record>>),
    /// List result.
    Many(Vec<Record>),
}

impl RelationResult {
    /// The empty result for a cardinality.
    pub fn empty(many: bool) -> Self {
        if many {
            RelationResult::Many(Vec::new())
        } else {
            RelationResult::One(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of related records.
    pub fn len(&self) -> usize {
        match self {
            RelationResult::One(one) => usize::from(one.is_some()),
            RelationResult::Many(many) => many.len(),
        }
    }

    /// Related records as a slice-like list.
    pub fn records(&self) -> Vec<&Record> {
        match self {
            RelationResult::One(one) => one.iter().map(|r| r.as_ref()).collect(),
            RelationResult::Many(many) => many.iter().collect(),
        }
    }

    /// The single record, if this is a one-result.
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            RelationResult::One(one) => one.as_deref(),
            RelationResult::Many(_) => None,
        }
    }

    /// Consume into a flat list of records.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            RelationResult::One(one) => one.map(|r| vec![*r]).unwrap_or_default(),
            RelationResult::Many(many) => many,
        }
    }
}

/// A relation bound to one parent record.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Bind the parent key into `query`.
    ///
    /// Returns `false` without touching the query when the key is unset.
    fn add_constraints(&self, query: &mut QueryIntent) -> bool;

    /// Run the relation query.
    async fn get_results(&self) -> Result<RelationResult>;
}

/// Build the resolver for relation `name` on `parent`.
pub fn resolver_for<'a>(
    session: &'a Session,
    parent: &'a Record,
    name: &str,
) -> Result<Box<dyn Resolver + 'a>> {
    let descriptor = parent.entity().relation_descriptor(name)?;
    let resolver: Box<dyn Resolver + 'a> = match descriptor {
        RelationshipDescriptor::OwnsOne(owns) => {
            Box::new(HasResolver::new(session, parent, owns, false))
        }
        RelationshipDescriptor::OwnsMany(owns) => {
            Box::new(HasResolver::new(session, parent, owns, true))
        }
        RelationshipDescriptor::PolymorphicOwnsOne(morph) => {
            Box::new(HasResolver::morph(session, parent, morph, false))
        }
        RelationshipDescriptor::PolymorphicOwnsMany(morph) => {
            Box::new(HasResolver::morph(session, parent, morph, true))
        }
        RelationshipDescriptor::BelongsToOne(belongs) => {
            Box::new(BelongsToResolver::new(session, parent, belongs))
        }
        RelationshipDescriptor::BelongsToMany(pivot) => {
            Box::new(BelongsToMany::new(session, parent, name, pivot))
        }
        RelationshipDescriptor::PolymorphicBelongsTo(morph) => {
            Box::new(MorphToResolver::new(session, parent, name, morph))
        }
    };
    Ok(resolver)
}

/// Run a constrained relation query and shape the rows by cardinality.
pub(crate) async fn fetch(
    session: &Session,
    related: &Arc<EntityType>,
    mut query: QueryIntent,
    many: bool,
) -> Result<RelationResult> {
    if session.config().allow_filtering {
        query.allow_filtering();
    }
    if !many {
        query.limit(1);
    }

    let records = session.select_records(related, &query).await?;
    Ok(if many {
        RelationResult::Many(records)
    } else {
        RelationResult::One(records.into_iter().next().map(Box::new))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_shapes() {
        let entity = Arc::new(EntityType::new("Tag", "tags"));
        let one = RelationResult::One(Some(Box::new(Record::new(entity.clone()))));
        assert_eq!(one.len(), 1);
        assert!(one.as_one().is_some());

        assert!(RelationResult::empty(false).is_empty());
        assert!(matches!(RelationResult::empty(true), RelationResult::Many(ref v) if v.is_empty()));

        let many = RelationResult::Many(vec![Record::new(entity.clone()), Record::new(entity)]);
        assert_eq!(many.records().len(), 2);
        assert_eq!(many.into_records().len(), 2);
    }
}
