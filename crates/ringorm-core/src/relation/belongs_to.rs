//! The inverse direction: the parent carries the owner's key.

use async_trait::async_trait;
use ringorm_proto::{QueryIntent, Value};

use crate::error::{Error, Result};
use crate::model::Record;
use crate::relation::descriptor::{BelongsTo, RelationshipDescriptor};
use crate::relation::{fetch, RelationResult, Resolver};
use crate::session::Session;

/// Resolver for belongs-to relations.
pub struct BelongsToResolver<'a> {
    session: &'a Session,
    parent: &'a Record,
    belongs: BelongsTo,
}

impl<'a> BelongsToResolver<'a> {
    pub fn new(session: &'a Session, parent: &'a Record, belongs: BelongsTo) -> Self {
        Self {
            session,
            parent,
            belongs,
        }
    }
}

#[async_trait]
impl<'a> Resolver for BelongsToResolver<'a> {
    fn add_constraints(&self, query: &mut QueryIntent) -> bool {
        let Some(key) = self.parent.bound(&self.belongs.foreign_key) else {
            return false;
        };
        query.where_eq(self.belongs.owner_key.as_str(), key);
        true
    }

    async fn get_results(&self) -> Result<RelationResult> {
        let related = self.session.entity(&self.belongs.related)?;
        let mut query = QueryIntent::new(related.table());
        if !self.add_constraints(&mut query) {
            return Ok(RelationResult::One(None));
        }
        fetch(self.session, &related, query, false).await
    }
}

impl Record {
    fn belongs_to_descriptor(&self, relation: &str) -> Result<BelongsTo> {
        match self.entity().relation_descriptor(relation)? {
            RelationshipDescriptor::BelongsToOne(belongs) => Ok(belongs),
            _ => Err(Error::RelationKind {
                relation: relation.to_string(),
                expected: "belongs-to",
            }),
        }
    }

    /// Point this record's foreign key at `owner`.
    ///
    /// Only the foreign-key attribute changes; nothing is persisted. The owner
    /// is attached as the loaded relation result.
    pub fn associate(&mut self, relation: &str, owner: &Record) -> Result<()> {
        let belongs = self.belongs_to_descriptor(relation)?;
        let key = owner
            .bound(&belongs.owner_key)
            .ok_or_else(|| Error::MissingParentKey {
                relation: relation.to_string(),
                key: belongs.owner_key.clone(),
                action: "associate",
            })?;

        self.set_attribute(belongs.foreign_key, key)?;
        self.set_relation(relation, RelationResult::One(Some(Box::new(owner.clone()))));
        Ok(())
    }

    /// Clear this record's foreign key. Nothing is persisted.
    pub fn dissociate(&mut self, relation: &str) -> Result<()> {
        let belongs = self.belongs_to_descriptor(relation)?;
        self.set_attribute(belongs.foreign_key, Value::Null)?;
        self.set_relation(relation, RelationResult::One(None));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::EntityType;

    fn post_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::new("Post", "posts")
                .relation("author", || RelationshipDescriptor::belongs_to("User", "author_id", "id"))
                .relation("comments", || {
                    RelationshipDescriptor::owns_many("Comment", "post_id", "id")
                }),
        )
    }

    fn user(id: Option<i64>) -> Record {
        let mut user = Record::new(Arc::new(EntityType::new("User", "users")));
        if let Some(id) = id {
            user.set_attribute("id", id).unwrap();
        }
        user
    }

    #[test]
    fn test_associate_sets_only_the_foreign_key() {
        let mut post = Record::new(post_type());
        post.associate("author", &user(Some(7))).unwrap();

        assert_eq!(post.raw("author_id"), Some(&Value::Int(7)));
        assert_eq!(post.get_dirty().len(), 1);
        assert!(!post.exists());
        assert!(post.relation("author").and_then(|r| r.as_one()).is_some());

        post.dissociate("author").unwrap();
        assert_eq!(post.raw("author_id"), Some(&Value::Null));
        assert!(post.relation("author").unwrap().is_empty());
    }

    #[test]
    fn test_associate_requires_owner_key() {
        let mut post = Record::new(post_type());
        let err = post.associate("author", &user(None)).unwrap_err();
        assert!(matches!(err, Error::MissingParentKey { action: "associate", .. }));
    }

    #[test]
    fn test_associate_checks_relation_kind() {
        let mut post = Record::new(post_type());
        let err = post.associate("comments", &user(Some(1))).unwrap_err();
        assert!(matches!(err, Error::RelationKind { expected: "belongs-to", .. }));
    }
}
