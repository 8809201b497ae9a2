//! Owning relations: the related rows carry the parent's key.

use async_trait::async_trait;
use ringorm_proto::QueryIntent;

use crate::error::Result;
use crate::model::Record;
use crate::relation::descriptor::{MorphOwns, Owns};
use crate::relation::{fetch, RelationResult, Resolver};
use crate::session::Session;

/// Resolver for owns-one, owns-many and their polymorphic forms.
pub struct HasResolver<'a> {
    session: &'a Session,
    parent: &'a Record,
    related: String,
    foreign_key: String,
    local_key: String,
    /// Discriminator column and the parent's tag, for polymorphic relations.
    morph: Option<(String, String)>,
    many: bool,
}

impl<'a> HasResolver<'a> {
    pub fn new(session: &'a Session, parent: &'a Record, owns: Owns, many: bool) -> Self {
        Self {
            session,
            parent,
            related: owns.related,
            foreign_key: owns.foreign_key,
            local_key: owns.local_key,
            morph: None,
            many,
        }
    }

    /// Polymorphic form, also binding the discriminator to the parent's tag.
    pub fn morph(session: &'a Session, parent: &'a Record, morph: MorphOwns, many: bool) -> Self {
        let tag = session.morph_tag(parent.entity());
        Self {
            session,
            parent,
            related: morph.related,
            foreign_key: morph.morph_id,
            local_key: morph.local_key,
            morph: Some((morph.morph_type, tag)),
            many,
        }
    }
}

#[async_trait]
impl<'a> Resolver for HasResolver<'a> {
    fn add_constraints(&self, query: &mut QueryIntent) -> bool {
        let Some(key) = self.parent.bound(&self.local_key) else {
            return false;
        };
        query.where_eq(self.foreign_key.as_str(), key);
        if let Some((column, tag)) = &self.morph {
            query.where_eq(column.as_str(), tag.as_str());
        }
        true
    }

    async fn get_results(&self) -> Result<RelationResult> {
        let related = self.session.entity(&self.related)?;
        let mut query = QueryIntent::new(related.table());
        if !self.add_constraints(&mut query) {
            return Ok(RelationResult::empty(self.many));
        }
        fetch(self.session, &related, query, self.many).await
    }
}
