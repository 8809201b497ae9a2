//! Polymorphic inverse: the parent stores a discriminator and an owner id.

use async_trait::async_trait;
use ringorm_proto::QueryIntent;

use crate::error::{Error, Result};
use crate::model::Record;
use crate::relation::descriptor::MorphTo;
use crate::relation::{fetch, RelationResult, Resolver};
use crate::session::Session;

/// Resolver for morph-to relations.
pub struct MorphToResolver<'a> {
    session: &'a Session,
    parent: &'a Record,
    name: String,
    morph: MorphTo,
}

impl<'a> MorphToResolver<'a> {
    pub fn new(session: &'a Session, parent: &'a Record, name: &str, morph: MorphTo) -> Self {
        Self {
            session,
            parent,
            name: name.to_string(),
            morph,
        }
    }

    /// The stored discriminator, if set.
    fn tag(&self) -> Option<String> {
        self.parent
            .bound(&self.morph.morph_type)
            .map(|tag| match tag.as_str() {
                Some(text) => text.to_string(),
                None => tag.to_string(),
            })
    }

    /// Entity registered for `tag`, matching case-insensitively when tags
    /// are stored lower-cased.
    fn resolve(&self, tag: &str) -> Result<String> {
        let exact = self.morph.resolve(tag);
        let folded = || {
            self.morph
                .types
                .iter()
                .find(|(registered, _)| registered.eq_ignore_ascii_case(tag))
                .map(|(_, entity)| entity.as_str())
        };

        let entity = match exact {
            Some(entity) => Some(entity),
            None if self.session.config().lowercase_morph_tags => folded(),
            None => None,
        };

        entity.map(str::to_string).ok_or_else(|| Error::UnregisteredType {
            relation: self.name.clone(),
            tag: tag.to_string(),
        })
    }
}

#[async_trait]
impl<'a> Resolver for MorphToResolver<'a> {
    fn add_constraints(&self, query: &mut QueryIntent) -> bool {
        let Some(id) = self.parent.bound(&self.morph.morph_id) else {
            return false;
        };
        query.where_eq(self.morph.owner_key.as_str(), id);
        true
    }

    async fn get_results(&self) -> Result<RelationResult> {
        let Some(tag) = self.tag() else {
            return Ok(RelationResult::One(None));
        };
        if self.parent.bound(&self.morph.morph_id).is_none() {
            return Ok(RelationResult::One(None));
        }

        let related = self.session.entity(&self.resolve(&tag)?)?;
        let mut query = QueryIntent::new(related.table());
        if !self.add_constraints(&mut query) {
            return Ok(RelationResult::One(None));
        }
        fetch(self.session, &related, query, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ringorm_memory::MemoryDriver;
    use ringorm_proto::Dialect;

    use crate::config::SessionConfig;
    use crate::model::EntityType;

    fn session(driver: Arc<MemoryDriver>, lowercase: bool) -> Session {
        Session::new(
            driver,
            SessionConfig::new(Dialect::Cql).with_lowercase_morph_tags(lowercase),
        )
        .with_entity(EntityType::new("Image", "images"))
        .with_entity(EntityType::new("Post", "posts"))
    }

    fn image(tag: Option<&str>) -> Record {
        let mut image = Record::new(Arc::new(EntityType::new("Image", "images")));
        image.set_attribute("imageable_id", 4).unwrap();
        if let Some(tag) = tag {
            image.set_attribute("imageable_type", tag).unwrap();
        }
        image
    }

    fn owner() -> MorphTo {
        MorphTo::new("imageable").register("BlogPost", "Post")
    }

    #[test]
    fn test_resolve_folds_case_for_lowercased_tags() {
        let session = session(Arc::new(MemoryDriver::new()), true);
        let parent = image(Some("blogpost"));
        let resolver = MorphToResolver::new(&session, &parent, "imageable", owner());

        assert_eq!(resolver.tag().as_deref(), Some("blogpost"));
        assert_eq!(resolver.resolve("blogpost").unwrap(), "Post");
        assert_eq!(resolver.resolve("BlogPost").unwrap(), "Post");
    }

    #[test]
    fn test_resolve_is_exact_without_lowercasing() {
        let session = session(Arc::new(MemoryDriver::new()), false);
        let parent = image(Some("blogpost"));
        let resolver = MorphToResolver::new(&session, &parent, "imageable", owner());

        assert_eq!(resolver.resolve("BlogPost").unwrap(), "Post");
        let err = resolver.resolve("blogpost").unwrap_err();
        assert!(matches!(
            err,
            Error::UnregisteredType { ref relation, ref tag } if relation == "imageable" && tag == "blogpost"
        ));
    }

    #[tokio::test]
    async fn test_unset_type_issues_no_query() {
        let driver = Arc::new(MemoryDriver::new().with_table("posts", ["id"]));
        let session = session(driver.clone(), true);
        let parent = image(None);
        let resolver = MorphToResolver::new(&session, &parent, "imageable", owner());

        assert!(resolver.get_results().await.unwrap().is_empty());
        assert_eq!(driver.command_count(), 0);
    }
}
