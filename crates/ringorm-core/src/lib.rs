//! ringorm core.
//!
//! Entity records, relationship resolution and eager loading on top of the
//! dialect grammars. Everything runs through a [`Session`], which owns the
//! driver, the grammar, the configuration and the entity registry.
//!
//! # Modules
//!
//! - [`model`] - Entity types, records, casts and attribute transforms
//! - [`relation`] - Relation descriptors and their resolvers
//! - [`query`] - Entity-scoped query builder
//! - [`session`] - Execution context and persistence
//! - [`config`] - Session configuration
//! - [`error`] - Core error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ringorm_core::{EntityType, RelationshipDescriptor, Session, SessionConfig};
//! use ringorm_memory::MemoryDriver;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let driver = Arc::new(
//!     MemoryDriver::new()
//!         .with_table("users", ["id"])
//!         .with_table("posts", ["id"]),
//! );
//! let session = Session::new(driver, SessionConfig::default())
//!     .with_entity(EntityType::new("User", "users").relation("posts", || {
//!         RelationshipDescriptor::owns_many("Post", "author_id", "id")
//!     }))
//!     .with_entity(EntityType::new("Post", "posts"));
//!
//! let user = session.create("User", [("id", 1)]).await?;
//! session.create("Post", [("id", 10), ("author_id", 1)]).await?;
//!
//! let posts = session.relation(&user, "posts").await?;
//! assert_eq!(posts.len(), 1);
//! # Ok::<(), ringorm_core::Error>(())
//! # }).unwrap();
//! ```

pub mod config;
mod eager;
pub mod error;
pub mod model;
pub mod query;
pub mod relation;
pub mod session;

pub use config::SessionConfig;
pub use error::{Error, Operation, Result};
pub use model::{AttributeTransform, Cast, EntityType, Record};
pub use query::ModelQuery;
pub use relation::{
    resolver_for, BelongsToMany, MorphTo, PivotTable, RelationResult, RelationshipDescriptor,
    Resolver, SyncChanges,
};
pub use session::Session;

pub use ringorm_proto::{Dialect, Operator, QueryIntent, Value};
