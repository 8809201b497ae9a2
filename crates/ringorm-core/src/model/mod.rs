//! Entity types and records.
//!
//! # Modules
//!
//! - [`entity`] - Entity type definitions and their relation registry
//! - [`record`] - Records with dirty tracking and mass assignment
//! - [`cast`] - Attribute casts
//! - [`transform`] - Per-attribute getter and setter transforms

pub mod cast;
pub mod entity;
pub mod record;
pub mod transform;

pub use cast::Cast;
pub use entity::{EntityType, RelationFactory};
pub use record::Record;
pub use transform::AttributeTransform;
