//! Entity-scoped queries.

pub mod builder;

pub use builder::ModelQuery;
