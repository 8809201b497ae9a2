//! Session configuration.

use ringorm_proto::Dialect;
use serde::{Deserialize, Serialize};

/// Default name of the synthetic attribute carrying pivot row values.
pub const DEFAULT_PIVOT_ACCESSOR: &str = "pivot";

/// Settings shared by every query a session issues.
///
/// Deserializable so callers can load it from whatever source they use;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Command dialect.
    pub dialect: Dialect,

    /// Keyspace (or schema) prefixed to unqualified table names.
    pub keyspace: Option<String>,

    /// Append `ALLOW FILTERING` to relation queries, which filter on
    /// foreign keys that are rarely partition keys.
    pub allow_filtering: bool,

    /// Attribute name under which pivot values are merged onto related records.
    pub pivot_accessor: String,

    /// Lower-case entity tags before writing or matching discriminators.
    pub lowercase_morph_tags: bool,
}

impl SessionConfig {
    /// Create a configuration for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Set the keyspace prefix.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Set whether relation queries allow filtering.
    pub fn with_allow_filtering(mut self, allow: bool) -> Self {
        self.allow_filtering = allow;
        self
    }

    /// Set the pivot attribute name.
    pub fn with_pivot_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.pivot_accessor = accessor.into();
        self
    }

    /// Set whether discriminator tags are lower-cased.
    pub fn with_lowercase_morph_tags(mut self, lowercase: bool) -> Self {
        self.lowercase_morph_tags = lowercase;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Cql,
            keyspace: None,
            allow_filtering: true,
            pivot_accessor: DEFAULT_PIVOT_ACCESSOR.to_string(),
            lowercase_morph_tags: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.dialect, Dialect::Cql);
        assert_eq!(config.keyspace, None);
        assert!(config.allow_filtering);
        assert_eq!(config.pivot_accessor, DEFAULT_PIVOT_ACCESSOR);
        assert!(config.lowercase_morph_tags);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new(Dialect::Sql)
            .with_keyspace("app")
            .with_allow_filtering(false)
            .with_pivot_accessor("link")
            .with_lowercase_morph_tags(false);

        assert_eq!(config.dialect, Dialect::Sql);
        assert_eq!(config.keyspace.as_deref(), Some("app"));
        assert!(!config.allow_filtering);
        assert_eq!(config.pivot_accessor, "link");
        assert!(!config.lowercase_morph_tags);
    }

    #[test]
    fn test_partial_deserialization() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"dialect": "sql", "keyspace": "blog"}"#).unwrap();
        assert_eq!(config.dialect, Dialect::Sql);
        assert_eq!(config.keyspace.as_deref(), Some("blog"));
        assert_eq!(config.pivot_accessor, DEFAULT_PIVOT_ACCESSOR);
    }
}
