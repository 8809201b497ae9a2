//! Per-attribute getter and setter transforms.

use std::fmt;
use std::sync::Arc;

use ringorm_proto::Value;

/// Read transform applied to the stored value.
pub type Getter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Write transform applied before a value is stored.
pub type Setter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Transforms registered for one attribute at type-definition time.
#[derive(Clone, Default)]
pub struct AttributeTransform {
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl AttributeTransform {
    /// Create an empty transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read transform.
    pub fn getter(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.getter = Some(Arc::new(f));
        self
    }

    /// Set the write transform.
    pub fn setter(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.setter = Some(Arc::new(f));
        self
    }

    /// Check if a read transform is registered.
    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    /// Apply the read transform, if any.
    pub fn apply_get(&self, value: &Value) -> Option<Value> {
        self.getter.as_ref().map(|f| f(value))
    }

    /// Apply the write transform, or pass the value through.
    pub fn apply_set(&self, value: Value) -> Value {
        match &self.setter {
            Some(f) => f(value),
            None => value,
        }
    }
}

impl fmt::Debug for AttributeTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeTransform")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}
