//! Compiled command types.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Command text plus its ordered parameters.
///
/// Built only through [`Bindings`], so every placeholder in `text` has been
/// produced together with the value at the same position in `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledCommand {
    /// Dialect-specific command text.
    pub text: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

impl CompiledCommand {
    /// Create a command from text and the bindings collected while building it.
    pub fn new(text: impl Into<String>, bindings: Bindings) -> Self {
        Self {
            text: text.into(),
            params: bindings.into_values(),
        }
    }
}

/// Collects parameter values in the order their placeholders are emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: Vec<Value>,
}

impl Bindings {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` and return the placeholder that stands for it.
    pub fn bind(&mut self, placeholder: String, value: &Value) -> String {
        self.values.push(value.clone());
        placeholder
    }

    /// Number of values bound so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing has been bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound values so far.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the collector.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Count `?` placeholders outside quoted literals and identifiers.
pub fn count_placeholders(text: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '?' => count += 1,
                _ => {}
            },
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_keep_order() {
        let mut bindings = Bindings::new();
        let a = bindings.bind("?".into(), &Value::Int(1));
        let b = bindings.bind("?".into(), &Value::Text("x".into()));
        assert_eq!(format!("{a} {b}"), "? ?");

        let command = CompiledCommand::new("SELECT ? , ?", bindings);
        assert_eq!(
            command.params,
            vec![Value::Int(1), Value::Text("x".into())]
        );
    }

    #[test]
    fn test_count_placeholders_skips_quotes() {
        assert_eq!(count_placeholders("a = ? AND b IN (?, ?)"), 3);
        assert_eq!(count_placeholders("a = '?' AND \"we?ird\" = ?"), 1);
        assert_eq!(count_placeholders("a IS NULL"), 0);
    }
}
