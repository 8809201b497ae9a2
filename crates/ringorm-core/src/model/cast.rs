//! Attribute casts.
//!
//! A cast coerces the stored form of an attribute into its read form on
//! `get`, and normalizes written values into their storage form on `set`.
//! Json and array casts store text and decode it on read.

use chrono::{DateTime, NaiveDate, Utc};
use ringorm_proto::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// A declared attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cast {
    Int,
    Float,
    Bool,
    String,
    Json,
    Array,
    Date,
}

impl Cast {
    /// Cast name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Cast::Int => "int",
            Cast::Float => "float",
            Cast::Bool => "bool",
            Cast::String => "string",
            Cast::Json => "json",
            Cast::Array => "array",
            Cast::Date => "date",
        }
    }

    fn error(&self, key: &str, message: impl Into<String>) -> Error {
        Error::Cast {
            key: key.to_string(),
            cast: self.name(),
            message: message.into(),
        }
    }

    /// Coerce a stored value into its read form. Null stays null.
    pub fn get(&self, key: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Cast::Int => match value {
                Value::Int(i) | Value::Timestamp(i) => Ok(Value::Int(*i)),
                Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| self.error(key, e.to_string())),
                other => Err(self.error(key, format!("unexpected {}", other.type_name()))),
            },
            Cast::Float => match value {
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|e| self.error(key, e.to_string())),
                other => other
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| self.error(key, format!("unexpected {}", other.type_name()))),
            },
            Cast::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                    _ => Err(self.error(key, format!("'{s}' is not a boolean"))),
                },
                other => Err(self.error(key, format!("unexpected {}", other.type_name()))),
            },
            Cast::String => match value {
                Value::Text(s) => Ok(Value::Text(s.clone())),
                other => Ok(Value::Text(other.to_string())),
            },
            Cast::Json | Cast::Array => {
                let decoded = match value {
                    Value::Text(text) => {
                        let doc: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                            warn!(attribute = key, error = %e, "stored json failed to decode");
                            self.error(key, e.to_string())
                        })?;
                        Value::from_json(doc)
                    }
                    Value::Json(doc) => Value::from_json(doc.clone()),
                    other => other.clone(),
                };
                if *self == Cast::Array && !matches!(decoded, Value::List(_)) {
                    return Err(self.error(key, format!("expected a list, got {}", decoded.type_name())));
                }
                Ok(decoded)
            }
            Cast::Date => to_timestamp(value).ok_or_else(|| {
                self.error(key, format!("'{value}' is not a date"))
            }),
        }
    }

    /// Normalize a written value into its storage form.
    pub fn set(&self, key: &str, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }

        match self {
            Cast::Json | Cast::Array => serde_json::to_string(&value.to_json())
                .map(Value::Text)
                .map_err(|e| self.error(key, e.to_string())),
            Cast::Date => to_timestamp(&value).ok_or_else(|| {
                self.error(key, format!("'{value}' is not a date"))
            }),
            _ => Ok(value),
        }
    }
}

/// Interpret a value as a timestamp in epoch microseconds.
///
/// Accepts timestamps, integers, RFC 3339 text and `YYYY-MM-DD` dates.
fn to_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::Timestamp(t) | Value::Int(t) => Some(Value::Timestamp(*t)),
        Value::Text(text) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(Value::Timestamp(parsed.with_timezone(&Utc).timestamp_micros()));
            }
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            let midnight = date.and_hms_opt(0, 0, 0)?;
            Some(Value::Timestamp(midnight.and_utc().timestamp_micros()))
        }
        _ => None,
    }
}
