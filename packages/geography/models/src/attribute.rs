//! Scalar attribute values attached to geometric records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name -> value. Sorted so that serialization is deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single scalar attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl AttributeValue {
    /// Returns the value as an integer when it represents a whole number.
    ///
    /// Text is parsed after trimming, floats are accepted only without a
    /// fractional part.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Bool(_) | Self::Float(_) => None,
        }
    }

    /// Returns the text rendering used for identifier and name matching.
    ///
    /// `Null` has no text form.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Returns `true` for [`AttributeValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&serde_json::Value> for AttributeValue {
    /// Nested arrays and objects are kept as their JSON text.
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Integer),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(nested.to_string())
            }
        }
    }
}

impl From<&AttributeValue> for serde_json::Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Null => Self::Null,
            AttributeValue::Bool(b) => Self::Bool(*b),
            AttributeValue::Integer(i) => Self::from(*i),
            // Non-finite floats have no JSON representation.
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number),
            AttributeValue::Text(s) => Self::String(s.clone()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Looks up `field` in `attributes`: an exact match first, then a unique
/// case-insensitive match (`name` vs `Name`).
#[must_use]
pub fn lookup<'a>(attributes: &'a Attributes, field: &str) -> Option<&'a AttributeValue> {
    if let Some(value) = attributes.get(field) {
        return Some(value);
    }

    let mut matches = attributes
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case(field))
        .map(|(_, value)| value);

    match (matches.next(), matches.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}
