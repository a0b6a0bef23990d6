use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered string-keyed map of [`Value`]s.
///
/// Insertion order is preserved (matching `serde_json`'s `preserve_order`
/// behavior) but is only semantically significant for the template-marker
/// check in [`crate::template`].
pub type Map = IndexMap<String, Value>;

/// A recursive sum type: null, boolean, number, string, ordered list, or
/// an ordered string-keyed map.
///
/// This mirrors `serde_json::Value` in shape but is engine-owned so the
/// template-marker detection in [`crate::template::is_template_object`]
/// is a first-class operation on the type rather than a convention
/// layered on top of a foreign value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A boolean scalar.
    Bool(bool),
    /// A numeric scalar, preserving integer vs. float representation.
    Number(serde_json::Number),
    /// A string scalar.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// An ordered string-keyed map of values.
    Map(Map),
}

impl Value {
    /// Returns `true` if this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns this value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns this value as a mutable map, if it is one.
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// A human-readable type name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Builds an empty map value, the shape every top-level configuration
    /// layer and processor result is expected to have.
    pub fn empty_map() -> Self {
        Value::Map(Map::new())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Numbers are hashed via their canonical string form rather than
        // `serde_json::Number`'s internal representation, which keeps the
        // impl simple and side-steps float-vs-int bit-pattern concerns.
        match self {
            Value::Null => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Number(n) => {
                state.write_u8(2);
                n.to_string().hash(state);
            }
            Value::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            Value::List(l) => {
                state.write_u8(4);
                l.hash(state);
            }
            Value::Map(m) => {
                state.write_u8(5);
                for (k, v) in m {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => {
                write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}
