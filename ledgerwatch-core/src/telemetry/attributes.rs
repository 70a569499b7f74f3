//! Variant-valued attribute maps attached to spans, span events and logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered attribute map. Ordering keeps serialized output stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Metric labels are always strings.
pub type Labels = BTreeMap<String, String>;

/// A scalar attribute value.
///
/// Serialized untagged so the persisted JSON reads `"GET"`, `200`, `0.5`
/// or `true` rather than a wrapped variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

macro_rules! int_attribute {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::Int(i64::from(value))
                }
            }
        )*
    };
}

int_attribute!(i8, i16, i32, i64, u8, u16, u32);

/// Build an [`Attributes`] map from key/value pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Build a [`Labels`] map from key/value pairs.
pub fn labels<K, V, I>(pairs: I) -> Labels
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
