//! The materialized flag tree.
//!
//! A [`Value`] is what consumers read once every computed node has been
//! evaluated. Lists and tables sit behind an [`Arc`] so that two trees can
//! share an unchanged sub-tree, and so that "same reference" is observable
//! through [`Value::same`].

mod path;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub use path::{get, Path, Segment};

/// Insertion-ordered map backing [`Value::Table`].
pub type Table = IndexMap<String, Value>;

/// A fully materialized flag value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<[Value]>),
    Table(Arc<Table>),
}

/// Failure turning a [`Value`] into a typed host struct.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("flag tree cannot be decoded: {0}")]
    Unrepresentable(&'static str),

    #[error("failed to deserialize flags: {0}")]
    Deserialize(#[from] toml::de::Error),
}

impl Value {
    /// Strict identity in the `===` sense.
    ///
    /// Scalars compare by content (`NaN` is never the same as itself),
    /// lists and tables compare by pointer.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Table(a), Value::Table(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Boolean coercion used to decide whether a flag is enabled.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Table(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(&**items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(&**table),
            _ => None,
        }
    }

    /// Looks up `path` below this value. See [`get`].
    pub fn get(&self, path: &Path) -> Option<&Value> {
        get(self, path)
    }

    /// Decodes the tree into a typed host struct.
    ///
    /// Goes through `toml`, which has no null: `Null` entries of a table are
    /// dropped and a `Null` inside a list is rejected.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let value = to_toml(self)?.ok_or(DecodeError::Unrepresentable("root is null"))?;
        Ok(value.try_into()?)
    }
}

fn to_toml(value: &Value) -> Result<Option<toml::Value>, DecodeError> {
    let converted = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Int(i) => toml::Value::Integer(*i),
        Value::Float(f) => toml::Value::Float(*f),
        Value::Str(s) => toml::Value::String(s.to_string()),
        Value::List(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items.iter() {
                let item = to_toml(item)?
                    .ok_or(DecodeError::Unrepresentable("null inside a list"))?;
                array.push(item);
            }
            toml::Value::Array(array)
        }
        Value::Table(table) => {
            let mut out = toml::Table::new();
            for (key, item) in table.iter() {
                if let Some(item) = to_toml(item)? {
                    out.insert(key.clone(), item);
                }
            }
            toml::Value::Table(out)
        }
    };
    Ok(Some(converted))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items.iter()),
            Value::Table(table) => serializer.collect_map(table.iter()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Table(table) => {
                f.write_str("{")?;
                for (i, (key, value)) in table.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items.into())
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(Arc::new(table))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let table: Table = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        table.into()
    }
}
