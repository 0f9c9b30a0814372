//! A generic, recursive value tree shared by the JSON, MessagePack, and struct
//! decode paths before structural expansion into the log field store.
//!
//! Keeping one tagged variant here (rather than three separate ad hoc trees)
//! is what lets `ingest::put_unknown_struct` dispatch on shape without caring
//! which decoder produced the value.

use std::collections::BTreeMap;

/// An untyped value produced by a JSON, MessagePack, or struct decode.
///
/// `Map` is an insertion-ordered list of pairs rather than a `HashMap` so that
/// struct field order (and, for JSON objects where it matters, source order)
/// survives into flattened field-store children.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True for the four primitive leaf kinds the structural expander
    /// treats as a scalar (bool, number, string, raw bytes).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Bytes(_)
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<rmpv::Value> for Value {
    fn from(v: rmpv::Value) -> Self {
        match v {
            rmpv::Value::Nil => Value::Null,
            rmpv::Value::Boolean(b) => Value::Bool(b),
            rmpv::Value::Integer(i) => {
                Value::Number(i.as_f64().unwrap_or_else(|| i.as_i64().unwrap_or(0) as f64))
            }
            rmpv::Value::F32(f) => Value::Number(f as f64),
            rmpv::Value::F64(f) => Value::Number(f),
            rmpv::Value::String(s) => Value::String(s.into_str().unwrap_or_default()),
            rmpv::Value::Binary(b) => Value::Bytes(b),
            rmpv::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            rmpv::Value::Map(m) => Value::Map(
                m.into_iter()
                    .map(|(k, v)| {
                        let key = match k {
                            rmpv::Value::String(s) => s.into_str().unwrap_or_default(),
                            other => format!("{other}"),
                        };
                        (key, Value::from(v))
                    })
                    .collect(),
            ),
            rmpv::Value::Ext(_, b) => Value::Bytes(b),
        }
    }
}

/// A decoded schema-type annotation map: relative child path -> schema name.
///
/// Kept as a sorted map (not a plain `Vec`) since the struct decoder merges
/// entries from nested decodes under different prefixes and callers look
/// them up by path.
pub type SchemaTypes = BTreeMap<String, String>;
