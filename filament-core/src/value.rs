//! Dynamic Values
//!
//! `Value` is the currency of the template layer: every dynamic slot in a
//! template resolves to one, and effect `last_value` slots carry one. It is
//! deliberately small: scalars, lists, node fragments, and "plain data"
//! (structural JSON-like data with no behavior attached).
//!
//! # The equality rule
//!
//! `PartialEq` on `Value` is the notification gate for value-typed signals:
//!
//! - scalars compare strictly,
//! - `Data` compares structurally (serialized comparison), so a setter
//!   receiving a deep-equal plain object does not notify,
//! - `Fragment` never compares equal, not even to itself. A fragment is a
//!   live tree, and a setter receiving one must always notify.
//!
//! The fragment arm makes this relation non-reflexive, like `f64` NaN.
//! That is intentional and load-bearing; do not derive `Eq`.

use std::fmt;

use serde::Serialize;

use crate::dom::Fragment;

/// A dynamic value flowing through templates and bindings.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Fragment(Fragment),
    /// Plain structural data. Compared by structure, rejected by the
    /// template compilers (non-primitive interpolation).
    Data(serde_json::Value),
}

impl Value {
    /// Build a plain-data value from any serializable type.
    ///
    /// Returns `Value::Null` if serialization fails (serialization of plain
    /// data types is infallible in practice).
    pub fn data<T: Serialize>(value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(v) => Value::Data(v),
            Err(_) => Value::Null,
        }
    }

    /// True for values the template compilers accept as direct text:
    /// everything except `Data`.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Data(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The text a value contributes to markup or an attribute string.
    ///
    /// `Null` renders as `"null"`, which the attribute binder relies on to
    /// detect the single-placeholder unset case.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            // Structural comparison; serde_json::Value compares maps and
            // arrays deeply, which is the serialized-comparison rule.
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
            // Fragments are live trees: always notify.
            (Value::Fragment(_), _) | (_, Value::Fragment(_)) => false,
            _ => false,
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
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for item in items {
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Fragment(fragment) => f.write_str(&fragment.to_html()),
            Value::Data(data) => write!(f, "{data}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Fragment> for Value {
    fn from(v: Fragment) -> Self {
        Value::Fragment(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
