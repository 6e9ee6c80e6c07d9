//! Operand and attribute values.
//!
//! A [`Value`] is either a reference to a graph tensor or a literal. Arrays
//! hold variable-length lists (strides, axes, padding lists) and tuples hold
//! fixed-arity groups such as `(before, after)` padding pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand or attribute value of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Reference to a tensor by name.
    Identifier(String),
    /// Floating point literal.
    Scalar(f64),
    /// Integer literal.
    Integer(i64),
    /// Logical literal.
    Logical(bool),
    /// String literal, used by attributes such as `border`.
    String(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Fixed-arity group of values.
    Tuple(Vec<Value>),
}

impl Value {
    /// Shorthand for an identifier value.
    pub fn id(name: impl Into<String>) -> Self {
        Value::Identifier(name.into())
    }

    /// Shorthand for a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Array of integer literals.
    pub fn integers(values: &[i64]) -> Self {
        Value::Array(values.iter().copied().map(Value::Integer).collect())
    }

    /// Array of identifiers.
    pub fn identifiers<S: AsRef<str>>(names: &[S]) -> Self {
        Value::Array(names.iter().map(|n| Value::id(n.as_ref())).collect())
    }

    /// Array of `(before, after)` integer tuples.
    pub fn pairs(values: &[(i64, i64)]) -> Self {
        Value::Array(
            values
                .iter()
                .map(|&(a, b)| Value::Tuple(vec![Value::Integer(a), Value::Integer(b)]))
                .collect(),
        )
    }

    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Identifier(_) => "identifier",
            Value::Scalar(_) => "scalar",
            Value::Integer(_) => "integer",
            Value::Logical(_) => "logical",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }

    /// Whether the value is a scalar, integer or logical literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Value::Scalar(_) | Value::Integer(_) | Value::Logical(_))
    }

    /// Identifier payload.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Value::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Scalar payload; integers widen to `f64`.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer payload.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Logical payload.
    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Value::Logical(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a tuple.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Number of elements of an array or tuple, 0 otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) | Value::Tuple(items) => items.len(),
            _ => 0,
        }
    }

    /// Whether the value is an empty array or tuple, or not a container.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every identifier contained in the value, depth first.
    pub fn for_each_identifier<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Value::Identifier(name) => f(name),
            Value::Array(items) | Value::Tuple(items) => {
                for item in items {
                    item.for_each_identifier(f);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Identifier(name) => write!(f, "{name}"),
            Value::Scalar(v) => write!(f, "{v:?}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Logical(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Array(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}
