//! Element kinds and literal tensor payloads.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum tensor rank a graph may declare.
pub const MAX_RANK: usize = 8;

/// Element kind of a graph tensor or operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Logical values.
    Bool,
    /// Signed integers.
    Integer,
    /// Floating point scalars.
    Float,
    /// Unresolved generic kind (`?`). Never executable.
    Generic,
}

impl ElementKind {
    /// Name used in graph descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Bool => "logical",
            ElementKind::Integer => "integer",
            ElementKind::Float => "scalar",
            ElementKind::Generic => "?",
        }
    }

    /// Whether tensors of this kind can be materialized by an engine.
    pub fn is_concrete(self) -> bool {
        !matches!(self, ElementKind::Generic)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "logical" | "bool" => Ok(ElementKind::Bool),
            "integer" => Ok(ElementKind::Integer),
            "scalar" | "float" => Ok(ElementKind::Float),
            "?" => Ok(ElementKind::Generic),
            other => Err(CoreError::UnknownElementKind(other.to_string())),
        }
    }
}

/// Literal contents of a tensor, stored flat in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    /// Logical elements.
    Bool(Vec<bool>),
    /// Integer elements.
    Integer(Vec<i64>),
    /// Floating point elements.
    Float(Vec<f32>),
}

impl TensorData {
    /// Zero-filled payload of the given kind and volume.
    ///
    /// Returns `None` for [`ElementKind::Generic`].
    pub fn zeros(kind: ElementKind, volume: usize) -> Option<Self> {
        match kind {
            ElementKind::Bool => Some(TensorData::Bool(vec![false; volume])),
            ElementKind::Integer => Some(TensorData::Integer(vec![0; volume])),
            ElementKind::Float => Some(TensorData::Float(vec![0.0; volume])),
            ElementKind::Generic => None,
        }
    }

    /// Element kind of the payload.
    pub fn kind(&self) -> ElementKind {
        match self {
            TensorData::Bool(_) => ElementKind::Bool,
            TensorData::Integer(_) => ElementKind::Integer,
            TensorData::Float(_) => ElementKind::Float,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            TensorData::Bool(v) => v.len(),
            TensorData::Integer(v) => v.len(),
            TensorData::Float(v) => v.len(),
        }
    }

    /// Whether the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Repeat a single-element payload `volume` times.
    ///
    /// Returns `None` unless the payload has exactly one element.
    pub fn broadcast(&self, volume: usize) -> Option<Self> {
        if self.len() != 1 {
            return None;
        }
        Some(match self {
            TensorData::Bool(v) => TensorData::Bool(vec![v[0]; volume]),
            TensorData::Integer(v) => TensorData::Integer(vec![v[0]; volume]),
            TensorData::Float(v) => TensorData::Float(vec![v[0]; volume]),
        })
    }

    /// Float view of the payload, if it holds floats.
    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            TensorData::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view of the payload, if it holds integers.
    pub fn as_integer(&self) -> Option<&[i64]> {
        match self {
            TensorData::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Logical view of the payload, if it holds logicals.
    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            TensorData::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// Number of elements described by a shape. Rank 0 has volume 1.
pub fn volume(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind_names() {
        assert_eq!("scalar".parse::<ElementKind>().unwrap(), ElementKind::Float);
        assert_eq!("bool".parse::<ElementKind>().unwrap(), ElementKind::Bool);
        assert_eq!(ElementKind::Integer.to_string(), "integer");
        assert!("tensor".parse::<ElementKind>().is_err());
        assert!(!ElementKind::Generic.is_concrete());
    }

    #[test]
    fn test_broadcast_single_element() {
        let data = TensorData::Float(vec![0.5]);
        assert_eq!(data.broadcast(3), Some(TensorData::Float(vec![0.5; 3])));
        assert_eq!(TensorData::Integer(vec![1, 2]).broadcast(4), None);
    }

    #[test]
    fn test_volume_of_scalar_shape() {
        assert_eq!(volume(&[]), 1);
        assert_eq!(volume(&[2, 3, 4]), 24);
        assert_eq!(volume(&[2, 0]), 0);
    }
}
