//! Typed attribute access for executors.
//!
//! NNEF treats an empty list attribute the same as an absent one, so the
//! list readers return `None` for both and let the caller pick a default.

use crate::engine::Scalar;
use crate::error::{Result, RuntimeError};
use rnnef_core::{ElementKind, Operation, Value};

pub(crate) fn integer(op: &Operation, key: &str, default: i64) -> Result<i64> {
    match op.attrib(key) {
        None => Ok(default),
        Some(value) => value
            .as_integer()
            .ok_or_else(|| mismatch(op, key, "an integer", value)),
    }
}

pub(crate) fn logical(op: &Operation, key: &str, default: bool) -> Result<bool> {
    match op.attrib(key) {
        None => Ok(default),
        Some(value) => value
            .as_logical()
            .ok_or_else(|| mismatch(op, key, "a logical", value)),
    }
}

pub(crate) fn string<'a>(op: &'a Operation, key: &str, default: &'a str) -> Result<&'a str> {
    match op.attrib(key) {
        None => Ok(default),
        Some(value) => value
            .as_str()
            .ok_or_else(|| mismatch(op, key, "a string", value)),
    }
}

/// Integer list; `None` when absent or empty.
pub(crate) fn integers(op: &Operation, key: &str) -> Result<Option<Vec<i64>>> {
    let Some(value) = op.attrib(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| mismatch(op, key, "an integer array", value))?;
    if items.is_empty() {
        return Ok(None);
    }
    items
        .iter()
        .map(|item| {
            item.as_integer()
                .ok_or_else(|| mismatch(op, key, "an integer array", value))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Non-negative integer list; `None` when absent or empty.
pub(crate) fn sizes(op: &Operation, key: &str) -> Result<Option<Vec<usize>>> {
    let Some(values) = integers(op, key)? else {
        return Ok(None);
    };
    values
        .into_iter()
        .map(|v| {
            usize::try_from(v)
                .map_err(|_| RuntimeError::malformed(&op.name, key, format!("negative entry {v}")))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// List of `(before, after)` pairs; `None` when absent or empty.
pub(crate) fn padding(op: &Operation, key: &str) -> Result<Option<Vec<(usize, usize)>>> {
    let Some(value) = op.attrib(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| mismatch(op, key, "an array of pairs", value))?;
    if items.is_empty() {
        return Ok(None);
    }
    items
        .iter()
        .map(|item| {
            let pair = item
                .as_tuple()
                .filter(|pair| pair.len() == 2)
                .ok_or_else(|| mismatch(op, key, "an array of pairs", value))?;
            let before = pair_entry(op, key, &pair[0])?;
            let after = pair_entry(op, key, &pair[1])?;
            Ok((before, after))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn pair_entry(op: &Operation, key: &str, value: &Value) -> Result<usize> {
    value
        .as_integer()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| mismatch(op, key, "non-negative integer pairs", value))
}

/// Single reduction axis out of an `axes` list.
///
/// More than one axis is unsupported; an empty list is malformed.
pub(crate) fn single_axis(op: &Operation, key: &str, default: &[i64], rank: usize) -> Result<usize> {
    let axes = integers(op, key)?.unwrap_or_else(|| default.to_vec());
    match axes.as_slice() {
        [axis] => axis_index(op, key, *axis, rank),
        [] => Err(RuntimeError::malformed(&op.name, key, "no axis given")),
        _ => Err(RuntimeError::unsupported(
            &op.name,
            "multiple axes not implemented",
        )),
    }
}

/// Every axis in an `axes` list, normalized against `rank`.
pub(crate) fn axis_list(op: &Operation, key: &str, rank: usize) -> Result<Vec<usize>> {
    integers(op, key)?
        .unwrap_or_default()
        .into_iter()
        .map(|axis| axis_index(op, key, axis, rank))
        .collect()
}

pub(crate) fn axis_index(op: &Operation, key: &str, axis: i64, rank: usize) -> Result<usize> {
    crate::shape::normalize_axis(axis, rank).ok_or_else(|| {
        RuntimeError::malformed(
            &op.name,
            key,
            format!("axis {axis} out of range for rank {rank}"),
        )
    })
}

/// Coerce a literal attribute to the element kind of its operation.
pub(crate) fn scalar_of_kind(op: &Operation, key: &str, value: &Value) -> Result<Scalar> {
    let coerced = match (op.dtype, value) {
        (ElementKind::Float, Value::Scalar(v)) => Some(Scalar::Float(*v as f32)),
        (ElementKind::Float, Value::Integer(v)) => Some(Scalar::Float(*v as f32)),
        (ElementKind::Integer, Value::Integer(v)) => Some(Scalar::Integer(*v)),
        (ElementKind::Integer, Value::Scalar(v)) => Some(Scalar::Integer(*v as i64)),
        (ElementKind::Bool, Value::Logical(v)) => Some(Scalar::Bool(*v)),
        (ElementKind::Bool, Value::Scalar(v)) => Some(Scalar::Bool(*v != 0.0)),
        (ElementKind::Generic, _) => {
            return Err(RuntimeError::UnsupportedElementKind {
                subject: op.name.clone(),
                kind: op.dtype,
            })
        }
        _ => None,
    };
    coerced.ok_or_else(|| mismatch(op, key, op.dtype.as_str(), value))
}

/// Reject tensors whose rank exceeds what an operation supports.
pub(crate) fn check_rank(op: &Operation, rank: usize, max: usize) -> Result<()> {
    if rank > max {
        return Err(RuntimeError::unsupported(
            &op.name,
            format!("rank {rank} exceeds the supported maximum of {max}"),
        ));
    }
    Ok(())
}

fn mismatch(op: &Operation, key: &str, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::malformed(
        &op.name,
        key,
        format!("expected {expected}, found {}", found.kind_name()),
    )
}
