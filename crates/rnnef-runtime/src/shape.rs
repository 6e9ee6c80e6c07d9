//! Shape arithmetic used when filling in defaulted attributes.
//!
//! Everything here is pure and works on plain dimension slices; executors
//! turn the `None` results into operand errors.

/// Symmetric SAME-style padding for one axis.
///
/// `max(0, (output - 1) * stride + (filter - 1) * dilation + 1 - input) / 2`,
/// using floor division. An odd total is rounded down on both sides.
/// Returns `None` when the window extent overflows `usize`.
pub fn same_padding(
    input: usize,
    output: usize,
    filter: usize,
    stride: usize,
    dilation: usize,
) -> Option<usize> {
    let span = output.saturating_sub(1).checked_mul(stride)?;
    let reach = filter.saturating_sub(1).checked_mul(dilation)?;
    let needed = span.checked_add(reach)?.checked_add(1)?;
    Some(needed.saturating_sub(input) / 2)
}

/// [`same_padding`] applied per axis, as `(before, after)` pairs.
///
/// All slices are indexed by the same axes; the shortest one bounds the
/// result. Returns `None` if any axis overflows.
pub fn same_padding_all(
    input: &[usize],
    output: &[usize],
    filter: &[usize],
    stride: &[usize],
    dilation: &[usize],
) -> Option<Vec<(usize, usize)>> {
    input
        .iter()
        .zip(output)
        .zip(filter)
        .zip(stride)
        .zip(dilation)
        .map(|((((&i, &o), &f), &s), &d)| {
            let p = same_padding(i, o, f, s, d)?;
            Some((p, p))
        })
        .collect()
}

/// Full permutation for a transpose.
///
/// The listed axes come first; any axes of `rank` not covered by the list
/// keep their position after them. Returns `None` unless the result is a
/// permutation of `0..rank`.
pub fn transpose_permutation(axes: &[usize], rank: usize) -> Option<Vec<usize>> {
    if axes.len() > rank {
        return None;
    }
    let perm: Vec<usize> = axes.iter().copied().chain(axes.len()..rank).collect();

    let mut seen = vec![false; rank];
    for &axis in &perm {
        if axis >= rank || std::mem::replace(&mut seen[axis], true) {
            return None;
        }
    }
    Some(perm)
}

/// Normalize a possibly negative axis index against `rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    (0..rank).contains(&axis).then_some(axis as usize)
}

/// Per-axis start offsets of a slice.
///
/// `axes` and `begin` are parallel lists. Unlisted axes start at zero;
/// negative begins count from the end of the axis. Returns `None` when the
/// lists differ in length or an axis or begin falls outside `shape`.
pub fn slice_offsets(shape: &[usize], axes: &[i64], begin: &[i64]) -> Option<Vec<usize>> {
    if axes.len() != begin.len() {
        return None;
    }
    let mut offsets = vec![0; shape.len()];
    for (&axis, &start) in axes.iter().zip(begin) {
        let axis = normalize_axis(axis, shape.len())?;
        let dim = shape[axis] as i64;
        let start = if start < 0 { start + dim } else { start };
        if !(0..=dim).contains(&start) {
            return None;
        }
        offsets[axis] = start as usize;
    }
    Some(offsets)
}

/// Per-axis strides of a slice; unlisted axes step by one.
///
/// Returns `None` for mismatched lists, bad axes, or non-positive strides.
pub fn slice_strides(rank: usize, axes: &[i64], stride: &[i64]) -> Option<Vec<usize>> {
    let mut strides = vec![1; rank];
    if stride.is_empty() {
        return Some(strides);
    }
    if axes.len() != stride.len() {
        return None;
    }
    for (&axis, &step) in axes.iter().zip(stride) {
        let axis = normalize_axis(axis, rank)?;
        if step <= 0 {
            return None;
        }
        strides[axis] = step as usize;
    }
    Some(strides)
}
