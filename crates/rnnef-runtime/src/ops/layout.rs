//! Data layout executors: reshape family, transpose, concat/split, pad,
//! tile and slice.

use super::attrs;
use crate::context::Context;
use crate::engine::{Engine, EngineTensor};
use crate::error::{Result, RuntimeError};
use crate::shape::{slice_offsets, slice_strides, transpose_permutation};
use rnnef_core::{Operation, Value};

const MAX_LAYOUT_RANK: usize = 5;

/// `reshape`, `squeeze` and `unsqueeze` only reinterpret the shape.
pub(crate) fn reshape<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    ctx.invoke("copy", |e| e.copy(&input, &output))
}

pub(crate) fn transpose<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    attrs::check_rank(op, input.rank(), MAX_LAYOUT_RANK)?;

    let axes = attrs::sizes(op, "axes")?.unwrap_or_default();
    let perm = transpose_permutation(&axes, input.rank()).ok_or_else(|| {
        RuntimeError::malformed(
            &op.name,
            "axes",
            format!("{axes:?} is not a permutation prefix for rank {}", input.rank()),
        )
    })?;
    ctx.invoke("transpose", |e| e.transpose(&input, &output, &perm))
}

pub(crate) fn concat<E: Engine>(ctx: &mut Context<E>, op: &Operation, singular: bool) -> Result<()> {
    let values = ctx.input_list(op, "values")?;
    let value = ctx.output(op, "value")?;
    // stacking adds an axis, so the output rank bounds it
    let axis = attrs::integer(op, "axis", 0)?;
    let axis = attrs::axis_index(op, "axis", axis, value.rank())?;
    ctx.invoke("concat", |e| e.concat(&values, &value, axis, singular))
}

pub(crate) fn split<E: Engine>(ctx: &mut Context<E>, op: &Operation, singular: bool) -> Result<()> {
    let value = ctx.input(op, "value")?;
    let values = ctx.output_list(op, "values")?;
    let axis = attrs::integer(op, "axis", 0)?;
    let axis = attrs::axis_index(op, "axis", axis, value.rank())?;
    ctx.invoke("split", |e| e.split(&value, &values, axis, singular))
}

pub(crate) fn pad<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    attrs::check_rank(op, input.rank(), MAX_LAYOUT_RANK)?;

    let mut padding = attrs::padding(op, "padding")?.unwrap_or_default();
    if padding.len() > input.rank() {
        return Err(RuntimeError::malformed(
            &op.name,
            "padding",
            format!("{} pairs for rank {}", padding.len(), input.rank()),
        ));
    }
    padding.resize(input.rank(), (0, 0));

    match attrs::string(op, "border", "constant")? {
        "constant" => {
            let literal = op.attrib("value").cloned().unwrap_or(Value::Scalar(0.0));
            let value = attrs::scalar_of_kind(op, "value", &literal)?;
            ctx.invoke("pad_constant", |e| {
                e.pad_constant(&input, &output, &padding, value)
            })
        }
        "replicate" => ctx.invoke("pad_replicate", |e| {
            e.pad_replicate(&input, &output, &padding)
        }),
        other => Err(RuntimeError::unsupported(
            &op.name,
            format!("border mode '{other}'"),
        )),
    }
}

pub(crate) fn tile<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    attrs::check_rank(op, input.rank(), MAX_LAYOUT_RANK)?;
    ctx.invoke("tile", |e| e.tile(&input, &output))
}

pub(crate) fn slice<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    attrs::check_rank(op, input.rank(), MAX_LAYOUT_RANK)?;

    let axes = attrs::integers(op, "axes")?.unwrap_or_default();
    let begin = attrs::integers(op, "begin")?.unwrap_or_default();
    let stride = attrs::integers(op, "stride")?.unwrap_or_default();

    let offsets = slice_offsets(input.shape(), &axes, &begin).ok_or_else(|| {
        RuntimeError::malformed(
            &op.name,
            "begin",
            format!("axes {axes:?} and begin {begin:?} do not fit shape {:?}", input.shape()),
        )
    })?;
    let strides = slice_strides(input.rank(), &axes, &stride).ok_or_else(|| {
        RuntimeError::malformed(
            &op.name,
            "stride",
            format!("axes {axes:?} and stride {stride:?} must pair up with positive steps"),
        )
    })?;
    ctx.invoke("slice", |e| e.slice(&input, &output, &offsets, &strides))
}
