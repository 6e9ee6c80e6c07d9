//! Matrix product, fully connected and softmax executors.

use super::attrs;
use crate::context::Context;
use crate::engine::{Engine, EngineTensor};
use crate::error::Result;
use rnnef_core::{Operation, Value};

pub(crate) fn matmul<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let a = ctx.input(op, "A")?;
    let b = ctx.input(op, "B")?;
    let c = ctx.output(op, "C")?;
    let transpose_a = attrs::logical(op, "transposeA", false)?;
    let transpose_b = attrs::logical(op, "transposeB", false)?;
    ctx.invoke("matmul", |e| e.matmul(&a, &b, &c, transpose_a, transpose_b))
}

pub(crate) fn linear<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let filter = ctx.input(op, "filter")?;
    let bias = match op.input("bias") {
        Some(value) => ctx.resolve(&op.name, "bias", value)?,
        None => ctx.resolve(&op.name, "bias", &Value::Scalar(0.0))?,
    };
    let output = ctx.output(op, "output")?;
    ctx.invoke("linear", |e| e.linear(&input, &filter, &bias, &output))
}

/// Softmax over a single axis, `1` unless given.
pub(crate) fn softmax<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let x = ctx.input(op, "x")?;
    let y = ctx.output(op, "y")?;
    let axis = attrs::single_axis(op, "axes", &[1], x.rank())?;
    ctx.invoke("softmax", |e| e.softmax(&x, &y, axis))
}
