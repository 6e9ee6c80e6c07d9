//! Element-wise, reduction and select executors. One primitive call each.

use super::attrs;
use crate::context::Context;
use crate::engine::{ArgReduceOp, BinaryOp, Engine, EngineTensor, ReduceOp, UnaryOp};
use crate::error::Result;
use rnnef_core::{ElementKind, Operation};

pub(crate) fn unary<E: Engine>(
    ctx: &mut Context<E>,
    op: &Operation,
    kind: ElementKind,
    unary: UnaryOp,
) -> Result<()> {
    let x = ctx.input(op, "x")?;
    let y = ctx.output(op, "y")?;
    ctx.invoke("unary", |e| e.unary(unary, kind, &x, &y))
}

pub(crate) fn binary<E: Engine>(
    ctx: &mut Context<E>,
    op: &Operation,
    kind: ElementKind,
    binary: BinaryOp,
) -> Result<()> {
    let x = ctx.input(op, "x")?;
    let y = ctx.input(op, "y")?;
    let z = ctx.output(op, "z")?;
    ctx.invoke("binary", |e| e.binary(binary, kind, &x, &y, &z))
}

pub(crate) fn reduce<E: Engine>(
    ctx: &mut Context<E>,
    op: &Operation,
    kind: ElementKind,
    reduce: ReduceOp,
) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    let axes = attrs::axis_list(op, "axes", input.rank())?;

    let reduce = match reduce {
        ReduceOp::Sum if attrs::logical(op, "normalize", false)? => ReduceOp::Mean,
        other => other,
    };
    ctx.invoke("reduce", |e| e.reduce(reduce, kind, &input, &output, &axes))
}

pub(crate) fn arg_reduce<E: Engine>(
    ctx: &mut Context<E>,
    op: &Operation,
    arg: ArgReduceOp,
) -> Result<()> {
    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    let axis = attrs::single_axis(op, "axes", &[], input.rank())?;
    ctx.invoke("arg_reduce", |e| e.arg_reduce(arg, &input, &output, axis))
}

pub(crate) fn select<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let condition = ctx.input(op, "condition")?;
    let true_value = ctx.input(op, "true_value")?;
    let false_value = ctx.input(op, "false_value")?;
    let output = ctx.output(op, "output")?;
    ctx.invoke("select", |e| {
        e.select(&condition, &true_value, &false_value, &output)
    })
}
