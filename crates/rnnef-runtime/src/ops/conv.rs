//! Convolution and pooling executors.
//!
//! Both families share the same attribute defaulting: stride and dilation
//! default to ones, and a missing padding list is derived per axis with
//! [`same_padding`](crate::shape::same_padding). For the transposed variants
//! the graph's output plays the engine's input role and the graph's input
//! plays the output role, and padding is computed on those swapped roles.

use super::{attrs, PoolFamily};
use crate::context::Context;
use crate::engine::{ConvParams, ConvStrategy, Engine, EngineTensor, PoolOp, PoolParams};
use crate::error::{Result, RuntimeError};
use crate::shape::same_padding_all;
use rnnef_core::{Operation, Value};
use tracing::debug;

/// Batch, channel and at most three spatial axes.
const MAX_CONV_RANK: usize = 5;
/// Pooling windows span every axis.
const MAX_POOL_RANK: usize = 5;

/// Pick the convolution primitive for a `groups` attribute.
///
/// `1` is a plain convolution; `0` or the input channel count is depthwise;
/// anything else is grouped.
pub fn conv_strategy(groups: usize, channels: usize) -> ConvStrategy {
    if groups == 1 {
        ConvStrategy::Direct
    } else if groups == 0 || groups == channels {
        ConvStrategy::Depthwise
    } else {
        ConvStrategy::Grouped(groups)
    }
}

struct Geometry {
    padding: Vec<(usize, usize)>,
    stride: Vec<usize>,
    dilation: Vec<usize>,
}

/// Stride, dilation and padding for the axes of `source`, defaulted as needed.
fn geometry(
    op: &Operation,
    source: &[usize],
    target: &[usize],
    window: &[usize],
) -> Result<Geometry> {
    let axes = source.len();
    let stride = attrs::sizes(op, "stride")?.unwrap_or_else(|| vec![1; axes]);
    let dilation = attrs::sizes(op, "dilation")?.unwrap_or_else(|| vec![1; axes]);
    for (key, values) in [("stride", &stride), ("dilation", &dilation)] {
        if values.len() != axes {
            return Err(RuntimeError::malformed(
                &op.name,
                key,
                format!("expected {axes} entries, found {}", values.len()),
            ));
        }
        if values.contains(&0) {
            return Err(RuntimeError::malformed(&op.name, key, "entries must be positive"));
        }
    }

    let padding = match attrs::padding(op, "padding")? {
        Some(padding) if padding.len() != axes => {
            return Err(RuntimeError::malformed(
                &op.name,
                "padding",
                format!("expected {axes} pairs, found {}", padding.len()),
            ))
        }
        Some(padding) => padding,
        None => same_padding_all(source, target, window, &stride, &dilation).ok_or_else(|| {
            RuntimeError::malformed(
                &op.name,
                "stride",
                format!("stride {stride:?} with dilation {dilation:?} overflows the window extent"),
            )
        })?,
    };

    Ok(Geometry {
        padding,
        stride,
        dilation,
    })
}

pub(crate) fn conv<E: Engine>(ctx: &mut Context<E>, op: &Operation, transposed: bool) -> Result<()> {
    let border = attrs::string(op, "border", "constant")?;
    if border != "constant" {
        return Err(RuntimeError::unsupported(
            &op.name,
            format!("border mode '{border}'"),
        ));
    }

    let input = ctx.input(op, "input")?;
    let filter = ctx.input(op, "filter")?;
    let bias = match op.input("bias") {
        Some(value) => ctx.resolve(&op.name, "bias", value)?,
        None => ctx.resolve(&op.name, "bias", &Value::Scalar(0.0))?,
    };
    let output = ctx.output(op, "output")?;

    for tensor in [&input, &filter, &output] {
        attrs::check_rank(op, tensor.rank(), MAX_CONV_RANK)?;
    }
    if input.rank() < 3 || filter.rank() != input.rank() || output.rank() != input.rank() {
        return Err(RuntimeError::malformed(
            &op.name,
            "input",
            "input, filter and output need matching batch, channel and spatial axes",
        ));
    }
    let channels = input.shape()[1];

    let (source, target) = if transposed {
        (output, input)
    } else {
        (input, output)
    };
    let geometry = geometry(
        op,
        &source.shape()[2..],
        &target.shape()[2..],
        &filter.shape()[2..],
    )?;
    let params = ConvParams {
        padding: geometry.padding,
        stride: geometry.stride,
        dilation: geometry.dilation,
    };

    let groups = attrs::integer(op, "groups", 1)?;
    let groups = usize::try_from(groups)
        .map_err(|_| RuntimeError::malformed(&op.name, "groups", "must not be negative"))?;
    let strategy = conv_strategy(groups, channels);
    debug!(op = %op.name, ?strategy, padding = ?params.padding, "convolution");

    match strategy {
        ConvStrategy::Direct => ctx.invoke("conv", |e| {
            e.conv(transposed, &source, &filter, &bias, &target, &params)
        }),
        ConvStrategy::Depthwise => ctx.invoke("depthwise_conv", |e| {
            e.depthwise_conv(transposed, &source, &filter, &bias, &target, &params)
        }),
        ConvStrategy::Grouped(groups) => ctx.invoke("grouped_conv", |e| {
            e.grouped_conv(transposed, &source, &filter, &bias, &target, groups, &params)
        }),
    }
}

pub(crate) fn pool<E: Engine>(
    ctx: &mut Context<E>,
    op: &Operation,
    family: PoolFamily,
    transposed: bool,
) -> Result<()> {
    let include_border = match attrs::string(op, "border", "constant")? {
        "constant" => true,
        "ignore" => false,
        other => {
            return Err(RuntimeError::unsupported(
                &op.name,
                format!("border mode '{other}'"),
            ))
        }
    };

    let input = ctx.input(op, "input")?;
    let output = ctx.output(op, "output")?;
    attrs::check_rank(op, input.rank(), MAX_POOL_RANK)?;
    attrs::check_rank(op, output.rank(), MAX_POOL_RANK)?;

    let (source, target) = if transposed {
        (output, input)
    } else {
        (input, output)
    };
    let size = attrs::sizes(op, "size")?
        .ok_or_else(|| RuntimeError::malformed(&op.name, "size", "missing window size"))?;
    if size.len() != source.rank() || target.rank() != source.rank() {
        return Err(RuntimeError::malformed(
            &op.name,
            "size",
            format!("window has {} axes, tensor has {}", size.len(), source.rank()),
        ));
    }
    let geometry = geometry(op, source.shape(), target.shape(), &size)?;

    let pool_op = match family {
        PoolFamily::Box if attrs::logical(op, "normalize", false)? => PoolOp::Avg,
        PoolFamily::Box => PoolOp::Sum,
        PoolFamily::Avg => PoolOp::Avg,
        PoolFamily::Max => PoolOp::Max,
    };
    let params = PoolParams {
        size,
        padding: geometry.padding,
        stride: geometry.stride,
        dilation: geometry.dilation,
        include_border,
    };
    ctx.invoke("pool", |e| {
        e.pool(pool_op, transposed, &source, &target, &params)
    })
}
