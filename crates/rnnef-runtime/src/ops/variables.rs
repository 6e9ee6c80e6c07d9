//! Executors for tensors whose contents come from outside the graph's
//! computation: externals, variables, constants and variable updates.

use crate::context::Context;
use crate::engine::{Engine, EngineTensor};
use crate::error::{Result, RuntimeError};
use rnnef_core::{ElementKind, Operation, TensorData, Value};

/// `external` and `variable`: the caller populates the tensor, so only the
/// binding is checked.
pub(crate) fn declared<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    ctx.output(op, "output")?;
    Ok(())
}

/// Fill the output from the `value` attribute.
///
/// A literal with as many elements as the tensor is written element by
/// element; a single element is broadcast over the whole tensor.
pub(crate) fn constant<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    let output = ctx.output(op, "output")?;
    let value = op
        .attrib("value")
        .ok_or_else(|| RuntimeError::malformed(&op.name, "value", "missing literal"))?;

    let literal = literal_data(op, output.kind(), value)?;
    let data = if literal.len() == output.volume() {
        literal
    } else {
        literal.broadcast(output.volume()).ok_or_else(|| {
            RuntimeError::malformed(
                &op.name,
                "value",
                format!(
                    "{} elements cannot fill a tensor of {}",
                    literal.len(),
                    output.volume()
                ),
            )
        })?
    };
    ctx.invoke("fill", |e| e.fill(&output, &data))
}

/// Copy `value` into the `result` binding of a variable.
pub(crate) fn update<E: Engine>(ctx: &mut Context<E>, op: &Operation) -> Result<()> {
    ctx.input(op, "variable")?;
    let value = ctx.input(op, "value")?;
    let result = ctx.output(op, "result")?;
    ctx.invoke("copy", |e| e.copy(&value, &result))
}

/// Flatten a literal attribute into a payload of `kind`.
fn literal_data(op: &Operation, kind: ElementKind, value: &Value) -> Result<TensorData> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    let bad = |item: &Value| {
        RuntimeError::malformed(
            &op.name,
            "value",
            format!("{} literal in a {kind} constant", item.kind_name()),
        )
    };

    let data = match kind {
        ElementKind::Float => TensorData::Float(
            items
                .iter()
                .map(|item| item.as_scalar().map(|v| v as f32).ok_or_else(|| bad(item)))
                .collect::<Result<_>>()?,
        ),
        ElementKind::Integer => TensorData::Integer(
            items
                .iter()
                .map(|item| item.as_integer().ok_or_else(|| bad(item)))
                .collect::<Result<_>>()?,
        ),
        ElementKind::Bool => TensorData::Bool(
            items
                .iter()
                .map(|item| item.as_logical().ok_or_else(|| bad(item)))
                .collect::<Result<_>>()?,
        ),
        ElementKind::Generic => {
            return Err(RuntimeError::UnsupportedElementKind {
                subject: op.name.clone(),
                kind,
            })
        }
    };
    Ok(data)
}
