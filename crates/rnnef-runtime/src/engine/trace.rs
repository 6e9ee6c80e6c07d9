//! Host-memory engine that records every primitive call.
//!
//! Storage primitives (`allocate`, `fill`, `read`, `copy`, `release`) work on
//! real buffers so values written before a run can be read back after it.
//! Compute primitives are logged but leave their outputs untouched. This
//! makes the engine useful as a dry-run backend and as a test double for
//! checking which primitive an operation dispatches to.

use super::{
    ArgReduceOp, BinaryOp, ConvParams, ConvStrategy, Engine, EngineTensor, PoolOp, PoolParams,
    ReduceOp, Scalar, UnaryOp,
};
use anyhow::{anyhow, bail, Result};
use rnnef_core::{volume, ElementKind, TensorData};
use serde::Serialize;

/// Handle to a buffer owned by a [`TraceEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceTensor {
    id: usize,
    kind: ElementKind,
    shape: Vec<usize>,
}

impl TraceTensor {
    /// Buffer index inside the owning engine.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl EngineTensor for TraceTensor {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// One recorded primitive invocation. Tensors are identified by buffer id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EngineCall {
    Allocate {
        id: usize,
        kind: ElementKind,
        shape: Vec<usize>,
    },
    Release {
        id: usize,
    },
    Fill {
        id: usize,
    },
    Read {
        id: usize,
    },
    Copy {
        x: usize,
        y: usize,
    },
    Unary {
        op: UnaryOp,
        kind: ElementKind,
        x: usize,
        y: usize,
    },
    Binary {
        op: BinaryOp,
        kind: ElementKind,
        x: usize,
        y: usize,
        z: usize,
    },
    Select {
        c: usize,
        x: usize,
        y: usize,
        z: usize,
    },
    Reduce {
        op: ReduceOp,
        kind: ElementKind,
        x: usize,
        y: usize,
        axes: Vec<usize>,
    },
    ArgReduce {
        op: ArgReduceOp,
        x: usize,
        y: usize,
        axis: usize,
    },
    Softmax {
        x: usize,
        y: usize,
        axis: usize,
    },
    Conv {
        strategy: ConvStrategy,
        transposed: bool,
        input: usize,
        filter: usize,
        bias: usize,
        output: usize,
        params: ConvParams,
    },
    Pool {
        op: PoolOp,
        transposed: bool,
        input: usize,
        output: usize,
        params: PoolParams,
    },
    Matmul {
        a: usize,
        b: usize,
        c: usize,
        transpose_a: bool,
        transpose_b: bool,
    },
    Linear {
        input: usize,
        filter: usize,
        bias: usize,
        output: usize,
    },
    Transpose {
        x: usize,
        y: usize,
        perm: Vec<usize>,
    },
    Concat {
        inputs: Vec<usize>,
        output: usize,
        axis: usize,
        singular: bool,
    },
    Split {
        input: usize,
        outputs: Vec<usize>,
        axis: usize,
        singular: bool,
    },
    PadConstant {
        x: usize,
        y: usize,
        padding: Vec<(usize, usize)>,
        value: Scalar,
    },
    PadReplicate {
        x: usize,
        y: usize,
        padding: Vec<(usize, usize)>,
    },
    Tile {
        x: usize,
        y: usize,
    },
    Slice {
        x: usize,
        y: usize,
        offsets: Vec<usize>,
        strides: Vec<usize>,
    },
}

impl EngineCall {
    /// Whether the call moves data in or out of the engine rather than
    /// computing anything.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            EngineCall::Allocate { .. }
                | EngineCall::Release { .. }
                | EngineCall::Fill { .. }
                | EngineCall::Read { .. }
        )
    }
}

/// Recording engine backed by host vectors.
#[derive(Debug, Default)]
pub struct TraceEngine {
    buffers: Vec<Option<TensorData>>,
    calls: Vec<EngineCall>,
    fail_on: Option<String>,
}

impl TraceEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call to the named primitive fail.
    pub fn fail_on(mut self, primitive: impl Into<String>) -> Self {
        self.fail_on = Some(primitive.into());
        self
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Recorded calls excluding storage traffic.
    pub fn compute_calls(&self) -> Vec<&EngineCall> {
        self.calls.iter().filter(|c| !c.is_storage()).collect()
    }

    /// Drain the call log.
    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of allocated, not yet released buffers.
    pub fn live_tensors(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    /// Contents of a live buffer.
    pub fn data(&self, id: usize) -> Option<&TensorData> {
        self.buffers.get(id).and_then(Option::as_ref)
    }

    fn check(&self, primitive: &str) -> Result<()> {
        match &self.fail_on {
            Some(name) if name == primitive => bail!("injected failure in '{primitive}'"),
            _ => Ok(()),
        }
    }

    fn buffer(&self, tensor: &TraceTensor) -> Result<&TensorData> {
        self.data(tensor.id)
            .ok_or_else(|| anyhow!("tensor #{} is not live", tensor.id))
    }

    fn buffer_mut(&mut self, tensor: &TraceTensor) -> Result<&mut TensorData> {
        self.buffers
            .get_mut(tensor.id)
            .and_then(Option::as_mut)
            .ok_or_else(|| anyhow!("tensor #{} is not live", tensor.id))
    }

    fn record(&mut self, primitive: &str, call: EngineCall) -> Result<()> {
        self.check(primitive)?;
        self.calls.push(call);
        Ok(())
    }
}

impl Engine for TraceEngine {
    type Tensor = TraceTensor;

    fn name(&self) -> &str {
        "trace"
    }

    fn allocate(&mut self, kind: ElementKind, shape: &[usize]) -> Result<TraceTensor> {
        self.check("allocate")?;
        let data = TensorData::zeros(kind, volume(shape))
            .ok_or_else(|| anyhow!("cannot allocate tensor of kind '{kind}'"))?;
        let id = self.buffers.len();
        self.buffers.push(Some(data));
        self.calls.push(EngineCall::Allocate {
            id,
            kind,
            shape: shape.to_vec(),
        });
        Ok(TraceTensor {
            id,
            kind,
            shape: shape.to_vec(),
        })
    }

    fn release(&mut self, tensor: TraceTensor) -> Result<()> {
        self.check("release")?;
        let slot = self
            .buffers
            .get_mut(tensor.id)
            .filter(|b| b.is_some())
            .ok_or_else(|| anyhow!("double release of tensor #{}", tensor.id))?;
        *slot = None;
        self.calls.push(EngineCall::Release { id: tensor.id });
        Ok(())
    }

    fn fill(&mut self, tensor: &TraceTensor, data: &TensorData) -> Result<()> {
        self.check("fill")?;
        let buffer = self.buffer_mut(tensor)?;
        if buffer.kind() != data.kind() || buffer.len() != data.len() {
            bail!(
                "cannot fill {} x {} tensor #{} with {} x {}",
                buffer.len(),
                buffer.kind(),
                tensor.id,
                data.len(),
                data.kind()
            );
        }
        *buffer = data.clone();
        self.calls.push(EngineCall::Fill { id: tensor.id });
        Ok(())
    }

    fn read(&mut self, tensor: &TraceTensor) -> Result<TensorData> {
        self.check("read")?;
        let data = self.buffer(tensor)?.clone();
        self.calls.push(EngineCall::Read { id: tensor.id });
        Ok(data)
    }

    fn copy(&mut self, x: &TraceTensor, y: &TraceTensor) -> Result<()> {
        self.check("copy")?;
        let source = self.buffer(x)?.clone();
        let target = self.buffer_mut(y)?;
        if source.kind() != target.kind() || source.len() != target.len() {
            bail!("copy between incompatible tensors #{} and #{}", x.id, y.id);
        }
        *target = source;
        self.calls.push(EngineCall::Copy { x: x.id, y: y.id });
        Ok(())
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        kind: ElementKind,
        x: &TraceTensor,
        y: &TraceTensor,
    ) -> Result<()> {
        self.record(
            "unary",
            EngineCall::Unary {
                op,
                kind,
                x: x.id,
                y: y.id,
            },
        )
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        kind: ElementKind,
        x: &TraceTensor,
        y: &TraceTensor,
        z: &TraceTensor,
    ) -> Result<()> {
        self.record(
            "binary",
            EngineCall::Binary {
                op,
                kind,
                x: x.id,
                y: y.id,
                z: z.id,
            },
        )
    }

    fn select(
        &mut self,
        c: &TraceTensor,
        x: &TraceTensor,
        y: &TraceTensor,
        z: &TraceTensor,
    ) -> Result<()> {
        self.record(
            "select",
            EngineCall::Select {
                c: c.id,
                x: x.id,
                y: y.id,
                z: z.id,
            },
        )
    }

    fn reduce(
        &mut self,
        op: ReduceOp,
        kind: ElementKind,
        x: &TraceTensor,
        y: &TraceTensor,
        axes: &[usize],
    ) -> Result<()> {
        self.record(
            "reduce",
            EngineCall::Reduce {
                op,
                kind,
                x: x.id,
                y: y.id,
                axes: axes.to_vec(),
            },
        )
    }

    fn arg_reduce(
        &mut self,
        op: ArgReduceOp,
        x: &TraceTensor,
        y: &TraceTensor,
        axis: usize,
    ) -> Result<()> {
        self.record(
            "arg_reduce",
            EngineCall::ArgReduce {
                op,
                x: x.id,
                y: y.id,
                axis,
            },
        )
    }

    fn softmax(&mut self, x: &TraceTensor, y: &TraceTensor, axis: usize) -> Result<()> {
        self.record(
            "softmax",
            EngineCall::Softmax {
                x: x.id,
                y: y.id,
                axis,
            },
        )
    }

    fn conv(
        &mut self,
        transposed: bool,
        input: &TraceTensor,
        filter: &TraceTensor,
        bias: &TraceTensor,
        output: &TraceTensor,
        params: &ConvParams,
    ) -> Result<()> {
        self.record(
            "conv",
            EngineCall::Conv {
                strategy: ConvStrategy::Direct,
                transposed,
                input: input.id,
                filter: filter.id,
                bias: bias.id,
                output: output.id,
                params: params.clone(),
            },
        )
    }

    fn depthwise_conv(
        &mut self,
        transposed: bool,
        input: &TraceTensor,
        filter: &TraceTensor,
        bias: &TraceTensor,
        output: &TraceTensor,
        params: &ConvParams,
    ) -> Result<()> {
        self.record(
            "depthwise_conv",
            EngineCall::Conv {
                strategy: ConvStrategy::Depthwise,
                transposed,
                input: input.id,
                filter: filter.id,
                bias: bias.id,
                output: output.id,
                params: params.clone(),
            },
        )
    }

    fn grouped_conv(
        &mut self,
        transposed: bool,
        input: &TraceTensor,
        filter: &TraceTensor,
        bias: &TraceTensor,
        output: &TraceTensor,
        groups: usize,
        params: &ConvParams,
    ) -> Result<()> {
        self.record(
            "grouped_conv",
            EngineCall::Conv {
                strategy: ConvStrategy::Grouped(groups),
                transposed,
                input: input.id,
                filter: filter.id,
                bias: bias.id,
                output: output.id,
                params: params.clone(),
            },
        )
    }

    fn pool(
        &mut self,
        op: PoolOp,
        transposed: bool,
        input: &TraceTensor,
        output: &TraceTensor,
        params: &PoolParams,
    ) -> Result<()> {
        self.record(
            "pool",
            EngineCall::Pool {
                op,
                transposed,
                input: input.id,
                output: output.id,
                params: params.clone(),
            },
        )
    }

    fn matmul(
        &mut self,
        a: &TraceTensor,
        b: &TraceTensor,
        c: &TraceTensor,
        transpose_a: bool,
        transpose_b: bool,
    ) -> Result<()> {
        self.record(
            "matmul",
            EngineCall::Matmul {
                a: a.id,
                b: b.id,
                c: c.id,
                transpose_a,
                transpose_b,
            },
        )
    }

    fn linear(
        &mut self,
        input: &TraceTensor,
        filter: &TraceTensor,
        bias: &TraceTensor,
        output: &TraceTensor,
    ) -> Result<()> {
        self.record(
            "linear",
            EngineCall::Linear {
                input: input.id,
                filter: filter.id,
                bias: bias.id,
                output: output.id,
            },
        )
    }

    fn transpose(&mut self, x: &TraceTensor, y: &TraceTensor, perm: &[usize]) -> Result<()> {
        self.record(
            "transpose",
            EngineCall::Transpose {
                x: x.id,
                y: y.id,
                perm: perm.to_vec(),
            },
        )
    }

    fn concat(
        &mut self,
        inputs: &[TraceTensor],
        output: &TraceTensor,
        axis: usize,
        singular: bool,
    ) -> Result<()> {
        self.record(
            "concat",
            EngineCall::Concat {
                inputs: inputs.iter().map(TraceTensor::id).collect(),
                output: output.id,
                axis,
                singular,
            },
        )
    }

    fn split(
        &mut self,
        input: &TraceTensor,
        outputs: &[TraceTensor],
        axis: usize,
        singular: bool,
    ) -> Result<()> {
        self.record(
            "split",
            EngineCall::Split {
                input: input.id,
                outputs: outputs.iter().map(TraceTensor::id).collect(),
                axis,
                singular,
            },
        )
    }

    fn pad_constant(
        &mut self,
        x: &TraceTensor,
        y: &TraceTensor,
        padding: &[(usize, usize)],
        value: Scalar,
    ) -> Result<()> {
        self.record(
            "pad_constant",
            EngineCall::PadConstant {
                x: x.id,
                y: y.id,
                padding: padding.to_vec(),
                value,
            },
        )
    }

    fn pad_replicate(
        &mut self,
        x: &TraceTensor,
        y: &TraceTensor,
        padding: &[(usize, usize)],
    ) -> Result<()> {
        self.record(
            "pad_replicate",
            EngineCall::PadReplicate {
                x: x.id,
                y: y.id,
                padding: padding.to_vec(),
            },
        )
    }

    fn tile(&mut self, x: &TraceTensor, y: &TraceTensor) -> Result<()> {
        self.record("tile", EngineCall::Tile { x: x.id, y: y.id })
    }

    fn slice(
        &mut self,
        x: &TraceTensor,
        y: &TraceTensor,
        offsets: &[usize],
        strides: &[usize],
    ) -> Result<()> {
        self.record(
            "slice",
            EngineCall::Slice {
                x: x.id,
                y: y.id,
                offsets: offsets.to_vec(),
                strides: strides.to_vec(),
            },
        )
    }
}
