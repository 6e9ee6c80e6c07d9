//! Engine contract: the numeric backend driven by the runtime.
//!
//! The runtime never computes tensor contents itself. Every executor
//! resolves its operands to engine tensor handles and issues one primitive
//! call on an [`Engine`]. Backends implement this trait and are handed to a
//! [`Context`](crate::Context) by value, so one engine instance backs exactly
//! one context at a time. Implementations need not be `Send` or `Sync`.
//!
//! All primitives are synchronous. Their failures are reported as
//! `anyhow::Error` and surfaced by the runtime as
//! [`RuntimeError::Engine`](crate::RuntimeError::Engine).

mod trace;

pub use trace::{EngineCall, TraceEngine, TraceTensor};

use anyhow::Result;
use rnnef_core::{volume, ElementKind, TensorData};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element-wise unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Copy,
    Neg,
    Rcp,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Abs,
    Sign,
    Not,
    Floor,
    Ceil,
    Round,
    Sqr,
    Sqrt,
    Rsqr,
    Rsqrt,
    Log2,
    Relu,
    Sigmoid,
    Tanh,
    Elu,
    Softplus,
    Gelu,
    Silu,
}

/// Element-wise binary operators. Comparisons produce logical tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Reductions over a set of axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Mean,
    Max,
    Min,
    Any,
    All,
}

/// Index-producing reductions along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgReduceOp {
    ArgMax,
    ArgMin,
}

/// Window reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOp {
    Sum,
    Avg,
    Max,
}

/// Which convolution primitive an operation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvStrategy {
    /// Every output channel sees every input channel.
    Direct,
    /// One filter per input channel.
    Depthwise,
    /// Channels split into the given number of groups.
    Grouped(usize),
}

/// Geometry of a convolution over the spatial axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParams {
    /// `(before, after)` padding per spatial axis.
    pub padding: Vec<(usize, usize)>,
    /// Stride per spatial axis.
    pub stride: Vec<usize>,
    /// Dilation per spatial axis.
    pub dilation: Vec<usize>,
}

/// Geometry of a pooling window over every axis of the tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Window extent per axis.
    pub size: Vec<usize>,
    /// `(before, after)` padding per axis.
    pub padding: Vec<(usize, usize)>,
    /// Stride per axis.
    pub stride: Vec<usize>,
    /// Dilation per axis.
    pub dilation: Vec<usize>,
    /// Whether padded positions take part in averaging.
    pub include_border: bool,
}

/// A single literal element, used as the fill value of constant padding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f32),
}

impl Scalar {
    /// Element kind of the literal.
    pub fn kind(self) -> ElementKind {
        match self {
            Scalar::Bool(_) => ElementKind::Bool,
            Scalar::Integer(_) => ElementKind::Integer,
            Scalar::Float(_) => ElementKind::Float,
        }
    }

    /// One-element payload holding this literal.
    pub fn to_data(self) -> TensorData {
        match self {
            Scalar::Bool(v) => TensorData::Bool(vec![v]),
            Scalar::Integer(v) => TensorData::Integer(vec![v]),
            Scalar::Float(v) => TensorData::Float(vec![v]),
        }
    }
}

/// Read-only view of an engine tensor handle.
pub trait EngineTensor {
    /// Element kind.
    fn kind(&self) -> ElementKind;

    /// Dimensions, outermost first.
    fn shape(&self) -> &[usize];

    /// Number of dimensions.
    fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements.
    fn volume(&self) -> usize {
        volume(self.shape())
    }
}

/// A tensor-compute backend.
///
/// Handles are cheap to clone and identify storage owned by the engine.
/// The runtime releases every handle it allocated through
/// [`Engine::release`], so backends may free storage there.
pub trait Engine {
    /// Opaque tensor handle.
    type Tensor: EngineTensor + Clone + fmt::Debug;

    /// Backend name, used in logs.
    fn name(&self) -> &str;

    //  Storage

    /// Allocate an uninitialized tensor.
    fn allocate(&mut self, kind: ElementKind, shape: &[usize]) -> Result<Self::Tensor>;

    /// Release a tensor previously returned by [`Engine::allocate`].
    fn release(&mut self, tensor: Self::Tensor) -> Result<()> {
        drop(tensor);
        Ok(())
    }

    /// Overwrite a tensor's contents with a literal payload.
    fn fill(&mut self, tensor: &Self::Tensor, data: &TensorData) -> Result<()>;

    /// Read a tensor's contents back to the host.
    fn read(&mut self, tensor: &Self::Tensor) -> Result<TensorData>;

    /// Copy contents element by element, ignoring shape.
    fn copy(&mut self, x: &Self::Tensor, y: &Self::Tensor) -> Result<()>;

    //  Element-wise

    /// `y = op(x)`.
    fn unary(
        &mut self,
        op: UnaryOp,
        kind: ElementKind,
        x: &Self::Tensor,
        y: &Self::Tensor,
    ) -> Result<()>;

    /// `z = op(x, y)` with broadcasting.
    fn binary(
        &mut self,
        op: BinaryOp,
        kind: ElementKind,
        x: &Self::Tensor,
        y: &Self::Tensor,
        z: &Self::Tensor,
    ) -> Result<()>;

    /// `z = c ? x : y`.
    fn select(
        &mut self,
        c: &Self::Tensor,
        x: &Self::Tensor,
        y: &Self::Tensor,
        z: &Self::Tensor,
    ) -> Result<()>;

    //  Reductions

    /// Reduce `x` over `axes` into `y`, keeping reduced axes with extent 1.
    fn reduce(
        &mut self,
        op: ReduceOp,
        kind: ElementKind,
        x: &Self::Tensor,
        y: &Self::Tensor,
        axes: &[usize],
    ) -> Result<()>;

    /// Write the index of the extreme element along `axis` into `y`.
    fn arg_reduce(
        &mut self,
        op: ArgReduceOp,
        x: &Self::Tensor,
        y: &Self::Tensor,
        axis: usize,
    ) -> Result<()>;

    /// Normalized exponential along `axis`.
    fn softmax(&mut self, x: &Self::Tensor, y: &Self::Tensor, axis: usize) -> Result<()>;

    //  Convolution and pooling
    //
    //  With `transposed` set, `input` and `output` keep the roles of the
    //  equivalent forward operation: `input` is the larger tensor being
    //  computed and `output` is the one being read.

    /// Direct convolution (`transposed` selects deconvolution).
    fn conv(
        &mut self,
        transposed: bool,
        input: &Self::Tensor,
        filter: &Self::Tensor,
        bias: &Self::Tensor,
        output: &Self::Tensor,
        params: &ConvParams,
    ) -> Result<()>;

    /// Depthwise convolution.
    fn depthwise_conv(
        &mut self,
        transposed: bool,
        input: &Self::Tensor,
        filter: &Self::Tensor,
        bias: &Self::Tensor,
        output: &Self::Tensor,
        params: &ConvParams,
    ) -> Result<()>;

    /// Grouped convolution with an explicit group count.
    #[allow(clippy::too_many_arguments)]
    fn grouped_conv(
        &mut self,
        transposed: bool,
        input: &Self::Tensor,
        filter: &Self::Tensor,
        bias: &Self::Tensor,
        output: &Self::Tensor,
        groups: usize,
        params: &ConvParams,
    ) -> Result<()>;

    /// Window pooling (`transposed` scatters back into the larger tensor).
    fn pool(
        &mut self,
        op: PoolOp,
        transposed: bool,
        input: &Self::Tensor,
        output: &Self::Tensor,
        params: &PoolParams,
    ) -> Result<()>;

    //  Linear algebra

    /// `c = op(a) x op(b)` where `op` optionally transposes the last two axes.
    fn matmul(
        &mut self,
        a: &Self::Tensor,
        b: &Self::Tensor,
        c: &Self::Tensor,
        transpose_a: bool,
        transpose_b: bool,
    ) -> Result<()>;

    /// `output = input x filter^T + bias`.
    fn linear(
        &mut self,
        input: &Self::Tensor,
        filter: &Self::Tensor,
        bias: &Self::Tensor,
        output: &Self::Tensor,
    ) -> Result<()>;

    //  Layout

    /// Permute axes: `y` axis `i` is `x` axis `perm[i]`.
    fn transpose(&mut self, x: &Self::Tensor, y: &Self::Tensor, perm: &[usize]) -> Result<()>;

    /// Join `inputs` along `axis`. With `singular` each input forms one new
    /// slice of a new axis.
    fn concat(
        &mut self,
        inputs: &[Self::Tensor],
        output: &Self::Tensor,
        axis: usize,
        singular: bool,
    ) -> Result<()>;

    /// Inverse of [`Engine::concat`].
    fn split(
        &mut self,
        input: &Self::Tensor,
        outputs: &[Self::Tensor],
        axis: usize,
        singular: bool,
    ) -> Result<()>;

    /// Pad with a constant value.
    fn pad_constant(
        &mut self,
        x: &Self::Tensor,
        y: &Self::Tensor,
        padding: &[(usize, usize)],
        value: Scalar,
    ) -> Result<()>;

    /// Pad by repeating edge elements.
    fn pad_replicate(
        &mut self,
        x: &Self::Tensor,
        y: &Self::Tensor,
        padding: &[(usize, usize)],
    ) -> Result<()>;

    /// Repeat `x` to fill `y`; repetition counts follow from the shapes.
    fn tile(&mut self, x: &Self::Tensor, y: &Self::Tensor) -> Result<()>;

    /// Strided window of `x` starting at `offsets`, extent given by `y`.
    fn slice(
        &mut self,
        x: &Self::Tensor,
        y: &Self::Tensor,
        offsets: &[usize],
        strides: &[usize],
    ) -> Result<()>;
}
