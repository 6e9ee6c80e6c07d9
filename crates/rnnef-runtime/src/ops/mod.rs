//! Operation dispatch table.
//!
//! Every supported operation name maps to an [`Executor`] holding a closed
//! [`OpKind`]. The table is a static slice sorted by name and never changes
//! at runtime; [`find_executor`] looks names up by binary search.
//!
//! Some names are registered without an implementation (the upsampling and
//! normalization families among them). They resolve their operands and then
//! fail with [`RuntimeError::UnsupportedOperation`], which lets callers tell
//! a known-but-unsupported operation apart from an unknown name.

mod attrs;
mod conv;
mod elementwise;
mod layout;
mod linalg;
mod variables;

pub use conv::conv_strategy;

use crate::context::Context;
use crate::engine::{ArgReduceOp, BinaryOp, Engine, ReduceOp, UnaryOp};
use crate::error::{Result, RuntimeError};
use rnnef_core::{ElementKind, Operation};

use ElementKind::{Bool, Float};

/// Pooling operator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolFamily {
    /// Sum, or average when `normalize` is set.
    Box,
    /// Average.
    Avg,
    /// Maximum.
    Max,
}

/// What an executor does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Element-wise unary operator of a fixed element kind.
    Unary(ElementKind, UnaryOp),
    /// Element-wise binary operator of a fixed element kind.
    Binary(ElementKind, BinaryOp),
    /// Reduction over an axis list.
    Reduce(ElementKind, ReduceOp),
    /// Index of the extreme element along one axis.
    ArgReduce(ArgReduceOp),
    /// Ternary select.
    Select,
    /// Convolution or deconvolution.
    Conv {
        /// Deconvolution.
        transposed: bool,
    },
    /// Window pooling.
    Pool {
        /// Reduction applied to each window.
        family: PoolFamily,
        /// Scatter back to the larger tensor.
        transposed: bool,
    },
    /// `reshape`, `squeeze` and `unsqueeze`: a plain copy.
    Reshape,
    /// Axis permutation.
    Transpose,
    /// `concat` and `stack`.
    Concat {
        /// List forms a new axis.
        singular: bool,
    },
    /// `split` and `unstack`.
    Split {
        /// List forms a new axis.
        singular: bool,
    },
    /// Constant or replicate padding.
    Pad,
    /// Repetition.
    Tile,
    /// Strided window.
    Slice,
    /// Matrix product.
    Matmul,
    /// Matrix product plus bias.
    Linear,
    /// Normalized exponential.
    Softmax,
    /// Input supplied by the caller.
    External,
    /// Parameter supplied by the caller.
    Variable,
    /// Literal fill.
    Constant,
    /// Copy into a variable.
    Update,
    /// Registered but without an implementation.
    Unimplemented,
}

/// A dispatch table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    /// Operation name as it appears in graphs.
    pub name: &'static str,
    /// Behavior.
    pub kind: OpKind,
}

const fn entry(name: &'static str, kind: OpKind) -> Executor {
    Executor { name, kind }
}

const fn unary(name: &'static str, op: UnaryOp) -> Executor {
    entry(name, OpKind::Unary(Float, op))
}

const fn binary(name: &'static str, op: BinaryOp) -> Executor {
    entry(name, OpKind::Binary(Float, op))
}

const fn unimplemented(name: &'static str) -> Executor {
    entry(name, OpKind::Unimplemented)
}

/// All registered executors, sorted by name.
static EXECUTORS: &[Executor] = &[
    unary("abs", UnaryOp::Abs),
    binary("add", BinaryOp::Add),
    entry("all_reduce", OpKind::Reduce(Bool, ReduceOp::All)),
    entry("and", OpKind::Binary(Bool, BinaryOp::And)),
    entry("any_reduce", OpKind::Reduce(Bool, ReduceOp::Any)),
    unimplemented("area_downsample"),
    unimplemented("argmax_pool"),
    entry("argmax_reduce", OpKind::ArgReduce(ArgReduceOp::ArgMax)),
    entry("argmin_reduce", OpKind::ArgReduce(ArgReduceOp::ArgMin)),
    entry(
        "avg_pool",
        OpKind::Pool {
            family: PoolFamily::Avg,
            transposed: false,
        },
    ),
    unimplemented("batch_normalization"),
    entry(
        "box",
        OpKind::Pool {
            family: PoolFamily::Box,
            transposed: false,
        },
    ),
    unary("ceil", UnaryOp::Ceil),
    entry("concat", OpKind::Concat { singular: false }),
    entry("constant", OpKind::Constant),
    entry("conv", OpKind::Conv { transposed: false }),
    unary("copy", UnaryOp::Copy),
    unary("cos", UnaryOp::Cos),
    entry(
        "debox",
        OpKind::Pool {
            family: PoolFamily::Box,
            transposed: true,
        },
    ),
    entry("deconv", OpKind::Conv { transposed: true }),
    unimplemented("desample"),
    binary("div", BinaryOp::Div),
    unary("elu", UnaryOp::Elu),
    binary("eq", BinaryOp::Eq),
    unary("exp", UnaryOp::Exp),
    entry("external", OpKind::External),
    unary("floor", UnaryOp::Floor),
    binary("ge", BinaryOp::Ge),
    unary("gelu", UnaryOp::Gelu),
    binary("gt", BinaryOp::Gt),
    unimplemented("l1_normalization"),
    unimplemented("l2_normalization"),
    binary("le", BinaryOp::Le),
    entry("linear", OpKind::Linear),
    unimplemented("local_response_normalization"),
    unary("log", UnaryOp::Log),
    unary("log2", UnaryOp::Log2),
    binary("lt", BinaryOp::Lt),
    entry("matmul", OpKind::Matmul),
    binary("max", BinaryOp::Max),
    entry(
        "max_pool",
        OpKind::Pool {
            family: PoolFamily::Max,
            transposed: false,
        },
    ),
    entry("max_reduce", OpKind::Reduce(Float, ReduceOp::Max)),
    entry("mean_reduce", OpKind::Reduce(Float, ReduceOp::Mean)),
    binary("min", BinaryOp::Min),
    entry("min_reduce", OpKind::Reduce(Float, ReduceOp::Min)),
    binary("mul", BinaryOp::Mul),
    unimplemented("multilinear_upsample"),
    binary("ne", BinaryOp::Ne),
    unimplemented("nearest_downsample"),
    unimplemented("nearest_upsample"),
    unary("neg", UnaryOp::Neg),
    entry("not", OpKind::Unary(Bool, UnaryOp::Not)),
    entry("or", OpKind::Binary(Bool, BinaryOp::Or)),
    entry("pad", OpKind::Pad),
    binary("pow", BinaryOp::Pow),
    unary("rcp", UnaryOp::Rcp),
    unary("relu", UnaryOp::Relu),
    entry("reshape", OpKind::Reshape),
    unary("round", UnaryOp::Round),
    unary("rsqr", UnaryOp::Rsqr),
    unary("rsqrt", UnaryOp::Rsqrt),
    unimplemented("sample"),
    entry("select", OpKind::Select),
    unimplemented("separable_conv"),
    unimplemented("separable_deconv"),
    unary("sigmoid", UnaryOp::Sigmoid),
    unary("sign", UnaryOp::Sign),
    unary("silu", UnaryOp::Silu),
    unary("sin", UnaryOp::Sin),
    entry("slice", OpKind::Slice),
    entry("softmax", OpKind::Softmax),
    unary("softplus", UnaryOp::Softplus),
    entry("split", OpKind::Split { singular: false }),
    unary("sqr", UnaryOp::Sqr),
    unary("sqrt", UnaryOp::Sqrt),
    entry("squeeze", OpKind::Reshape),
    entry("stack", OpKind::Concat { singular: true }),
    binary("sub", BinaryOp::Sub),
    entry("sum_reduce", OpKind::Reduce(Float, ReduceOp::Sum)),
    unary("tan", UnaryOp::Tan),
    unary("tanh", UnaryOp::Tanh),
    entry("tile", OpKind::Tile),
    entry("transpose", OpKind::Transpose),
    entry("unsqueeze", OpKind::Reshape),
    entry("unstack", OpKind::Split { singular: true }),
    entry("update", OpKind::Update),
    entry("variable", OpKind::Variable),
];

/// Look up the executor registered under `name`.
pub fn find_executor(name: &str) -> Option<&'static Executor> {
    EXECUTORS
        .binary_search_by(|e| e.name.cmp(name))
        .ok()
        .map(|index| &EXECUTORS[index])
}

/// Names of every registered operation, sorted.
pub fn registered_operations() -> impl Iterator<Item = &'static str> {
    EXECUTORS.iter().map(|e| e.name)
}

impl Executor {
    /// Run the operation against a context.
    ///
    /// Operations of the generic element kind are rejected before any
    /// operand is resolved. Literal scratch tensors created while resolving
    /// operands are released before returning, whether or not the operation
    /// succeeded.
    pub fn execute<E: Engine>(&self, ctx: &mut Context<E>, op: &Operation) -> Result<()> {
        if !op.dtype.is_concrete() {
            return Err(RuntimeError::UnsupportedElementKind {
                subject: op.name.clone(),
                kind: op.dtype,
            });
        }
        let result = self.dispatch(ctx, op);
        let released = ctx.release_scratch();
        result.and(released)
    }

    fn dispatch<E: Engine>(&self, ctx: &mut Context<E>, op: &Operation) -> Result<()> {
        match self.kind {
            OpKind::Unary(kind, unary) => elementwise::unary(ctx, op, kind, unary),
            OpKind::Binary(kind, binary) => elementwise::binary(ctx, op, kind, binary),
            OpKind::Reduce(kind, reduce) => elementwise::reduce(ctx, op, kind, reduce),
            OpKind::ArgReduce(arg) => elementwise::arg_reduce(ctx, op, arg),
            OpKind::Select => elementwise::select(ctx, op),
            OpKind::Conv { transposed } => conv::conv(ctx, op, transposed),
            OpKind::Pool { family, transposed } => conv::pool(ctx, op, family, transposed),
            OpKind::Reshape => layout::reshape(ctx, op),
            OpKind::Transpose => layout::transpose(ctx, op),
            OpKind::Concat { singular } => layout::concat(ctx, op, singular),
            OpKind::Split { singular } => layout::split(ctx, op, singular),
            OpKind::Pad => layout::pad(ctx, op),
            OpKind::Tile => layout::tile(ctx, op),
            OpKind::Slice => layout::slice(ctx, op),
            OpKind::Matmul => linalg::matmul(ctx, op),
            OpKind::Linear => linalg::linear(ctx, op),
            OpKind::Softmax => linalg::softmax(ctx, op),
            OpKind::External | OpKind::Variable => variables::declared(ctx, op),
            OpKind::Constant => variables::constant(ctx, op),
            OpKind::Update => variables::update(ctx, op),
            OpKind::Unimplemented => {
                ctx.resolve_all(op)?;
                Err(RuntimeError::unsupported(&op.name, "operation not implemented"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_sorted_and_unique() {
        for pair in EXECUTORS.windows(2) {
            assert!(
                pair[0].name < pair[1].name,
                "'{}' must sort before '{}'",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn test_every_name_is_found() {
        for name in registered_operations() {
            let executor = find_executor(name).expect("registered");
            assert_eq!(executor.name, name);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert!(find_executor("nonexistent_op").is_none());
        assert!(find_executor("").is_none());
        assert!(find_executor("Conv").is_none());
    }

    #[test]
    fn test_family_sharing() {
        let kind = |name| find_executor(name).map(|e| e.kind);
        assert_eq!(kind("reshape"), Some(OpKind::Reshape));
        assert_eq!(kind("squeeze"), kind("unsqueeze"));
        assert_eq!(kind("stack"), Some(OpKind::Concat { singular: true }));
        assert_eq!(kind("split"), Some(OpKind::Split { singular: false }));
        assert_eq!(kind("not"), Some(OpKind::Unary(Bool, UnaryOp::Not)));
        assert_eq!(
            kind("multilinear_upsample"),
            Some(OpKind::Unimplemented)
        );
    }
}
