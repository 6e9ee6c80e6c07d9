//! rnnef graph runtime
//!
//! Executes an [`rnnef_core::Graph`] by dispatching each operation to a
//! pluggable numeric backend implementing [`Engine`].
//!
//! ## Architecture
//!
//! - **Engine**: the backend contract plus [`TraceEngine`], a recording
//!   host-memory implementation
//! - **Context**: binds graph tensors to engine tensors for one run
//! - **Ops**: the static dispatch table and per-operation executors
//! - **Runtime**: the sequential run loop, its configuration and statistics
//!
//! ## Example
//!
//! ```rust
//! use rnnef_core::{ElementKind, GraphBuilder, Operation, TensorData, Value};
//! use rnnef_runtime::{execute_graph, TraceEngine};
//!
//! let mut builder = GraphBuilder::new("relu");
//! builder
//!     .literal("x", &[4], TensorData::Float(vec![-1.0, 0.0, 1.0, 2.0]))
//!     .tensor("y", ElementKind::Float, &[4])
//!     .operation(
//!         Operation::new("relu", ElementKind::Float)
//!             .with_input("x", Value::id("x"))
//!             .with_output("y", Value::id("y")),
//!     );
//! let graph = builder.build()?;
//!
//! let ctx = execute_graph(&graph, TraceEngine::new())?;
//! assert_eq!(ctx.engine().compute_calls().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod engine;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod shape;

pub use context::Context;
pub use engine::{
    ArgReduceOp, BinaryOp, ConvParams, ConvStrategy, Engine, EngineCall, EngineTensor, PoolOp,
    PoolParams, ReduceOp, Scalar, TraceEngine, TraceTensor, UnaryOp,
};
pub use error::{Result, RuntimeError};
pub use ops::{conv_strategy, find_executor, registered_operations, Executor, OpKind, PoolFamily};
pub use runtime::{execute_graph, OperationStats, RunConfig, RunStatistics, Runtime};
