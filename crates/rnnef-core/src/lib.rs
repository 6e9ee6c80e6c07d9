//! rnnef core graph representation
//!
//! This crate provides the intermediate representation executed by
//! `rnnef-runtime`: tensors, operations, operand values and the graph that
//! ties them together.
//!
//! ## Architecture
//!
//! - **Types**: element kinds and literal payloads
//! - **Value**: tagged operand/attribute values
//! - **Graph**: named tensors plus operations in execution order
//! - **Logging**: `tracing` subscriber setup shared by the workspace
//!
//! ## Example
//!
//! ```rust
//! use rnnef_core::{ElementKind, GraphBuilder, Operation, Value};
//!
//! let mut builder = GraphBuilder::new("net");
//! builder
//!     .tensor("x", ElementKind::Float, &[1, 8])
//!     .tensor("y", ElementKind::Float, &[1, 8])
//!     .operation(
//!         Operation::new("relu", ElementKind::Float)
//!             .with_input("x", Value::id("x"))
//!             .with_output("y", Value::id("y")),
//!     );
//! let graph = builder.build()?;
//! assert_eq!(graph.operation_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Error types for graph construction
pub mod error;
pub mod graph;
pub mod logging;
pub mod types;
pub mod value;

pub use error::{CoreError, Result};
pub use graph::{Graph, GraphBuilder, GraphStatistics, Operation, Tensor};
pub use logging::{init_default_logging, init_logging, LogLevel, LoggingConfig};
pub use types::{volume, ElementKind, TensorData, MAX_RANK};
pub use value::Value;
