//! Error types for graph execution.
//!
//! Every condition listed here aborts the run; there is no warning tier and
//! nothing is retried.

use rnnef_core::ElementKind;
use thiserror::Error;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by the context, executors and run loop.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A graph tensor was bound twice in the same context.
    #[error("tensor '{0}' is already bound in this context")]
    DuplicateTensor(String),

    /// A graph tensor was used before being created in the context.
    #[error("tensor '{0}' has no engine binding")]
    UnboundTensor(String),

    /// Element kind outside {bool, integer, float}.
    #[error("unsupported element kind '{kind}' for {subject}")]
    UnsupportedElementKind {
        /// Tensor or operation carrying the kind.
        subject: String,
        /// The rejected kind.
        kind: ElementKind,
    },

    /// Operation parameters outside what the runtime implements.
    #[error("operation '{op}' is not supported: {reason}")]
    UnsupportedOperation {
        /// Operation kind name.
        op: String,
        /// Offending parameter or condition.
        reason: String,
    },

    /// An operand or attribute is missing or has the wrong shape of value.
    #[error("operation '{op}' has malformed operand '{operand}': {reason}")]
    MalformedOperand {
        /// Operation kind name.
        op: String,
        /// Operand or attribute key.
        operand: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No executor is registered under this operation name.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// A backend primitive failed; the engine's error is kept as the source.
    #[error("engine primitive '{primitive}' failed")]
    Engine {
        /// Name of the failing primitive.
        primitive: &'static str,
        /// Error reported by the engine.
        #[source]
        source: anyhow::Error,
    },

    /// Failure of a specific operation during a run.
    #[error("operation #{index} '{operation}' failed: {source}")]
    Operation {
        /// Position of the operation in the graph.
        index: usize,
        /// Operation kind name.
        operation: String,
        /// Underlying failure.
        #[source]
        source: Box<RuntimeError>,
    },

    /// Graph structure error surfaced before execution.
    #[error(transparent)]
    Graph(#[from] rnnef_core::CoreError),
}

impl RuntimeError {
    /// Shorthand for [`RuntimeError::UnsupportedOperation`].
    pub fn unsupported(op: &str, reason: impl Into<String>) -> Self {
        RuntimeError::UnsupportedOperation {
            op: op.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RuntimeError::MalformedOperand`].
    pub fn malformed(op: &str, operand: &str, reason: impl Into<String>) -> Self {
        RuntimeError::MalformedOperand {
            op: op.to_string(),
            operand: operand.to_string(),
            reason: reason.into(),
        }
    }

    /// The innermost error, skipping [`RuntimeError::Operation`] wrappers.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}
