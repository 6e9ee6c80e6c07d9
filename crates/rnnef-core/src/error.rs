//! Error types for graph construction and validation.

use thiserror::Error;

/// Result type for core graph operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building or validating a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Two tensors were declared with the same name.
    #[error("duplicate tensor declaration '{0}'")]
    DuplicateTensor(String),

    /// An operation refers to a tensor that the graph does not declare.
    #[error("operation #{index} '{op}' references undeclared tensor '{tensor}'")]
    UndeclaredTensor {
        /// Position of the operation in the graph.
        index: usize,
        /// Kind name of the operation.
        op: String,
        /// The identifier that did not resolve.
        tensor: String,
    },

    /// Tensor rank exceeds [`crate::MAX_RANK`].
    #[error("tensor '{tensor}' has rank {rank}, maximum is {max}")]
    RankTooLarge {
        /// Tensor name.
        tensor: String,
        /// Declared rank.
        rank: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Literal payload disagrees with the tensor declaration.
    #[error("tensor '{tensor}' literal payload is invalid: {reason}")]
    InvalidPayload {
        /// Tensor name.
        tensor: String,
        /// What is wrong with the payload.
        reason: String,
    },

    /// Unrecognized element kind name.
    #[error("unknown element kind '{0}'")]
    UnknownElementKind(String),
}
