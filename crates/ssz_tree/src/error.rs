//! Value-level errors.

use thiserror::Error;

use crate::DecodeError;

/// Returned when an operation on a typed value cannot be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Element access past the value's current length.
    #[error("index {i} is out of bounds for length {len}")]
    OutOfBounds {
        /// Requested index.
        i: usize,
        /// Current length.
        len: usize,
    },

    /// Append past a list's declared limit.
    #[error("list is full at its limit of {limit}")]
    ListFull {
        /// The declared limit.
        limit: usize,
    },

    /// A value of the wrong type was supplied, or an operation was invoked
    /// on a type that does not support it.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What the operation required.
        expected: String,
        /// What was supplied.
        actual: String,
    },

    /// Object conversion met a key the container does not declare.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// Object conversion is missing a declared container field.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A path step does not exist on the type it was applied to.
    #[error("path step {step} is not valid for {ty}")]
    InvalidPathStep {
        /// The rejected step, rendered for display.
        step: String,
        /// The type the step was applied to.
        ty: String,
    },

    /// The backing tree does not have the shape the type requires.
    #[error("backing tree has an unexpected shape: {0}")]
    InvalidBacking(String),

    /// Traversal failure in the backing tree (navigation into a leaf, or
    /// a branch absent from a partial backing).
    #[error(transparent)]
    Tree(#[from] merkle_tree::Error),

    /// Wire-format violation during deserialization.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Writer failure during streaming serialization.
    #[error("i/o failure during serialization: {0}")]
    Io(String),
}
