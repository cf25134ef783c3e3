//! Error types for replay and history operations.
//!
//! Only conditions a caller can meaningfully react to are errors. Broken
//! preconditions (recording on a closed transaction, a missing adapter, a
//! duplicate `add`) panic instead.

use thiserror::Error;

/// Recoverable failures raised while replaying or managing history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UowError {
    /// The entity a replay step refers to no longer exists in the document.
    #[error("target not found: {0}")]
    TargetNotFound(String),
    /// The document is in a state where the step cannot be applied.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A replay step needed a captured snapshot but found the untracked sentinel.
    #[error("missing snapshot for {0}")]
    MissingSnapshot(String),
    /// `undo` was requested with an empty undo stack.
    #[error("nothing to undo")]
    NothingToUndo,
    /// `redo` was requested with an empty redo stack.
    #[error("nothing to redo")]
    NothingToRedo,
    /// History configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
    /// A custom error with a description.
    #[error("{0}")]
    Custom(String),
}

/// Result type for replay and history operations.
pub type UowResult<T = ()> = Result<T, UowError>;
