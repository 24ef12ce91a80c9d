//! Error types for the Vindex engine.

use thiserror::Error;

/// Main error type for Vindex operations.
#[derive(Error, Debug)]
pub enum VindexError {
    /// A task or plan file could not be parsed.
    #[error("{origin}:{line}: {message}")]
    Parse {
        origin: String,
        line: usize,
        message: String,
    },

    /// The task file declares a format version this engine does not read.
    #[error("unsupported task format version '{found}', only version 3 is supported")]
    UnsupportedVersion { found: String },

    /// Plans reference operators by name, so names must be unique.
    #[error("duplicate operator name {name}")]
    DuplicateOperator { name: String },

    /// The elimination pipeline cannot handle tasks with derived variables.
    #[error("axioms are not supported by the action elimination pipeline")]
    AxiomsUnsupported,

    /// A plan step names an operator the task does not define.
    #[error("plan references unknown operator {name}")]
    UnknownOperator { name: String },

    /// A structural invariant of the task is violated.
    #[error("invalid task: {message}")]
    InvalidTask { message: String },

    /// The reduced task needs no actions at all; emitting it would be useless.
    #[error("action elimination task is trivially solvable, no task was generated")]
    TriviallySolvable,

    /// A required precondition has no recorded producer; the task is malformed.
    #[error("no achiever for fact ({var}, {val}) required at plan step {position}")]
    NoAchiever {
        var: usize,
        val: usize,
        position: usize,
    },

    /// The cost-scaling record does not cover an operator of the solution plan.
    #[error("cost record is missing operator {name}")]
    MissingOriginalCost { name: String },

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VindexError {
    /// Returns true for errors raised while loading task or plan files.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            VindexError::Parse { .. }
                | VindexError::UnsupportedVersion { .. }
                | VindexError::DuplicateOperator { .. }
                | VindexError::AxiomsUnsupported
                | VindexError::UnknownOperator { .. }
                | VindexError::InvalidTask { .. }
                | VindexError::Io(_)
        )
    }
}

/// Convenience Result type for Vindex operations.
pub type Result<T> = std::result::Result<T, VindexError>;

impl From<serde_json::Error> for VindexError {
    fn from(err: serde_json::Error) -> Self {
        VindexError::Serialization(err.to_string())
    }
}
