//! Abnormal termination of routine execution.

use thiserror::Error;

/// Why execution stopped without producing values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    #[error("Execution reverted")]
    Revert,

    #[error("Invalid instruction reached")]
    Invalid,

    #[error("Memory access at {offset} (+{len} bytes) exceeds the limit of {limit} bytes")]
    MemoryLimit {
        offset: String,
        len: String,
        limit: usize,
    },

    #[error("Step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("Unknown routine: {0}")]
    UnknownRoutine(String),

    #[error("Routine {name} expects {expected} values, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

impl Halt {
    /// The routine reverted (as opposed to failing structurally).
    pub fn is_revert(&self) -> bool {
        matches!(self, Halt::Revert)
    }
}
