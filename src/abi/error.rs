//! Errors of routine generation.

use thiserror::Error;

use crate::types::TypeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// A combination of source and target the generator does not support.
    #[error("Encoding from {from} to {to} is not implemented")]
    Unimplemented { from: String, to: String },

    #[error("Type {0} cannot be ABI encoded or decoded")]
    NotEncodable(String),

    #[error("Expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Type(TypeError),
}

impl From<TypeError> for AbiError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::NotEncodable(ty) => AbiError::NotEncodable(ty),
            TypeError::NoInterfaceType(reason) => AbiError::NotEncodable(reason),
            other => AbiError::Type(other),
        }
    }
}

impl AbiError {
    pub(crate) fn unimplemented(from: impl ToString, to: impl ToString) -> Self {
        AbiError::Unimplemented {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
