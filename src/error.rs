//! Unified error type for the solty library.
//!
//! Each module keeps its own error enum; [`Error`] wraps all of them so
//! application code can use a single `Result` type.
//!
//! # Example
//!
//! ```ignore
//! use solty::prelude::*;
//!
//! fn encoder_for(reg: &TypeRegistry, names: &str) -> solty::Result<String> {
//!     let types = TypeParser::new(reg).parse_list(names)?;
//!     let mut cache = RoutineCache::new();
//!     Ok(AbiFunctions::new(reg, &mut cache).tuple_encoder(&types, &types, false)?)
//! }
//! ```

use thiserror::Error;

use crate::abi::AbiError;
#[cfg(feature = "config")]
use crate::config::ConfigError;
use crate::types::{ParseTypeError, TypeError};
use crate::vm::Halt;

/// Unified error type for all solty operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Structural failure of a type query.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Malformed type name.
    #[error(transparent)]
    Parse(#[from] ParseTypeError),

    /// Routine generation failed.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// Execution of a generated routine stopped abnormally.
    #[error(transparent)]
    Halt(#[from] Halt),

    /// Definitions file could not be read or understood.
    #[cfg(feature = "config")]
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn is_abi(&self) -> bool {
        matches!(self, Self::Abi(_))
    }

    /// Returns `true` if a routine halted (revert, invalid, limits).
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt(_))
    }

    #[cfg(feature = "config")]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_the_source() {
        let err: Error = TypeError::StorageOverflow.into();
        assert!(err.is_type());
        assert_eq!(err.to_string(), "Object too large for storage");
        let err: Error = Halt::Revert.into();
        assert!(err.is_halt() && !err.is_abi());
    }
}
