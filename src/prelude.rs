//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use solty::prelude::*;
//!
//! let defs = Definitions::from_file("shapes.toml")?;
//! let reg = defs.build_registry()?;
//! let id = reg.lookup("Shapes").ok_or_else(|| anyhow::anyhow!("no contract"))?;
//! let layout = StorageLayout::for_contract(&reg, id)?;
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Type model
pub use crate::types::{
    BinaryOperator, ContractSpec, DataLocation, DefId, FunctionDef, FunctionKind, FunctionType,
    ParseTypeError, StateMutability, StateVariable, Type, TypeError, TypeParser, TypeRef,
    TypeRegistry, UnaryOperator, Visibility,
};

// Storage layout
pub use crate::layout::{Member, MemberList, StorageLayout, StorageOffsets, StorageSlot};

// Routine generation
pub use crate::abi::{AbiError, AbiFunctions, EncodingOptions, RequestedFunctions, RoutineCache};
pub use crate::yul::{Expr, Routine, Stmt};

// Routine execution
pub use crate::vm::{CallData, Halt, Machine, Word};

// Definitions files (requires "config" feature)
#[cfg(feature = "config")]
pub use crate::config::{ConfigError, Definitions, LoggingConfig};
