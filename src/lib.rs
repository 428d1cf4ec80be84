//! Type model, storage layout and ABI routine generation for a
//! Solidity-style contract compiler.
//!
//! The crate covers the semantic core between name resolution and code
//! generation: what a type is, how values of it are laid out in storage,
//! and which routines encode and decode it for the contract ABI.
//!
//! # Quick Start
//!
//! ```ignore
//! use solty::prelude::*;
//!
//! let reg = TypeRegistry::new();
//! let types = TypeParser::new(&reg).parse_list("uint8,bool")?;
//!
//! let mut cache = RoutineCache::new();
//! let name = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&types, &types, false)?;
//!
//! // Run the generated routine: encode (7, true) at 0x80.
//! let mut machine = Machine::new(cache.routines().cloned());
//! machine.call(&name, &[Word::from(0x80u64), Word::from(7u64), Word::from(true)])?;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Type values, conversion and operator rules, the definition registry
//! - [`layout`] - Member lists, storage slot packing and layout reports
//! - [`yul`] - Routine syntax tree and its text rendering
//! - [`abi`] - Memoised ABI encoder and decoder generation
//! - [`vm`] - Word arithmetic and an interpreter for generated routines
//! - [`config`] - TOML definitions files (requires `config` feature)
//!
//! # Feature Flags
//!
//! - `config` - Enable definitions files (enabled by default)
//! - `json` - Enable JSON serialization of storage layout reports
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the command-line interface binary
//! - `full` - Enable all features

pub mod abi;
#[cfg(feature = "config")]
pub mod config;
pub mod layout;
mod logging;
pub mod prelude;
pub mod types;
pub mod vm;
pub mod yul;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

pub use abi::{AbiError, AbiFunctions, EncodingOptions, RoutineCache};
pub use layout::{MemberList, StorageLayout, StorageOffsets};
pub use types::{DataLocation, Type, TypeError, TypeParser, TypeRef, TypeRegistry};
pub use vm::{Halt, Machine, Word};
pub use yul::Routine;

#[cfg(feature = "config")]
pub use config::{ConfigError, Definitions};
