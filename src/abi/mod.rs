//! ABI encoding and decoding routine generator.
//!
//! [`AbiFunctions`] produces named [`Routine`]s that encode values held on
//! the stack, in memory, in call-data or in storage into the contract ABI
//! layout (head/tail, 32-byte padding or packed) and decode ABI data back
//! into memory objects or stack values. Every routine is memoised in a
//! [`RoutineCache`] that the caller owns and passes in, so one compilation
//! run shares each helper exactly once.
//!
//! ```ignore
//! use solty::prelude::*;
//!
//! let reg = TypeRegistry::new();
//! let mut cache = RoutineCache::new();
//! let types = [Type::uint(8), Type::boolean()];
//! let name = AbiFunctions::new(&reg, &mut cache).tuple_encoder(&types, &types, false)?;
//! let code = cache.requested_functions().render();
//! ```
//!
//! # Module Organization
//!
//! - [`options`]: encoding variant flags
//! - [`cache`]: routine keys and the memo table
//! - `util`: cleanup, conversion, shift, array and memory helpers
//! - `encode`: tuple and per-type encoders
//! - `decode`: tuple and per-type decoders

mod cache;
mod decode;
mod encode;
mod error;
mod options;
mod util;

pub use cache::{CacheStats, RequestedFunctions, RoutineCache, RoutineKey};
pub use error::AbiError;
pub use options::EncodingOptions;

use crate::logging::debug;
use crate::types::{TypeRef, TypeRegistry};
use crate::yul::Routine;

/// Upper bound (inclusive) for lengths and offsets read from untrusted data.
pub(crate) const MAX_OFFSET: u64 = 0xffff_ffff_ffff_ffff;

/// Routine generator over a registry, filling a caller-owned cache.
pub struct AbiFunctions<'a> {
    reg: &'a TypeRegistry,
    cache: &'a mut RoutineCache,
}

impl<'a> AbiFunctions<'a> {
    pub fn new(reg: &'a TypeRegistry, cache: &'a mut RoutineCache) -> Self {
        Self { reg, cache }
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.reg
    }

    /// Returns the name of the routine for `key`, building it with `build`
    /// on first request. The body enters the cache only once fully built.
    fn create(
        &mut self,
        key: RoutineKey,
        build: impl FnOnce(&mut Self, String) -> Result<Routine, AbiError>,
    ) -> Result<String, AbiError> {
        if let Some(name) = self.cache.lookup(&key) {
            return Ok(name);
        }
        let name = self.cache.reserve(&key);
        match build(self, name.clone()) {
            Ok(routine) => {
                self.cache.insert(key, routine);
                Ok(name)
            }
            Err(e) => {
                debug!(routine = %name, error = %e, "routine generation failed");
                self.cache.abandon(&key);
                Err(e)
            }
        }
    }

    fn create_externally_used(
        &mut self,
        key: RoutineKey,
        build: impl FnOnce(&mut Self, String) -> Result<Routine, AbiError>,
    ) -> Result<String, AbiError> {
        let name = self.create(key, build)?;
        self.cache.mark_externally_used(&name);
        Ok(name)
    }

    /// Size of the static head of a tuple of (encoding) types.
    pub fn head_size(&self, types: &[TypeRef]) -> Result<u64, AbiError> {
        let mut size = 0u64;
        for ty in types {
            size = size
                .checked_add(ty.calldata_head_size(self.reg)?)
                .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))?;
        }
        Ok(size)
    }

    /// Drains the generated routines; see [`RoutineCache::requested_functions`].
    pub fn requested_functions(&mut self) -> RequestedFunctions {
        self.cache.requested_functions()
    }
}

/// `prefix0, prefix1, …` for `count` stack words starting at `start`.
pub(crate) fn stack_names(prefix: &str, start: usize, count: usize) -> Vec<String> {
    (start..start + count).map(|i| format!("{}{}", prefix, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataLocation, Type};

    #[test]
    fn routines_are_shared_between_requests() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let types = [Type::uint(8), Type::boolean()];
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let first = abi.tuple_encoder(&types, &types, false).unwrap();
        let second = abi.tuple_encoder(&types, &types, false).unwrap();
        assert_eq!(first, second);
        assert!(cache.contains("cleanup_t_uint8"));
        assert!(cache.stats().hits >= 1);
        assert_eq!(cache.externally_used().collect::<Vec<_>>(), vec![first.as_str()]);
    }

    #[test]
    fn library_options_are_a_distinct_key() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let arr = Type::array(DataLocation::Storage, Type::uint256(), None)
            .with_location(DataLocation::Storage, true);
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let lib = abi.tuple_encoder(&[arr.clone()], &[arr.clone()], true).unwrap();
        let plain = abi.tuple_encoder(&[arr.clone()], &[arr], false).unwrap();
        assert_ne!(lib, plain);
        assert!(lib.ends_with("_library"));
    }

    #[test]
    fn memory_references_share_one_routine() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let built = Type::array(DataLocation::Memory, Type::uint256(), None);
        let parsed = crate::types::TypeParser::new(&reg)
            .parse("uint256[] memory")
            .unwrap();
        let moved = Type::array(DataLocation::Storage, Type::uint256(), None)
            .with_location(DataLocation::Memory, false);
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let first = abi.tuple_encoder(&[built.clone()], &[built], false).unwrap();
        let routines = cache.len();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        assert_eq!(abi.tuple_encoder(&[parsed.clone()], &[parsed], false).unwrap(), first);
        assert_eq!(abi.tuple_encoder(&[moved.clone()], &[moved], false).unwrap(), first);
        assert_eq!(cache.len(), routines);
        assert!(first.contains("t_array$_t_uint256_$dyn_memory_ptr"));
    }

    #[test]
    fn head_size_counts_dynamic_types_as_one_word() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let abi = AbiFunctions::new(&reg, &mut cache);
        let types = [
            Type::uint(8),
            Type::bytes_memory(),
            Type::array(DataLocation::Memory, Type::uint256(), Some(3u8.into())),
        ];
        assert_eq!(abi.head_size(&types).unwrap(), 32 + 32 + 96);
    }

    #[test]
    fn failed_generation_leaves_no_trace() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let map = Type::mapping(Type::uint256(), Type::uint256());
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        assert!(matches!(
            abi.tuple_encoder(&[map.clone()], &[map], false),
            Err(AbiError::NotEncodable(_))
        ));
        assert!(cache.is_empty());
    }
}
