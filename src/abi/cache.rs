//! Memoisation of generated routines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use rustc_hash::{FxHashMap, FxHashSet};

use super::EncodingOptions;
use crate::logging::{info, trace};
use crate::yul::Routine;

/// Structured identity of a generated routine.
///
/// Two requests share a routine exactly when their keys are equal; the
/// routine name is derived from the key for readability only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutineKey {
    TupleEncoder {
        given: Vec<String>,
        target: Vec<String>,
        options: EncodingOptions,
    },
    TupleEncoderPacked {
        given: Vec<String>,
        target: Vec<String>,
    },
    TupleDecoder {
        types: Vec<String>,
        from_memory: bool,
    },
    Encode {
        from: String,
        to: String,
        options: EncodingOptions,
    },
    EncodeUpdatedPos {
        from: String,
        to: String,
        options: EncodingOptions,
    },
    Decode {
        ty: String,
        from_memory: bool,
        for_stack: bool,
    },
    Cleanup(String),
    Validator(String),
    Conversion {
        from: String,
        to: String,
    },
    LeftAlign(String),
    ShiftLeft(u16),
    ShiftRight(u16),
    RoundUp,
    CleanupFromStorage(String),
    ExtractFromStorage {
        ty: String,
        offset: u8,
    },
    ReadFromStorage(String),
    ArrayLength(String),
    ArrayAllocationSize(String),
    ArrayDataArea(String),
    ArrayNextElement(String),
    ArrayStoreLength {
        ty: String,
        options: EncodingOptions,
    },
    AllocateMemory,
    CopyToMemory {
        from_calldata: bool,
    },
    CombineExternalFunctionId,
    SplitExternalFunctionId,
    CleanupCombinedExternalFunctionId,
}

fn joined(ids: &[String], sep: &str) -> String {
    ids.iter().fold(String::new(), |mut out, id| {
        out.push_str(id);
        out.push_str(sep);
        out
    })
}

impl RoutineKey {
    /// Readable routine name.
    pub fn name(&self) -> String {
        use RoutineKey::*;
        match self {
            TupleEncoder {
                given,
                target,
                options,
            } => format!(
                "abi_encode_tuple_{}_to_{}{}",
                joined(given, "_"),
                joined(target, "_"),
                options.suffix()
            ),
            TupleEncoderPacked { given, target } => format!(
                "abi_encode_tuple_packed_{}_to_{}{}",
                joined(given, "_"),
                joined(target, "_"),
                EncodingOptions::packed().suffix()
            ),
            TupleDecoder { types, from_memory } => format!(
                "abi_decode_tuple_{}{}",
                joined(types, ""),
                if *from_memory { "_fromMemory" } else { "" }
            ),
            Encode { from, to, options } => {
                format!("abi_encode_{}_to_{}{}", from, to, options.suffix())
            }
            EncodeUpdatedPos { from, to, options } => {
                format!("abi_encodeUpdatedPos_{}_to_{}{}", from, to, options.suffix())
            }
            Decode {
                ty,
                from_memory,
                for_stack,
            } => format!(
                "abi_decode_{}{}{}",
                ty,
                if *from_memory { "_fromMemory" } else { "" },
                if *for_stack { "_onStack" } else { "" }
            ),
            Cleanup(ty) => format!("cleanup_{}", ty),
            Validator(ty) => format!("validator_revert_{}", ty),
            Conversion { from, to } => format!("convert_{}_to_{}", from, to),
            LeftAlign(ty) => format!("leftAlign_{}", ty),
            ShiftLeft(bits) => format!("shift_left_{}", bits),
            ShiftRight(bits) => format!("shift_right_{}_unsigned", bits),
            RoundUp => "round_up_to_mul_of_32".into(),
            CleanupFromStorage(ty) => format!("cleanup_from_storage_{}", ty),
            ExtractFromStorage { ty, offset } => {
                format!("extract_from_storage_value_offset_{}_{}", offset, ty)
            }
            ReadFromStorage(ty) => format!("read_from_storage_offset_0_{}", ty),
            ArrayLength(ty) => format!("array_length_{}", ty),
            ArrayAllocationSize(ty) => format!("array_allocation_size_{}", ty),
            ArrayDataArea(ty) => format!("array_dataslot_{}", ty),
            ArrayNextElement(ty) => format!("array_nextElement_{}", ty),
            ArrayStoreLength { ty, options } => {
                format!("array_storeLengthForEncoding_{}{}", ty, options.suffix())
            }
            AllocateMemory => "allocateMemory".into(),
            CopyToMemory { from_calldata: true } => "copy_calldata_to_memory".into(),
            CopyToMemory { from_calldata: false } => "copy_memory_to_memory".into(),
            CombineExternalFunctionId => "combine_external_function_id".into(),
            SplitExternalFunctionId => "split_external_function_id".into(),
            CleanupCombinedExternalFunctionId => "cleanup_combined_external_function_id".into(),
        }
    }
}

/// Hit and miss counts of a [`RoutineCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Routines handed over by [`RoutineCache::requested_functions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedFunctions {
    /// In name order.
    pub routines: Vec<Routine>,
    /// Names the code generator calls directly.
    pub externally_used: BTreeSet<String>,
}

impl RequestedFunctions {
    /// All routines as program text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for routine in &self.routines {
            let _ = writeln!(out, "{}", routine);
        }
        out
    }
}

/// Generated routines of one compilation run.
#[derive(Debug, Default)]
pub struct RoutineCache {
    names: FxHashMap<RoutineKey, String>,
    /// Keys whose routine is being built, with their reserved name.
    pending: FxHashMap<RoutineKey, String>,
    taken: FxHashSet<String>,
    routines: BTreeMap<String, Routine>,
    externally_used: BTreeSet<String>,
    stats: CacheStats,
}

impl RoutineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the routine for `key`, if it exists or is being built.
    pub fn lookup(&mut self, key: &RoutineKey) -> Option<String> {
        let found = self.names.get(key).or_else(|| self.pending.get(key)).cloned();
        if found.is_some() {
            self.stats.hits += 1;
        }
        found
    }

    /// Reserves a unique name for `key` while its routine is built.
    pub(crate) fn reserve(&mut self, key: &RoutineKey) -> String {
        self.stats.misses += 1;
        let base = key.name();
        let mut name = base.clone();
        let mut counter = 1;
        while self.taken.contains(&name) {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }
        self.taken.insert(name.clone());
        self.pending.insert(key.clone(), name.clone());
        name
    }

    /// Drops a reservation after a failed build.
    pub(crate) fn abandon(&mut self, key: &RoutineKey) {
        if let Some(name) = self.pending.remove(key) {
            self.taken.remove(&name);
        }
    }

    /// Stores the finished routine for a reserved key.
    pub(crate) fn insert(&mut self, key: RoutineKey, routine: Routine) {
        self.pending.remove(&key);
        trace!(name = %routine.name, "generated routine");
        self.names.insert(key, routine.name.clone());
        self.routines.insert(routine.name.clone(), routine);
    }

    pub fn mark_externally_used(&mut self, name: &str) {
        self.externally_used.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.get(name)
    }

    /// Routines in name order.
    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.routines.values()
    }

    pub fn externally_used(&self) -> impl Iterator<Item = &str> {
        self.externally_used.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Hands over every routine generated so far and starts afresh.
    pub fn requested_functions(&mut self) -> RequestedFunctions {
        self.names.clear();
        self.pending.clear();
        self.taken.clear();
        info!(
            routines = self.routines.len(),
            hits = self.stats.hits,
            misses = self.stats.misses,
            "collected requested functions"
        );
        RequestedFunctions {
            routines: std::mem::take(&mut self.routines).into_values().collect(),
            externally_used: std::mem::take(&mut self.externally_used),
        }
    }
}
