//! Small helper routines shared by encoders and decoders.

use num_bigint::BigUint;
use num_traits::One;

use super::{AbiError, AbiFunctions, MAX_OFFSET, RoutineKey};
use crate::types::{DataLocation, FunctionKind, Type, TypeRef};
use crate::vm::FREE_MEMORY_POINTER;
use crate::yul::{
    Expr, Routine, Stmt, assign, big, call, expr, id, if_, let_, low_mask, num, revert_if,
};

/// `mask` of `bytes` high-order bytes, e.g. the significant part of `bytesN`.
fn high_mask(bytes: u32) -> Expr {
    let ones = (BigUint::one() << (8 * bytes)) - 1u8;
    big(ones << (256 - 8 * bytes))
}

impl AbiFunctions<'_> {
    /// `cleanup_<id>(value) -> cleaned`: canonical representation of a stack value.
    pub fn cleanup_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::Cleanup(ty.identifier());
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let cleaned = match ty.as_ref() {
                Type::Address { .. } | Type::Contract(_) => {
                    call(abi.cleanup_function(&Type::uint(160))?, vec![id("value")])
                }
                Type::Integer(i) if i.bits == 256 => id("value"),
                Type::Integer(i) if i.signed => {
                    call("signextend", vec![num(u64::from(i.bits / 8 - 1)), id("value")])
                }
                Type::Integer(i) => call("and", vec![id("value"), low_mask(u32::from(i.bits))]),
                Type::IntegerConstant(_) => id("value"),
                Type::Bool => call("iszero", vec![call("iszero", vec![id("value")])]),
                Type::FixedBytes(32) => id("value"),
                Type::FixedBytes(n) => call("and", vec![id("value"), high_mask(u32::from(*n))]),
                Type::Enum(e) => {
                    let count = abi.reg.enum_def(e.id)?.values.len() as u64;
                    let body = vec![
                        if_(
                            call("iszero", vec![call("lt", vec![id("value"), num(count)])]),
                            vec![expr(call("invalid", vec![]))],
                        ),
                        assign("cleaned", id("value")),
                    ];
                    return Ok(Routine::new(name, &["value"], &["cleaned"], body));
                }
                Type::Function(f) if f.kind == FunctionKind::External => {
                    call(abi.cleanup_function(&Type::fixed_bytes(24))?, vec![id("value")])
                }
                Type::Function(f) if f.kind == FunctionKind::Internal => {
                    call("and", vec![id("value"), low_mask(64)])
                }
                Type::Array(_) | Type::Struct(_) | Type::Mapping { .. } => id("value"),
                _ => return Err(AbiError::NotEncodable(ty.to_string())),
            };
            Ok(Routine::new(name, &["value"], &["cleaned"], vec![assign("cleaned", cleaned)]))
        })
    }

    /// `validator_revert_<id>(value)`: reverts unless `value` is canonical.
    pub fn validator_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::Validator(ty.identifier());
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let check = match ty.as_ref() {
                Type::Enum(e) => {
                    let count = abi.reg.enum_def(e.id)?.values.len() as u64;
                    revert_if(call("iszero", vec![call("lt", vec![id("value"), num(count)])]))
                }
                _ => {
                    let cleanup = abi.cleanup_function(&ty)?;
                    revert_if(call(
                        "iszero",
                        vec![call("eq", vec![id("value"), call(cleanup, vec![id("value")])])],
                    ))
                }
            };
            Ok(Routine::new(name, &["value"], &[], vec![check]))
        })
    }

    /// `convert_<from>_to_<to>(value) -> converted` between value types.
    pub fn conversion_function(&mut self, from: &TypeRef, to: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::Conversion {
            from: from.identifier(),
            to: to.identifier(),
        };
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let value = id("value");
            let converted = if from == to {
                call(abi.cleanup_function(&from)?, vec![value])
            } else {
                abi.conversion_body(&from, &to, value)?
            };
            Ok(Routine::new(name, &["value"], &["converted"], vec![assign("converted", converted)])
                .with_comment(format!("{} to {}", from, to)))
        })
    }

    fn conversion_body(&mut self, from: &TypeRef, to: &TypeRef, value: Expr) -> Result<Expr, AbiError> {
        let unsupported = || AbiError::unimplemented(from, to);
        Ok(match (from.as_ref(), to.as_ref()) {
            (
                Type::Integer(_) | Type::IntegerConstant(_) | Type::Address { .. } | Type::Contract(_),
                Type::FixedBytes(n),
            ) => {
                let cleaned = call(self.cleanup_function(from)?, vec![value]);
                call(self.shift_left_function(256 - 8 * u16::from(*n))?, vec![cleaned])
            }
            (Type::Integer(_) | Type::IntegerConstant(_) | Type::Address { .. } | Type::Contract(_), Type::Enum(_)) => {
                let cleaned = call(self.cleanup_function(from)?, vec![value]);
                call(self.cleanup_function(to)?, vec![cleaned])
            }
            (_, Type::Address { .. } | Type::Contract(_))
                if matches!(
                    from.as_ref(),
                    Type::Integer(_)
                        | Type::IntegerConstant(_)
                        | Type::Address { .. }
                        | Type::Contract(_)
                        | Type::FixedBytes(_)
                ) =>
            {
                call(self.conversion_function(from, &Type::uint(160))?, vec![value])
            }
            (Type::Address { .. } | Type::Contract(_), Type::Integer(_)) => {
                call(self.conversion_function(&Type::uint(160), to)?, vec![value])
            }
            (Type::IntegerConstant(_), Type::Integer(_)) => call(self.cleanup_function(to)?, vec![value]),
            (Type::Integer(f), Type::Integer(t)) => {
                let widened = call(self.cleanup_function(from)?, vec![value]);
                if f.signed == t.signed && f.bits <= t.bits {
                    widened
                } else {
                    call(self.cleanup_function(to)?, vec![widened])
                }
            }
            (Type::Bool, Type::Bool) => call(self.cleanup_function(from)?, vec![value]),
            (Type::FixedBytes(n), Type::Integer(_)) => {
                let bits = 8 * u16::from(*n);
                let shifted = call(self.shift_right_function(256 - bits)?, vec![value]);
                call(self.conversion_function(&Type::uint(bits), to)?, vec![shifted])
            }
            (Type::FixedBytes(f), Type::FixedBytes(t)) => {
                let narrower = if f <= t { from } else { to };
                call(self.cleanup_function(narrower)?, vec![value])
            }
            (Type::Enum(_), Type::Integer(_) | Type::Enum(_)) => {
                let cleaned = call(self.cleanup_function(from)?, vec![value]);
                call(self.cleanup_function(to)?, vec![cleaned])
            }
            (Type::Function(f), Type::Function(t)) if f.kind == t.kind => {
                call(self.cleanup_function(from)?, vec![value])
            }
            _ => return Err(unsupported()),
        })
    }

    /// `leftAlign_<id>(value) -> aligned`: moves a value to the high-order bytes.
    pub fn left_align_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::LeftAlign(ty.identifier());
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let aligned = match ty.as_ref() {
                Type::Address { .. } => call(abi.left_align_function(&Type::uint(160))?, vec![id("value")]),
                Type::Contract(_) => call(abi.left_align_function(&Type::address())?, vec![id("value")]),
                Type::Integer(i) if i.bits == 256 => id("value"),
                Type::Integer(i) => call(abi.shift_left_function(256 - i.bits)?, vec![id("value")]),
                Type::Bool => call(abi.left_align_function(&Type::uint(8))?, vec![id("value")]),
                Type::Enum(_) => {
                    let bits = 8 * abi.storage_bytes_of(&ty)?;
                    call(abi.left_align_function(&Type::uint(bits))?, vec![id("value")])
                }
                Type::FixedBytes(_) => id("value"),
                Type::Function(f) if f.kind == FunctionKind::External => id("value"),
                Type::Function(_) => call(abi.shift_left_function(192)?, vec![id("value")]),
                _ => return Err(AbiError::NotEncodable(ty.to_string())),
            };
            Ok(Routine::new(name, &["value"], &["aligned"], vec![assign("aligned", aligned)]))
        })
    }

    fn storage_bytes_of(&self, ty: &TypeRef) -> Result<u16, AbiError> {
        Ok(ty.storage_bytes(self.reg)? as u16)
    }

    pub fn shift_left_function(&mut self, bits: u16) -> Result<String, AbiError> {
        self.create(RoutineKey::ShiftLeft(bits), move |_, name| {
            Ok(Routine::new(
                name,
                &["value"],
                &["newValue"],
                vec![assign("newValue", call("shl", vec![num(u64::from(bits)), id("value")]))],
            ))
        })
    }

    pub fn shift_right_function(&mut self, bits: u16) -> Result<String, AbiError> {
        self.create(RoutineKey::ShiftRight(bits), move |_, name| {
            Ok(Routine::new(
                name,
                &["value"],
                &["newValue"],
                vec![assign("newValue", call("shr", vec![num(u64::from(bits)), id("value")]))],
            ))
        })
    }

    pub fn round_up_function(&mut self) -> Result<String, AbiError> {
        self.create(RoutineKey::RoundUp, |_, name| {
            Ok(Routine::new(
                name,
                &["value"],
                &["result"],
                vec![assign(
                    "result",
                    call("and", vec![call("add", vec![id("value"), num(31)]), call("not", vec![num(31)])]),
                )],
            ))
        })
    }

    /// Cleanup of a value type read from the low-order bytes of a storage slot.
    pub fn cleanup_from_storage_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::CleanupFromStorage(ty.identifier());
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let bytes = ty.storage_bytes(abi.reg)? as u32;
            let cleaned = match ty.as_ref() {
                _ if bytes >= 32 => id("value"),
                Type::FixedBytes(_) => {
                    call(abi.shift_left_function(256 - 8 * bytes as u16)?, vec![id("value")])
                }
                Type::Function(f) if f.kind == FunctionKind::External => {
                    call(abi.shift_left_function(256 - 8 * bytes as u16)?, vec![id("value")])
                }
                Type::Integer(i) if i.signed => {
                    call("signextend", vec![num(u64::from(bytes - 1)), id("value")])
                }
                _ if ty.is_value_type() => call("and", vec![id("value"), low_mask(8 * bytes)]),
                _ => return Err(AbiError::NotEncodable(ty.to_string())),
            };
            Ok(Routine::new(name, &["value"], &["cleaned"], vec![assign("cleaned", cleaned)]))
        })
    }

    /// Value of type `ty` stored `offset` bytes into a slot value.
    pub fn extract_from_storage_function(&mut self, ty: &TypeRef, offset: u8) -> Result<String, AbiError> {
        let key = RoutineKey::ExtractFromStorage {
            ty: ty.identifier(),
            offset,
        };
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let cleanup = abi.cleanup_from_storage_function(&ty)?;
            let shifted = if offset == 0 {
                id("slot_value")
            } else {
                call(abi.shift_right_function(8 * u16::from(offset))?, vec![id("slot_value")])
            };
            Ok(Routine::new(
                name,
                &["slot_value"],
                &["value"],
                vec![assign("value", call(cleanup, vec![shifted]))],
            ))
        })
    }

    /// Value type stored at the start of `slot`.
    pub fn read_from_storage_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let key = RoutineKey::ReadFromStorage(ty.identifier());
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let extract = abi.extract_from_storage_function(&ty, 0)?;
            Ok(Routine::new(
                name,
                &["slot"],
                &["value"],
                vec![assign("value", call(extract, vec![call("sload", vec![id("slot")])]))],
            ))
        })
    }

    /// `array_length_<id>(value) -> length`.
    pub fn array_length_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let arr = ty
            .as_array()
            .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))?
            .clone();
        let key = RoutineKey::ArrayLength(ty.identifier());
        self.create(key, move |_, name| {
            let body = match (&arr.length, arr.location) {
                (Some(length), _) => vec![assign("length", big(length.clone()))],
                (None, DataLocation::Memory) => vec![assign("length", call("mload", vec![id("value")]))],
                (None, DataLocation::Storage) if arr.is_byte_array() => vec![
                    assign("length", call("sload", vec![id("value")])),
                    // Short arrays keep 2 * length in the low byte, long ones 2 * length + 1.
                    let_(
                        "mask",
                        call(
                            "sub",
                            vec![
                                call(
                                    "mul",
                                    vec![
                                        num(0x100),
                                        call("iszero", vec![call("and", vec![id("length"), num(1)])]),
                                    ],
                                ),
                                num(1),
                            ],
                        ),
                    ),
                    assign(
                        "length",
                        call("div", vec![call("and", vec![id("length"), id("mask")]), num(2)]),
                    ),
                ],
                (None, DataLocation::Storage) => vec![assign("length", call("sload", vec![id("value")]))],
                (None, DataLocation::CallData) => {
                    return Err(AbiError::unimplemented(&arr.location.keyword(), "array length"));
                }
            };
            Ok(Routine::new(name, &["value"], &["length"], body))
        })
    }

    /// Bytes to allocate in memory for an array of `length` elements; reverts on absurd lengths.
    pub fn array_allocation_size_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let arr = ty
            .as_array()
            .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))?
            .clone();
        let key = RoutineKey::ArrayAllocationSize(ty.identifier());
        self.create(key, move |_, name| {
            let mut body = vec![revert_if(call("gt", vec![id("length"), num(MAX_OFFSET)]))];
            if arr.is_byte_array() {
                body.push(assign(
                    "size",
                    call("and", vec![call("add", vec![id("length"), num(0x1f)]), call("not", vec![num(0x1f)])]),
                ));
            } else {
                body.push(assign("size", call("mul", vec![id("length"), num(0x20)])));
            }
            if arr.is_dynamically_sized() {
                body.push(assign("size", call("add", vec![id("size"), num(0x20)])));
            }
            Ok(Routine::new(name, &["length"], &["size"], body))
        })
    }

    /// First data word (memory) or slot (storage) of an array.
    pub fn array_data_area_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let arr = ty
            .as_array()
            .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))?
            .clone();
        let key = RoutineKey::ArrayDataArea(ty.identifier());
        self.create(key, move |_, name| {
            let body = match (arr.location, arr.is_dynamically_sized()) {
                (DataLocation::Memory, true) => {
                    vec![assign("data", call("add", vec![id("ptr"), num(0x20)]))]
                }
                (DataLocation::Storage, true) => vec![
                    expr(call("mstore", vec![num(0), id("ptr")])),
                    assign("data", call("keccak256", vec![num(0), num(0x20)])),
                ],
                _ => vec![assign("data", id("ptr"))],
            };
            Ok(Routine::new(name, &["ptr"], &["data"], body))
        })
    }

    /// Position of the element after the one at `ptr`.
    pub fn array_next_element_function(&mut self, ty: &TypeRef) -> Result<String, AbiError> {
        let arr = ty
            .as_array()
            .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))?
            .clone();
        let key = RoutineKey::ArrayNextElement(ty.identifier());
        self.create(key, move |abi, name| {
            let step = match arr.location {
                DataLocation::Memory => num(0x20),
                DataLocation::Storage => big(arr.base.storage_size(abi.reg)?),
                DataLocation::CallData => num(arr.base.calldata_head_size(abi.reg)?),
            };
            Ok(Routine::new(
                name,
                &["ptr"],
                &["next"],
                vec![assign("next", call("add", vec![id("ptr"), step]))],
            ))
        })
    }

    /// Writes the length word of a dynamic array unless encoding in place.
    pub fn array_store_length_function(
        &mut self,
        ty: &TypeRef,
        options: super::EncodingOptions,
    ) -> Result<String, AbiError> {
        let dynamic = ty.is_dynamically_sized();
        let key = RoutineKey::ArrayStoreLength {
            ty: ty.identifier(),
            options,
        };
        self.create(key, move |_, name| {
            let body = if dynamic && !options.dynamic_inplace {
                vec![
                    expr(call("mstore", vec![id("pos"), id("length")])),
                    assign("updated_pos", call("add", vec![id("pos"), num(0x20)])),
                ]
            } else {
                vec![assign("updated_pos", id("pos"))]
            };
            Ok(Routine::new(name, &["pos", "length"], &["updated_pos"], body))
        })
    }

    /// Bumps the free memory pointer by `size`; reverts past 2^64 or on wrap-around.
    pub fn allocation_function(&mut self) -> Result<String, AbiError> {
        self.create(RoutineKey::AllocateMemory, |_, name| {
            let fmp = || num(FREE_MEMORY_POINTER);
            Ok(Routine::new(
                name,
                &["size"],
                &["memPtr"],
                vec![
                    assign("memPtr", call("mload", vec![fmp()])),
                    let_("newFreePtr", call("add", vec![id("memPtr"), id("size")])),
                    revert_if(call(
                        "or",
                        vec![
                            call("gt", vec![id("newFreePtr"), num(MAX_OFFSET)]),
                            call("lt", vec![id("newFreePtr"), id("memPtr")]),
                        ],
                    )),
                    expr(call("mstore", vec![fmp(), id("newFreePtr")])),
                ],
            ))
        })
    }

    /// Copies `length` bytes to memory at `dst` and zeroes the word after them.
    pub fn copy_to_memory_function(&mut self, from_calldata: bool) -> Result<String, AbiError> {
        self.create(RoutineKey::CopyToMemory { from_calldata }, move |_, name| {
            let end = call("add", vec![id("dst"), id("length")]);
            let body = if from_calldata {
                vec![
                    expr(call("calldatacopy", vec![id("dst"), id("src"), id("length")])),
                    expr(call("mstore", vec![end, num(0)])),
                ]
            } else {
                vec![
                    let_("i", num(0)),
                    Stmt::For {
                        init: Vec::new(),
                        cond: call("lt", vec![id("i"), id("length")]),
                        post: vec![assign("i", call("add", vec![id("i"), num(32)]))],
                        body: vec![expr(call(
                            "mstore",
                            vec![
                                call("add", vec![id("dst"), id("i")]),
                                call("mload", vec![call("add", vec![id("src"), id("i")])]),
                            ],
                        ))],
                    },
                    if_(
                        call("gt", vec![id("i"), id("length")]),
                        vec![expr(call("mstore", vec![end, num(0)]))],
                    ),
                ]
            };
            Ok(Routine::new(name, &["src", "dst", "length"], &[], body))
        })
    }

    /// `address ‖ selector` as a left-aligned 24-byte word.
    pub fn combine_external_function_id_function(&mut self) -> Result<String, AbiError> {
        self.create(RoutineKey::CombineExternalFunctionId, |abi, name| {
            let shl32 = abi.shift_left_function(32)?;
            let shl64 = abi.shift_left_function(64)?;
            let combined = call(
                shl64,
                vec![call(
                    "or",
                    vec![
                        call(shl32, vec![id("addr")]),
                        call("and", vec![id("selector"), low_mask(32)]),
                    ],
                )],
            );
            Ok(Routine::new(
                name,
                &["addr", "selector"],
                &["combined"],
                vec![assign("combined", combined)],
            ))
        })
    }

    pub fn split_external_function_id_function(&mut self) -> Result<String, AbiError> {
        self.create(RoutineKey::SplitExternalFunctionId, |abi, name| {
            let shr64 = abi.shift_right_function(64)?;
            let shr32 = abi.shift_right_function(32)?;
            Ok(Routine::new(
                name,
                &["combined"],
                &["addr", "selector"],
                vec![
                    assign("combined", call(shr64, vec![id("combined")])),
                    assign("selector", call("and", vec![id("combined"), low_mask(32)])),
                    assign("addr", call(shr32, vec![id("combined")])),
                ],
            ))
        })
    }

    pub fn cleanup_combined_external_function_id_function(&mut self) -> Result<String, AbiError> {
        self.create(RoutineKey::CleanupCombinedExternalFunctionId, |abi, name| {
            let cleanup = abi.cleanup_function(&Type::fixed_bytes(24))?;
            Ok(Routine::new(
                name,
                &["addr_and_function_id"],
                &["cleaned"],
                vec![assign("cleaned", call(cleanup, vec![id("addr_and_function_id")]))],
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::RoutineCache;
    use crate::types::TypeRegistry;
    use crate::vm::{Halt, Machine, Word};

    fn run(cache: &mut RoutineCache, name: &str, args: &[Word]) -> Result<Vec<Word>, Halt> {
        Machine::new(cache.routines().cloned()).call(name, args)
    }

    #[test]
    fn cleanup_masks_and_extends() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let u8_clean = abi.cleanup_function(&Type::uint(8)).unwrap();
        let i8_clean = abi.cleanup_function(&Type::int(8)).unwrap();
        let b4_clean = abi.cleanup_function(&Type::fixed_bytes(4)).unwrap();
        let bool_clean = abi.cleanup_function(&Type::boolean()).unwrap();
        let all_ones = Word::zero().not();
        assert_eq!(run(&mut cache, &u8_clean, &[Word::from(0x1ffu64)]).unwrap(), vec![Word::from(0xffu64)]);
        assert_eq!(run(&mut cache, &i8_clean, &[Word::from(0xffu64)]).unwrap(), vec![all_ones.clone()]);
        let b4 = run(&mut cache, &b4_clean, &[all_ones]).unwrap();
        assert_eq!(b4.first().map(|w| w.to_be_bytes()[4]), Some(0));
        assert_eq!(run(&mut cache, &bool_clean, &[Word::from(7u64)]).unwrap(), vec![Word::one()]);
    }

    #[test]
    fn conversions_between_bytes_and_integers() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let to_bytes = abi.conversion_function(&Type::uint(16), &Type::fixed_bytes(2)).unwrap();
        let to_int = abi.conversion_function(&Type::fixed_bytes(2), &Type::uint(16)).unwrap();
        let left = run(&mut cache, &to_bytes, &[Word::from(0xabcdu64)]).unwrap();
        let expected = Word::from(0xabcdu64).shl(&Word::from(240u64));
        assert_eq!(left, vec![expected.clone()]);
        assert_eq!(run(&mut cache, &to_int, &[expected]).unwrap(), vec![Word::from(0xabcdu64)]);
        assert!(matches!(
            AbiFunctions::new(&reg, &mut cache)
                .conversion_function(&Type::boolean(), &Type::uint(8)),
            Err(AbiError::Unimplemented { .. })
        ));
    }

    #[test]
    fn allocation_checks_bounds() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let alloc = AbiFunctions::new(&reg, &mut cache).allocation_function().unwrap();
        let mut vm = Machine::new(cache.routines().cloned());
        assert_eq!(vm.call(&alloc, &[Word::from(0x40u64)]).unwrap(), vec![Word::from(0x80u64)]);
        assert_eq!(vm.free_memory_pointer().unwrap(), Word::from(0xc0u64));
        assert_eq!(vm.call(&alloc, &[Word::zero().not()]), Err(Halt::Revert));
    }

    #[test]
    fn external_function_ids_split_back() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let combine = abi.combine_external_function_id_function().unwrap();
        let split = abi.split_external_function_id_function().unwrap();
        let mut vm = Machine::new(cache.routines().cloned());
        let addr = Word::from(0x1234u64);
        let selector = Word::from(0xdeadbeefu64);
        let combined = vm.call(&combine, &[addr.clone(), selector.clone()]).unwrap();
        assert_eq!(vm.call(&split, &combined).unwrap(), vec![addr, selector]);
    }
}
