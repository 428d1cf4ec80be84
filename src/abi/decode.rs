//! Decoders: tuples and one routine family per decoded category.

use super::encode::{array_of, static_length};
use super::{AbiError, AbiFunctions, MAX_OFFSET, RoutineKey, stack_names};
use crate::types::{DataLocation, FunctionKind, Type, TypeRef};
use crate::yul::{Expr, Routine, Stmt, assign, big, call, counted_loop, expr, id, let_, num, revert_if};

fn loader(from_memory: bool) -> &'static str {
    if from_memory { "mload" } else { "calldataload" }
}

/// `if iszero(slt(add(offset, 0x1f), end)) { revert(0, 0) }`
fn offset_in_bounds(offset: Expr) -> Stmt {
    revert_if(call(
        "iszero",
        vec![call("slt", vec![call("add", vec![offset, num(0x1f)]), id("end")])],
    ))
}

impl AbiFunctions<'_> {
    /// `(headStart, dataEnd) -> value0, …`: decodes an ABI encoded tuple.
    ///
    /// Reverts if the data is shorter than the static head or a head
    /// offset is not below 2^64.
    pub fn tuple_decoder(&mut self, types: &[TypeRef], from_memory: bool) -> Result<String, AbiError> {
        let key = RoutineKey::TupleDecoder {
            types: types.iter().map(|t| t.identifier()).collect(),
            from_memory,
        };
        let types = types.to_vec();
        self.create_externally_used(key, move |abi, name| {
            let load = loader(from_memory);
            let decoding: Vec<TypeRef> = types
                .iter()
                .map(|t| t.decoding_type(abi.reg))
                .collect::<Result<_, _>>()?;
            let min_size = abi.head_size(&decoding)?;
            let mut returns = Vec::new();
            let mut body = vec![revert_if(call(
                "slt",
                vec![call("sub", vec![id("dataEnd"), id("headStart")]), num(min_size)],
            ))];
            let mut head_pos = 0u64;
            for (ty, decoded) in types.iter().zip(&decoding) {
                let decoder = abi.abi_decoding_function(ty, from_memory, true)?;
                let values = stack_names("value", returns.len(), decoded.size_on_stack());
                returns.extend(values.iter().cloned());
                let mut block = Vec::new();
                if decoded.is_dynamically_encoded(abi.reg)? {
                    block.push(let_(
                        "offset",
                        call(load, vec![call("add", vec![id("headStart"), num(head_pos)])]),
                    ));
                    block.push(revert_if(call("gt", vec![id("offset"), num(MAX_OFFSET)])));
                } else {
                    block.push(let_("offset", num(head_pos)));
                }
                block.push(Stmt::Assign(
                    values,
                    call(decoder, vec![call("add", vec![id("headStart"), id("offset")]), id("dataEnd")]),
                ));
                body.push(Stmt::Block(block));
                head_pos += decoded.calldata_head_size(abi.reg)?;
            }
            Ok(Routine::new(name, &["headStart", "dataEnd"], &[], body).with_returns(returns))
        })
    }

    /// Decoder of one value of type `ty` at `offset`, bounded by `end`.
    ///
    /// `for_stack` only matters for external functions: the address and
    /// selector are returned as two words instead of the combined word.
    pub fn abi_decoding_function(
        &mut self,
        ty: &TypeRef,
        from_memory: bool,
        for_stack: bool,
    ) -> Result<String, AbiError> {
        let decoding = ty.decoding_type(self.reg)?;
        match decoding.as_ref() {
            Type::Array(arr) if arr.location == DataLocation::CallData => {
                self.calldata_array_decoder(&decoding, from_memory)
            }
            Type::Array(arr) if arr.is_byte_array() => self.byte_array_decoder(&decoding, from_memory),
            Type::Array(_) => self.array_decoder(&decoding, from_memory),
            Type::Struct(s) if s.location == DataLocation::CallData => {
                self.calldata_struct_decoder(&decoding, from_memory)
            }
            Type::Struct(_) => self.struct_decoder(&decoding, from_memory),
            Type::Function(f) if f.kind == FunctionKind::External => {
                self.function_type_decoder(&decoding, from_memory, for_stack)
            }
            // Validation uses the declared type so enums are range checked.
            _ if ty.is_value_type() => self.value_type_decoder(ty, from_memory),
            // Storage references passed to libraries arrive as their slot.
            _ => self.value_type_decoder(&decoding, from_memory),
        }
    }

    fn decode_key(ty: &TypeRef, from_memory: bool) -> RoutineKey {
        RoutineKey::Decode {
            ty: ty.identifier(),
            from_memory,
            for_stack: false,
        }
    }

    fn value_type_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        if !ty.is_value_type() {
            return Err(AbiError::NotEncodable(ty.to_string()));
        }
        let key = Self::decode_key(ty, from_memory);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let validator = abi.validator_function(&ty)?;
            Ok(Routine::new(
                name,
                &["offset", "end"],
                &["value"],
                vec![
                    assign("value", call(loader(from_memory), vec![id("offset")])),
                    expr(call(validator, vec![id("value")])),
                ],
            ))
        })
    }

    fn array_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        let arr = array_of(ty)?;
        let key = Self::decode_key(ty, from_memory);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let load = loader(from_memory);
            let allocation_size = abi.array_allocation_size_function(&ty)?;
            let allocate = abi.allocation_function()?;
            let element_decoder = abi.abi_decoding_function(&arr.base, from_memory, false)?;
            let dynamic_base = arr.base.is_dynamically_encoded(abi.reg)?;
            let stride = if dynamic_base {
                0x20
            } else {
                arr.base.calldata_encoded_size(abi.reg, true)?
            };

            let mut body = vec![offset_in_bounds(id("offset"))];
            let length = match &arr.length {
                Some(length) => big(length.clone()),
                None => call(load, vec![id("offset")]),
            };
            body.push(let_("length", length));
            body.push(assign("array", call(allocate, vec![call(allocation_size, vec![id("length")])])));
            body.push(let_("dst", id("array")));
            if arr.is_dynamically_sized() {
                body.push(expr(call("mstore", vec![id("array"), id("length")])));
                body.push(assign("offset", call("add", vec![id("offset"), num(0x20)])));
                body.push(assign("dst", call("add", vec![id("dst"), num(0x20)])));
            }
            body.push(let_("src", id("offset")));
            body.push(revert_if(call(
                "gt",
                vec![
                    call("add", vec![id("src"), call("mul", vec![id("length"), num(stride)])]),
                    id("end"),
                ],
            )));
            let mut loop_body = Vec::new();
            if dynamic_base {
                loop_body.push(let_("innerOffset", call(load, vec![id("src")])));
                loop_body.push(revert_if(call("gt", vec![id("innerOffset"), num(MAX_OFFSET)])));
                loop_body.push(let_("elementPos", call("add", vec![id("offset"), id("innerOffset")])));
            } else {
                loop_body.push(let_("elementPos", id("src")));
            }
            loop_body.push(expr(call(
                "mstore",
                vec![id("dst"), call(element_decoder, vec![id("elementPos"), id("end")])],
            )));
            loop_body.push(assign("dst", call("add", vec![id("dst"), num(0x20)])));
            loop_body.push(assign("src", call("add", vec![id("src"), num(stride)])));
            body.push(counted_loop("i", id("length"), num(1), loop_body));
            Ok(Routine::new(name, &["offset", "end"], &["array"], body)
                .with_comment(ty.to_string()))
        })
    }

    fn byte_array_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        let key = Self::decode_key(ty, from_memory);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let load = loader(from_memory);
            let allocation_size = abi.array_allocation_size_function(&ty)?;
            let allocate = abi.allocation_function()?;
            let copy = abi.copy_to_memory_function(!from_memory)?;
            let body = vec![
                offset_in_bounds(id("offset")),
                let_("length", call(load, vec![id("offset")])),
                assign("array", call(allocate, vec![call(allocation_size, vec![id("length")])])),
                expr(call("mstore", vec![id("array"), id("length")])),
                let_("src", call("add", vec![id("offset"), num(0x20)])),
                let_("dst", call("add", vec![id("array"), num(0x20)])),
                revert_if(call("gt", vec![call("add", vec![id("src"), id("length")]), id("end")])),
                expr(call(copy, vec![id("src"), id("dst"), id("length")])),
            ];
            Ok(Routine::new(name, &["offset", "end"], &["array"], body))
        })
    }

    fn calldata_array_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        let arr = array_of(ty)?;
        if from_memory || arr.base.is_dynamically_encoded(self.reg)? {
            return Err(AbiError::unimplemented("ABI data", ty));
        }
        let key = Self::decode_key(ty, false);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let stride = ty.calldata_stride(abi.reg)?;
            let bound = |length: Expr| {
                revert_if(call(
                    "gt",
                    vec![
                        call("add", vec![id("arrayPos"), call("mul", vec![length, num(stride)])]),
                        id("end"),
                    ],
                ))
            };
            match static_length(&arr) {
                None if arr.is_dynamically_sized() => Ok(Routine::new(
                    name,
                    &["offset", "end"],
                    &["arrayPos", "length"],
                    vec![
                        offset_in_bounds(id("offset")),
                        assign("length", call("calldataload", vec![id("offset")])),
                        revert_if(call("gt", vec![id("length"), num(MAX_OFFSET)])),
                        assign("arrayPos", call("add", vec![id("offset"), num(0x20)])),
                        bound(id("length")),
                    ],
                )),
                Some(length) => Ok(Routine::new(
                    name,
                    &["offset", "end"],
                    &["arrayPos"],
                    vec![assign("arrayPos", id("offset")), bound(num(length))],
                )),
                None => Err(AbiError::unimplemented("ABI data", &ty)),
            }
        })
    }

    fn calldata_struct_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        if from_memory || ty.is_dynamically_encoded(self.reg)? {
            return Err(AbiError::unimplemented("ABI data", ty));
        }
        let key = Self::decode_key(ty, false);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let size = ty.calldata_encoded_size(abi.reg, true)?;
            Ok(Routine::new(
                name,
                &["offset", "end"],
                &["value"],
                vec![
                    revert_if(call("slt", vec![call("sub", vec![id("end"), id("offset")]), num(size)])),
                    assign("value", id("offset")),
                ],
            ))
        })
    }

    fn struct_decoder(&mut self, ty: &TypeRef, from_memory: bool) -> Result<String, AbiError> {
        let key = Self::decode_key(ty, from_memory);
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let load = loader(from_memory);
            let members = ty.members(abi.reg, None)?;
            let member_types: Vec<TypeRef> = members
                .iter()
                .filter(|m| m.ty.can_live_outside_storage())
                .map(|m| m.ty.decoding_type(abi.reg))
                .collect::<Result<_, _>>()?;
            let min_size = abi.head_size(&member_types)?;
            let allocate = abi.allocation_function()?;
            let memory_size = ty.memory_data_size(abi.reg)?;
            let mut body = vec![
                revert_if(call("slt", vec![call("sub", vec![id("end"), id("headStart")]), num(min_size)])),
                assign("value", call(allocate, vec![num(memory_size)])),
            ];
            let mut head_pos = 0u64;
            let mut memory_offset = 0u64;
            let stored = members.iter().filter(|m| m.ty.can_live_outside_storage());
            for (member, decoding) in stored.zip(&member_types) {
                let decoder = abi.abi_decoding_function(&member.ty, from_memory, false)?;
                let mut block = vec![crate::yul::comment(member.name.clone())];
                if decoding.is_dynamically_encoded(abi.reg)? {
                    block.push(let_(
                        "offset",
                        call(load, vec![call("add", vec![id("headStart"), num(head_pos)])]),
                    ));
                    block.push(revert_if(call("gt", vec![id("offset"), num(MAX_OFFSET)])));
                } else {
                    block.push(let_("offset", num(head_pos)));
                }
                block.push(expr(call(
                    "mstore",
                    vec![
                        call("add", vec![id("value"), num(memory_offset)]),
                        call(decoder, vec![call("add", vec![id("headStart"), id("offset")]), id("end")]),
                    ],
                )));
                body.push(Stmt::Block(block));
                head_pos += decoding.calldata_head_size(abi.reg)?;
                memory_offset += member.ty.memory_head_size(abi.reg)?;
            }
            Ok(Routine::new(name, &["headStart", "end"], &["value"], body)
                .with_comment(ty.to_string()))
        })
    }

    fn function_type_decoder(&mut self, ty: &TypeRef, from_memory: bool, for_stack: bool) -> Result<String, AbiError> {
        let key = RoutineKey::Decode {
            ty: ty.identifier(),
            from_memory,
            for_stack,
        };
        let ty = ty.clone();
        self.create(key, move |abi, name| {
            let validator = abi.validator_function(&ty)?;
            let load = call(loader(from_memory), vec![id("offset")]);
            if for_stack {
                let split = abi.split_external_function_id_function()?;
                Ok(Routine::new(
                    name,
                    &["offset", "end"],
                    &["addr", "function_selector"],
                    vec![
                        let_("fun", load),
                        expr(call(validator, vec![id("fun")])),
                        Stmt::Assign(
                            vec!["addr".into(), "function_selector".into()],
                            call(split, vec![id("fun")]),
                        ),
                    ],
                ))
            } else {
                Ok(Routine::new(
                    name,
                    &["offset", "end"],
                    &["fun"],
                    vec![assign("fun", load), expr(call(validator, vec![id("fun")]))],
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::RoutineCache;
    use crate::types::TypeRegistry;

    #[test]
    fn decoder_names() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let name = abi.tuple_decoder(&[Type::uint256(), Type::boolean()], true).unwrap();
        assert_eq!(name, "abi_decode_tuple_t_uint256t_bool_fromMemory");
        assert!(cache.contains("abi_decode_t_bool_fromMemory"));
        assert!(cache.contains("validator_revert_t_bool"));
    }

    #[test]
    fn calldata_arrays_with_dynamic_bases_are_unsupported() {
        let reg = TypeRegistry::new();
        let mut cache = RoutineCache::new();
        let mut abi = AbiFunctions::new(&reg, &mut cache);
        let nested = Type::array(
            DataLocation::CallData,
            Type::array(DataLocation::CallData, Type::uint256(), None),
            None,
        );
        assert!(matches!(
            abi.abi_decoding_function(&nested, false, false),
            Err(AbiError::Unimplemented { .. })
        ));
        assert!(cache.is_empty());
    }
}
