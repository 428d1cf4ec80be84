//! Encoders: tuples and one routine family per source category and location.

use num_traits::ToPrimitive;

use super::{AbiError, AbiFunctions, EncodingOptions, RoutineKey, stack_names};
use crate::types::{ArrayType, DataLocation, FunctionKind, StructType, Type, TypeRef};
use crate::yul::{
    Expr, Routine, Stmt, assign, big, call, counted_loop, expr, id, if_, let_, num,
};
use num_bigint::BigUint;

fn ids(types: &[TypeRef]) -> Vec<String> {
    types.iter().map(|t| t.identifier()).collect()
}

fn args(values: &[String], pos: Expr) -> Vec<Expr> {
    values.iter().map(id).chain(std::iter::once(pos)).collect()
}

impl AbiFunctions<'_> {
    fn full_encoding_types(&self, types: &[TypeRef], in_library: bool) -> Result<Vec<TypeRef>, AbiError> {
        types
            .iter()
            .map(|t| Ok(t.full_encoding_type(self.reg, in_library)?))
            .collect()
    }

    /// `(headStart, value0, …) -> tail`: standard ABI encoding of stack
    /// values of types `given` as `target`.
    pub fn tuple_encoder(
        &mut self,
        given: &[TypeRef],
        target: &[TypeRef],
        encode_as_library_types: bool,
    ) -> Result<String, AbiError> {
        if given.len() != target.len() {
            return Err(AbiError::LengthMismatch {
                expected: target.len(),
                got: given.len(),
            });
        }
        let options = EncodingOptions::standard(encode_as_library_types);
        let key = RoutineKey::TupleEncoder {
            given: ids(given),
            target: ids(target),
            options,
        };
        let (given, target) = (given.to_vec(), target.to_vec());
        self.create_externally_used(key, move |abi, name| {
            let encoded = abi.full_encoding_types(&target, encode_as_library_types)?;
            let head_size = abi.head_size(&encoded)?;
            let mut params = vec!["headStart".to_string()];
            let mut body = vec![assign("tail", call("add", vec![id("headStart"), num(head_size)]))];
            let mut head_pos = 0u64;
            for ((from, to), to_encoded) in given.iter().zip(&target).zip(&encoded) {
                let values = stack_names("value", params.len() - 1, from.size_on_stack());
                params.extend(values.iter().cloned());
                let encoder = abi.abi_encoding_function(from, to, options)?;
                let at = call("add", vec![id("headStart"), num(head_pos)]);
                if to_encoded.is_dynamically_encoded(abi.reg)? {
                    body.push(expr(call("mstore", vec![at, call("sub", vec![id("tail"), id("headStart")])])));
                    body.push(assign("tail", call(encoder, args(&values, id("tail")))));
                } else {
                    body.push(expr(call(encoder, args(&values, at))));
                }
                head_pos += to_encoded.calldata_head_size(abi.reg)?;
            }
            Ok(Routine::new(name, &[], &["tail"], body).with_params(params))
        })
    }

    /// `(pos, value0, …) -> end`: packed encoding (no padding, dynamic data in place).
    pub fn tuple_encoder_packed(&mut self, given: &[TypeRef], target: &[TypeRef]) -> Result<String, AbiError> {
        if given.len() != target.len() {
            return Err(AbiError::LengthMismatch {
                expected: target.len(),
                got: given.len(),
            });
        }
        let options = EncodingOptions::packed();
        let key = RoutineKey::TupleEncoderPacked {
            given: ids(given),
            target: ids(target),
        };
        let (given, target) = (given.to_vec(), target.to_vec());
        self.create_externally_used(key, move |abi, name| {
            let encoded = abi.full_encoding_types(&target, false)?;
            let mut params = vec!["pos".to_string()];
            let mut body = Vec::new();
            for ((from, to), to_encoded) in given.iter().zip(&target).zip(&encoded) {
                let values = stack_names("value", params.len() - 1, from.size_on_stack());
                params.extend(values.iter().cloned());
                let encoder = abi.abi_encoding_function(from, to, options)?;
                if to_encoded.is_dynamically_encoded(abi.reg)? {
                    body.push(assign("pos", call(encoder, args(&values, id("pos")))));
                } else {
                    body.push(expr(call(encoder, args(&values, id("pos")))));
                    let size = to_encoded.calldata_encoded_size(abi.reg, false)?;
                    body.push(assign("pos", call("add", vec![id("pos"), num(size)])));
                }
            }
            body.push(assign("end", id("pos")));
            Ok(Routine::new(name, &[], &["end"], body).with_params(params))
        })
    }

    /// Encoder of one value of type `from` as `to`.
    ///
    /// The routine takes the stack words of `from` followed by `pos`; it
    /// returns the updated end position iff `to` is dynamically encoded.
    pub fn abi_encoding_function(
        &mut self,
        from: &TypeRef,
        to: &TypeRef,
        options: EncodingOptions,
    ) -> Result<String, AbiError> {
        let to = to.full_encoding_type(self.reg, options.encode_as_library_types)?;
        if let Type::StringLiteral(_) = from.as_ref() {
            return self.string_literal_encoder(from, &to, options);
        }
        match (from.as_ref(), to.as_ref()) {
            (Type::Array(from_arr), Type::Array(_)) => {
                if from_arr.location == DataLocation::CallData {
                    self.calldata_array_encoder(from, &to, options)
                } else if !from_arr.is_byte_array()
                    && (from_arr.location == DataLocation::Memory
                        || from_arr.base.storage_bytes(self.reg)? > 16)
                {
                    self.simple_array_encoder(from, &to, options)
                } else if from_arr.location == DataLocation::Memory {
                    self.memory_byte_array_encoder(from, &to, options)
                } else {
                    self.compact_storage_array_encoder(from, &to, options)
                }
            }
            (Type::Struct(_), Type::Struct(_)) => self.struct_encoder(from, &to, options),
            (Type::Function(_), Type::Function(_)) => self.function_type_encoder(from, &to, options),
            (Type::Array(_) | Type::Struct(_), _) if from.location() == Some(DataLocation::Storage) => {
                self.value_type_encoder(from, &to, options)
            }
            (_, Type::Array(_) | Type::Struct(_) | Type::Function(_)) => {
                Err(AbiError::unimplemented(from, &to))
            }
            _ => self.value_type_encoder(from, &to, options),
        }
    }

    /// `(value, pos) -> updatedPos`: encodes and returns the position after the value.
    pub fn abi_encode_and_return_updated_pos(
        &mut self,
        from: &TypeRef,
        to: &TypeRef,
        options: EncodingOptions,
    ) -> Result<String, AbiError> {
        let key = RoutineKey::EncodeUpdatedPos {
            from: from.identifier(),
            to: to.identifier(),
            options,
        };
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let encoder = abi.abi_encoding_function(&from, &to, options)?;
            let to = to.full_encoding_type(abi.reg, options.encode_as_library_types)?;
            let values = stack_names("value", 0, from.size_on_stack());
            let body = if to.is_dynamically_encoded(abi.reg)? {
                vec![assign("updatedPos", call(encoder, args(&values, id("pos"))))]
            } else {
                let size = to.calldata_encoded_size(abi.reg, options.padded)?;
                vec![
                    expr(call(encoder, args(&values, id("pos")))),
                    assign("updatedPos", call("add", vec![id("pos"), num(size)])),
                ]
            };
            let mut params = values;
            params.push("pos".into());
            Ok(Routine::new(name, &[], &["updatedPos"], body).with_params(params))
        })
    }

    fn encode_key(from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> RoutineKey {
        RoutineKey::Encode {
            from: from.identifier(),
            to: to.identifier(),
            options,
        }
    }

    fn value_type_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let value = if from.is_reference() && from.location() == Some(DataLocation::Storage) {
                // Library calls pass storage references as their slot.
                id("value")
            } else if from == to {
                call(abi.cleanup_function(&from)?, vec![id("value")])
            } else {
                call(abi.conversion_function(&from, &to)?, vec![id("value")])
            };
            let value = if options.padded {
                value
            } else {
                call(abi.left_align_function(&to)?, vec![value])
            };
            Ok(Routine::new(
                name,
                &["value", "pos"],
                &[],
                vec![expr(call("mstore", vec![id("pos"), value]))],
            ))
        })
    }

    fn string_literal_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let Type::StringLiteral(bytes) = from.as_ref() else {
            return Err(AbiError::unimplemented(from, to));
        };
        let key = Self::encode_key(from, to, options);
        let (bytes, to) = (bytes.clone(), to.clone());
        self.create(key, move |abi, name| {
            let words: Vec<Expr> = bytes
                .chunks(32)
                .map(|chunk| {
                    let mut word = [0u8; 32];
                    if let Some(dst) = word.get_mut(..chunk.len()) {
                        dst.copy_from_slice(chunk);
                    }
                    big(BigUint::from_bytes_be(&word))
                })
                .collect();
            match to.as_ref() {
                Type::Array(arr) if arr.is_dynamically_sized() => {
                    let length = bytes.len() as u64;
                    let store_length = abi.array_store_length_function(&to, options)?;
                    let mut body = vec![assign("pos", call(store_length, vec![id("pos"), num(length)]))];
                    for (i, word) in words.iter().enumerate() {
                        body.push(expr(call(
                            "mstore",
                            vec![call("add", vec![id("pos"), num(32 * i as u64)]), word.clone()],
                        )));
                    }
                    let size = if options.padded {
                        32 * words.len() as u64
                    } else {
                        length
                    };
                    body.push(assign("end", call("add", vec![id("pos"), num(size)])));
                    Ok(Routine::new(name, &["pos"], &["end"], body))
                }
                Type::FixedBytes(_) => {
                    let word = words.into_iter().next().unwrap_or_else(|| num(0));
                    Ok(Routine::new(
                        name,
                        &["pos"],
                        &[],
                        vec![expr(call("mstore", vec![id("pos"), word]))],
                    ))
                }
                _ => Err(AbiError::unimplemented(format!("literal of {} bytes", bytes.len()), &to)),
            }
        })
    }

    fn calldata_array_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let from_arr = array_of(from)?;
        let to_arr = array_of(to)?;
        let base_is_value = from_arr.base.is_value_type();
        if !from_arr.is_byte_array() && (!base_is_value || from_arr.base.is_dynamically_encoded(self.reg)?) {
            return Err(AbiError::unimplemented(from, to));
        }
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let dynamic = to.is_dynamically_encoded(abi.reg)?;
            let store_length = abi.array_store_length_function(&to, options)?;
            let mut params = vec!["start".to_string()];
            let mut body = Vec::new();
            match &from_arr.length {
                None => params.push("length".into()),
                Some(length) => body.push(let_("length", big(length.clone()))),
            }
            params.push("pos".into());
            body.push(assign("pos", call(store_length, vec![id("pos"), id("length")])));
            if from_arr.is_byte_array() {
                let copy = abi.copy_to_memory_function(true)?;
                body.push(expr(call(copy, vec![id("start"), id("pos"), id("length")])));
                let size = if options.padded {
                    call(abi.round_up_function()?, vec![id("length")])
                } else {
                    id("length")
                };
                body.push(assign("pos", call("add", vec![id("pos"), size])));
            } else {
                let element = abi.abi_encode_and_return_updated_pos(&from_arr.base, &to_arr.base, options.nested())?;
                let stride = from.calldata_stride(abi.reg)?;
                body.push(let_("srcPtr", id("start")));
                body.push(counted_loop(
                    "i",
                    id("length"),
                    num(1),
                    vec![
                        assign("pos", call(element, vec![call("calldataload", vec![id("srcPtr")]), id("pos")])),
                        assign("srcPtr", call("add", vec![id("srcPtr"), num(stride)])),
                    ],
                ));
            }
            let returns: &[&str] = if dynamic {
                body.push(assign("end", id("pos")));
                &["end"]
            } else {
                &[]
            };
            Ok(Routine::new(name, &[], returns, body)
                .with_params(params)
                .with_comment(format!("{} -> {}", from, to)))
        })
    }

    fn memory_byte_array_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let length = abi.array_length_function(&from)?;
            let store_length = abi.array_store_length_function(&to, options)?;
            let copy = abi.copy_to_memory_function(false)?;
            let size = if options.padded {
                call(abi.round_up_function()?, vec![id("length")])
            } else {
                id("length")
            };
            let body = vec![
                let_("length", call(length, vec![id("value")])),
                assign("pos", call(store_length, vec![id("pos"), id("length")])),
                expr(call(copy, vec![call("add", vec![id("value"), num(0x20)]), id("pos"), id("length")])),
                assign("end", call("add", vec![id("pos"), size])),
            ];
            Ok(Routine::new(name, &["value", "pos"], &["end"], body)
                .with_comment(format!("{} -> {}", from, to)))
        })
    }

    fn simple_array_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let from_arr = array_of(from)?;
        let to_arr = array_of(to)?;
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let dynamic = to.is_dynamically_encoded(abi.reg)?;
            let uses_tail = to_arr.base.is_dynamically_encoded(abi.reg)? && !options.dynamic_inplace;
            let sub_options = options.nested();
            let element_encoder = if uses_tail {
                abi.abi_encoding_function(&from_arr.base, &to_arr.base, sub_options)?
            } else {
                abi.abi_encode_and_return_updated_pos(&from_arr.base, &to_arr.base, sub_options)?
            };
            let length = abi.array_length_function(&from)?;
            let store_length = abi.array_store_length_function(&to, options)?;
            let data_area = abi.array_data_area_function(&from)?;
            let next = abi.array_next_element_function(&from)?;
            let element = match from_arr.location {
                DataLocation::Memory => call("mload", vec![id("srcPtr")]),
                DataLocation::Storage if from_arr.base.is_value_type() => {
                    call(abi.read_from_storage_function(&from_arr.base)?, vec![id("srcPtr")])
                }
                _ => id("srcPtr"),
            };

            let mut body = vec![
                let_("length", call(length, vec![id("value")])),
                assign("pos", call(store_length, vec![id("pos"), id("length")])),
            ];
            let mut loop_body = Vec::new();
            if uses_tail {
                body.push(let_("headStart", id("pos")));
                body.push(let_(
                    "tail",
                    call("add", vec![id("pos"), call("mul", vec![id("length"), num(0x20)])]),
                ));
                loop_body.push(expr(call("mstore", vec![id("pos"), call("sub", vec![id("tail"), id("headStart")])])));
                loop_body.push(let_("elementValue0", element));
                loop_body.push(assign("tail", call(element_encoder, vec![id("elementValue0"), id("tail")])));
            } else {
                loop_body.push(let_("elementValue0", element));
                loop_body.push(assign("pos", call(element_encoder, vec![id("elementValue0"), id("pos")])));
            }
            loop_body.push(assign("srcPtr", call(next, vec![id("srcPtr")])));
            if uses_tail {
                loop_body.push(assign("pos", call("add", vec![id("pos"), num(0x20)])));
            }
            body.push(let_("srcPtr", call(data_area, vec![id("value")])));
            body.push(counted_loop("i", id("length"), num(1), loop_body));
            if uses_tail {
                body.push(assign("pos", id("tail")));
            }
            let returns: &[&str] = if dynamic {
                body.push(assign("end", id("pos")));
                &["end"]
            } else {
                &[]
            };
            Ok(Routine::new(name, &["value", "pos"], returns, body)
                .with_comment(format!("{} -> {}", from, to)))
        })
    }

    fn compact_storage_array_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let from_arr = array_of(from)?;
        let to_arr = array_of(to)?;
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let store_length = abi.array_store_length_function(&to, options)?;
            if from_arr.is_byte_array() {
                return abi.storage_byte_array_body(name, &from, store_length, options);
            }
            let dynamic = to.is_dynamically_encoded(abi.reg)?;
            let item_bytes = from_arr.base.storage_bytes(abi.reg)?;
            let items_per_slot = (32 / item_bytes.max(1)) as u64;
            let sub_options = options.nested();
            let element_encoder = abi.abi_encoding_function(&from_arr.base, &to_arr.base, sub_options)?;
            let element_size = to_arr
                .base
                .full_encoding_type(abi.reg, options.encode_as_library_types)?
                .calldata_encoded_size(abi.reg, true)?;
            let length = abi.array_length_function(&from)?;
            let data_area = abi.array_data_area_function(&from)?;

            let mut extract = Vec::with_capacity(items_per_slot as usize);
            for k in 0..items_per_slot {
                let offset = (k as usize * item_bytes) as u8;
                extract.push(abi.extract_from_storage_function(&from_arr.base, offset)?);
            }
            let encode_item = |extractor: &String| -> Vec<Stmt> {
                vec![
                    expr(call(
                        element_encoder.clone(),
                        vec![call(extractor.clone(), vec![id("data")]), id("pos")],
                    )),
                    assign("pos", call("add", vec![id("pos"), num(element_size)])),
                ]
            };

            let mut full_slot = vec![let_("data", call("sload", vec![id("srcPtr")]))];
            for extractor in &extract {
                full_slot.extend(encode_item(extractor));
            }
            full_slot.push(assign("srcPtr", call("add", vec![id("srcPtr"), num(1)])));

            // The last slot may be partially filled.
            let mut partial_slot = vec![let_("data", call("sload", vec![id("srcPtr")]))];
            for extractor in extract.iter().take(items_per_slot as usize - 1) {
                let mut item = encode_item(extractor);
                item.push(assign("itemCounter", call("add", vec![id("itemCounter"), num(1)])));
                partial_slot.push(if_(call("lt", vec![id("itemCounter"), id("length")]), item));
            }

            let mut body = vec![
                let_("length", call(length, vec![id("value")])),
                assign("pos", call(store_length, vec![id("pos"), id("length")])),
                let_("srcPtr", call(data_area, vec![id("value")])),
                let_("itemCounter", num(0)),
                Stmt::For {
                    init: Vec::new(),
                    cond: call(
                        "lt",
                        vec![call("add", vec![id("itemCounter"), num(items_per_slot - 1)]), id("length")],
                    ),
                    post: vec![assign("itemCounter", call("add", vec![id("itemCounter"), num(items_per_slot)]))],
                    body: full_slot,
                },
                if_(call("lt", vec![id("itemCounter"), id("length")]), partial_slot),
            ];
            let returns: &[&str] = if dynamic {
                body.push(assign("end", id("pos")));
                &["end"]
            } else {
                &[]
            };
            Ok(Routine::new(name, &["value", "pos"], returns, body)
                .with_comment(format!("{} -> {}", from, to)))
        })
    }

    /// `bytes`/`string` in storage: short values live in the slot itself,
    /// long ones at `keccak256(slot)` with `2 * length + 1` in the slot.
    fn storage_byte_array_body(
        &mut self,
        name: String,
        from: &TypeRef,
        store_length: String,
        options: EncodingOptions,
    ) -> Result<Routine, AbiError> {
        let data_area = self.array_data_area_function(from)?;
        let round_up = self.round_up_function()?;
        let short_size = if options.padded {
            call(round_up, vec![id("length")])
        } else {
            id("length")
        };
        let long_size = if options.padded { id("i") } else { id("length") };
        let short = vec![
            let_("length", call("and", vec![call("div", vec![id("slotValue"), num(2)]), num(0x7f)])),
            assign("pos", call(store_length.clone(), vec![id("pos"), id("length")])),
            expr(call("mstore", vec![id("pos"), call("and", vec![id("slotValue"), call("not", vec![num(0xff)])])])),
            assign("ret", call("add", vec![id("pos"), short_size])),
        ];
        let long = vec![
            let_("length", call("div", vec![id("slotValue"), num(2)])),
            assign("pos", call(store_length, vec![id("pos"), id("length")])),
            let_("dataPos", call(data_area, vec![id("value")])),
            let_("i", num(0)),
            Stmt::For {
                init: Vec::new(),
                cond: call("lt", vec![id("i"), id("length")]),
                post: vec![assign("i", call("add", vec![id("i"), num(0x20)]))],
                body: vec![
                    expr(call("mstore", vec![call("add", vec![id("pos"), id("i")]), call("sload", vec![id("dataPos")])])),
                    assign("dataPos", call("add", vec![id("dataPos"), num(1)])),
                ],
            },
            assign("ret", call("add", vec![id("pos"), long_size])),
        ];
        Ok(Routine::new(
            name,
            &["value", "pos"],
            &["ret"],
            vec![
                let_("slotValue", call("sload", vec![id("value")])),
                Stmt::Switch {
                    scrutinee: call("and", vec![id("slotValue"), num(1)]),
                    cases: vec![(BigUint::from(0u8), short), (BigUint::from(1u8), long)],
                    default: None,
                },
            ],
        ))
    }

    fn struct_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        let from_struct = struct_of(from)?;
        if from_struct.location == DataLocation::CallData {
            return Err(AbiError::unimplemented(from, to));
        }
        let key = Self::encode_key(from, to, options);
        let (from, to) = (from.clone(), to.clone());
        self.create(key, move |abi, name| {
            let dynamic = to.is_dynamically_encoded(abi.reg)?;
            let inplace = options.dynamic_inplace;
            let sub_options = options.nested();
            let from_members = from.members(abi.reg, None)?;
            let to_members = to.members(abi.reg, None)?;
            let target_types: Vec<TypeRef> = to_members
                .iter()
                .filter(|m| m.ty.can_live_outside_storage())
                .map(|m| m.ty.full_encoding_type(abi.reg, options.encode_as_library_types))
                .collect::<Result<_, _>>()?;
            let head_size = abi.head_size(&target_types)?;

            let mut body = Vec::new();
            if dynamic && !inplace {
                body.push(let_("tail", call("add", vec![id("pos"), num(head_size)])));
            }
            let in_storage = from_struct.location == DataLocation::Storage;
            if in_storage {
                body.push(let_("slotValue", num(0)));
            }
            let mut previous_slot: Option<BigUint> = None;
            let mut encoding_offset = 0u64;
            let members = to_members.iter().filter(|m| m.ty.can_live_outside_storage());
            for (member, target) in members.zip(&target_types) {
                let source = from_members
                    .get(&member.name)
                    .ok_or_else(|| AbiError::unimplemented(&from, &to))?;
                let mut block = vec![crate::yul::comment(member.name.clone())];
                let member_value = if in_storage {
                    let position = from_members
                        .member_storage_offset(abi.reg, &member.name)?
                        .ok_or_else(|| AbiError::unimplemented(&from, &to))?
                        .clone();
                    if source.ty.is_value_type() {
                        if previous_slot.as_ref() != Some(&position.slot) {
                            block.push(assign(
                                "slotValue",
                                call("sload", vec![call("add", vec![id("value"), big(position.slot.clone())])]),
                            ));
                            previous_slot = Some(position.slot.clone());
                        }
                        let extract = abi.extract_from_storage_function(&source.ty, position.offset)?;
                        call(extract, vec![id("slotValue")])
                    } else {
                        call("add", vec![id("value"), big(position.slot)])
                    }
                } else {
                    let offset = from
                        .memory_offset_of_member(abi.reg, &member.name)?
                        .ok_or_else(|| AbiError::unimplemented(&from, &to))?;
                    call("mload", vec![call("add", vec![id("value"), num(offset)])])
                };
                block.push(let_("memberValue0", member_value));
                let member_dynamic = target.is_dynamically_encoded(abi.reg)?;
                if inplace {
                    let encoder = abi.abi_encode_and_return_updated_pos(&source.ty, &member.ty, sub_options)?;
                    block.push(assign("pos", call(encoder, vec![id("memberValue0"), id("pos")])));
                } else {
                    let encoder = abi.abi_encoding_function(&source.ty, &member.ty, sub_options)?;
                    let at = call("add", vec![id("pos"), num(encoding_offset)]);
                    if member_dynamic {
                        block.push(expr(call("mstore", vec![at, call("sub", vec![id("tail"), id("pos")])])));
                        block.push(assign("tail", call(encoder, vec![id("memberValue0"), id("tail")])));
                    } else {
                        block.push(expr(call(encoder, vec![id("memberValue0"), at])));
                    }
                }
                encoding_offset += target.calldata_head_size(abi.reg)?;
                body.push(Stmt::Block(block));
            }
            let returns: &[&str] = match (dynamic, inplace) {
                (true, true) => {
                    body.push(assign("end", id("pos")));
                    &["end"]
                }
                (true, false) => {
                    body.push(assign("end", id("tail")));
                    &["end"]
                }
                _ => &[],
            };
            Ok(Routine::new(name, &["value", "pos"], returns, body)
                .with_comment(format!("{} -> {}", from, to)))
        })
    }

    fn function_type_encoder(&mut self, from: &TypeRef, to: &TypeRef, options: EncodingOptions) -> Result<String, AbiError> {
        match from.as_function() {
            Some(f) if f.kind == FunctionKind::External => {}
            _ => return Err(AbiError::NotEncodable(from.to_string())),
        }
        let key = Self::encode_key(from, to, options);
        self.create(key, move |abi, name| {
            if options.encode_function_from_stack {
                let combine = abi.combine_external_function_id_function()?;
                Ok(Routine::new(
                    name,
                    &["addr", "function_id", "pos"],
                    &[],
                    vec![expr(call(
                        "mstore",
                        vec![id("pos"), call(combine, vec![id("addr"), id("function_id")])],
                    ))],
                ))
            } else {
                let cleanup = abi.cleanup_combined_external_function_id_function()?;
                Ok(Routine::new(
                    name,
                    &["addr_and_function_id", "pos"],
                    &[],
                    vec![expr(call(
                        "mstore",
                        vec![id("pos"), call(cleanup, vec![id("addr_and_function_id")])],
                    ))],
                ))
            }
        })
    }
}

pub(crate) fn array_of(ty: &TypeRef) -> Result<ArrayType, AbiError> {
    ty.as_array()
        .cloned()
        .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))
}

pub(crate) fn struct_of(ty: &TypeRef) -> Result<StructType, AbiError> {
    ty.as_struct()
        .cloned()
        .ok_or_else(|| AbiError::NotEncodable(ty.to_string()))
}

/// Static length of an array as a machine integer.
pub(crate) fn static_length(arr: &ArrayType) -> Option<u64> {
    arr.length.as_ref().and_then(|l| l.to_u64())
}
