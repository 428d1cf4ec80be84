//! Size facts: storage bytes and slots, call-data and memory sizes, stack size.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

use super::{DataLocation, FunctionKind, Type, TypeError, TypeRegistry};

/// Bytes needed to represent `value` (at least one).
pub(crate) fn bytes_required(mut value: usize) -> usize {
    let mut bytes = 1;
    while value > 0xff {
        value >>= 8;
        bytes += 1;
    }
    bytes
}

impl Type {
    /// Bytes a value occupies when packed into a storage slot.
    pub fn storage_bytes(&self, reg: &TypeRegistry) -> Result<usize, TypeError> {
        Ok(match self {
            Type::Address { .. } => 20,
            Type::Integer(i) => usize::from(i.bits / 8),
            Type::Bool => 1,
            Type::FixedBytes(n) => usize::from(*n),
            Type::Enum(e) => {
                let count = reg.enum_def(e.id)?.values.len();
                if count <= 1 { 1 } else { bytes_required(count - 1) }
            }
            Type::Contract(c) if !c.is_super => 20,
            Type::Function(f) if f.kind == FunctionKind::External => 24,
            Type::Function(f) if f.kind == FunctionKind::Internal => 8,
            _ => 32,
        })
    }

    /// Number of storage slots a value occupies.
    pub fn storage_size(&self, reg: &TypeRegistry) -> Result<BigUint, TypeError> {
        if !self.can_be_stored() {
            return Err(TypeError::NotStorable(self.to_string()));
        }
        match self {
            Type::Array(a) => {
                let Some(length) = &a.length else {
                    return Ok(BigUint::one());
                };
                let base_bytes = a.base.storage_bytes(reg)?;
                let size = if base_bytes == 0 {
                    BigUint::one()
                } else if base_bytes < 32 {
                    let per_slot = 32 / base_bytes;
                    (length + (per_slot - 1)) / per_slot
                } else {
                    length * a.base.storage_size(reg)?
                };
                if size >= BigUint::one() << 256u32 {
                    return Err(TypeError::ArrayTooLarge);
                }
                Ok(size.max(BigUint::one()))
            }
            Type::Struct(s) => reg.guarded(s.id, || {
                let size = reg.struct_storage_members(s.id)?.storage_size(reg)?;
                Ok(size.max(BigUint::one()))
            }),
            _ => Ok(BigUint::one()),
        }
    }

    /// Whether the ABI encoding of this type has a dynamic (tail) part.
    pub fn is_dynamically_encoded(&self, reg: &TypeRegistry) -> Result<bool, TypeError> {
        match self {
            Type::Array(a) => {
                Ok(a.is_dynamically_sized() || a.base.is_dynamically_encoded(reg)?)
            }
            Type::Struct(s) => reg.guarded(s.id, || {
                for ty in self.memory_member_types(reg)? {
                    if ty.interface_type(reg, false)?.is_dynamically_encoded(reg)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }),
            _ => Ok(false),
        }
    }

    /// Size in the ABI head (or packed) encoding of a statically encoded value.
    pub fn calldata_encoded_size(&self, reg: &TypeRegistry, padded: bool) -> Result<u64, TypeError> {
        match self {
            Type::Address { .. } | Type::Contract(_) => Ok(if padded { 32 } else { 20 }),
            Type::Integer(i) => Ok(if padded { 32 } else { u64::from(i.bits / 8) }),
            Type::Bool => Ok(if padded { 32 } else { 1 }),
            Type::FixedBytes(n) => Ok(if padded { 32 } else { u64::from(*n) }),
            Type::Enum(_) => Ok(if padded {
                32
            } else {
                self.storage_bytes(reg)? as u64
            }),
            Type::Function(_) => Ok(if padded {
                32
            } else {
                self.storage_bytes(reg)? as u64
            }),
            Type::Array(a) => {
                if self.is_dynamically_encoded(reg)? {
                    return Err(TypeError::DynamicallyEncoded(self.to_string()));
                }
                let stride = if a.is_byte_array() {
                    1
                } else {
                    a.base.calldata_head_size(reg)?
                };
                let size = a.static_length() * stride;
                let size = if padded {
                    (size + 31u32) / 32u32 * 32u32
                } else {
                    size
                };
                size.to_u64().ok_or(TypeError::ArrayTooLarge)
            }
            Type::Struct(_) => {
                if self.is_dynamically_encoded(reg)? {
                    return Err(TypeError::DynamicallyEncoded(self.to_string()));
                }
                let mut size = 0u64;
                for ty in self.memory_member_types(reg)? {
                    size = size
                        .checked_add(ty.calldata_encoded_size(reg, true)?)
                        .ok_or(TypeError::ArrayTooLarge)?;
                }
                Ok(size)
            }
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Bytes this value takes in the head of an ABI encoded tuple.
    pub fn calldata_head_size(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        if self.is_dynamically_encoded(reg)? {
            Ok(32)
        } else {
            self.calldata_encoded_size(reg, true)
        }
    }

    /// Minimum size of the tail of a dynamically encoded value.
    pub fn calldata_encoded_tail_size(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        match self {
            Type::Array(a) if a.is_dynamically_sized() => Ok(32),
            Type::Array(a) => {
                let stride = a.base.calldata_head_size(reg)?;
                (a.static_length() * stride)
                    .to_u64()
                    .ok_or(TypeError::ArrayTooLarge)
            }
            Type::Struct(_) => {
                let mut size = 0u64;
                for ty in self.memory_member_types(reg)? {
                    size = size
                        .checked_add(ty.calldata_head_size(reg)?)
                        .ok_or(TypeError::ArrayTooLarge)?;
                }
                Ok(size)
            }
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Bytes a value takes when stored inline in memory (pointers for references).
    pub fn memory_head_size(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        if self.is_reference() {
            Ok(32)
        } else {
            self.calldata_encoded_size(reg, true)
        }
    }

    /// Size of the memory area of a statically sized memory array or a struct.
    pub fn memory_data_size(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        match self {
            Type::Array(a) if !a.is_dynamically_sized() && !a.is_byte_array() => {
                let head = a.base.memory_head_size(reg)?;
                (a.static_length() * head)
                    .to_u64()
                    .ok_or(TypeError::ArrayTooLarge)
            }
            Type::Struct(_) => {
                let mut size = 0u64;
                for ty in self.memory_member_types(reg)? {
                    size += ty.memory_head_size(reg)?;
                }
                Ok(size)
            }
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Stride between elements of an array in memory.
    pub fn memory_stride(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        match self {
            Type::Array(a) if a.is_byte_array() => Ok(1),
            Type::Array(a) => a.base.memory_head_size(reg),
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Stride between elements of an array in call-data.
    pub fn calldata_stride(&self, reg: &TypeRegistry) -> Result<u64, TypeError> {
        match self {
            Type::Array(a) if a.is_byte_array() => Ok(1),
            Type::Array(a) => a.base.calldata_head_size(reg),
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Number of stack slots a value of this type takes.
    pub fn size_on_stack(&self) -> usize {
        match self {
            Type::Array(a) if a.location == DataLocation::CallData => {
                if a.is_dynamically_sized() { 2 } else { 1 }
            }
            Type::Struct(_) => 1,
            Type::Function(f) => {
                let mut size = match f.kind {
                    FunctionKind::External | FunctionKind::DelegateCall => 2,
                    FunctionKind::Internal
                    | FunctionKind::BareCall
                    | FunctionKind::BareDelegateCall
                    | FunctionKind::BareStaticCall
                    | FunctionKind::ArrayPush
                    | FunctionKind::ArrayPop
                    | FunctionKind::ByteArrayPush => 1,
                    _ => 0,
                };
                if f.gas_set {
                    size += 1;
                }
                if f.value_set {
                    size += 1;
                }
                if let Some(bound) = &f.bound {
                    size += bound.size_on_stack();
                }
                size
            }
            Type::Contract(c) if c.is_super => 0,
            Type::Tuple(components) => components
                .iter()
                .map(|c| c.as_ref().map(|t| t.size_on_stack()).unwrap_or(0))
                .sum(),
            Type::StringLiteral(_)
            | Type::TypeType(_)
            | Type::Modifier(_)
            | Type::Magic(_) => 0,
            _ => 1,
        }
    }

    /// Whether the storage size is exactly one slot.
    pub fn is_single_slot(&self, reg: &TypeRegistry) -> Result<bool, TypeError> {
        Ok(self.storage_size(reg)?.is_one())
    }
}
