//! Types derived from a type: mobile, interface, encoding and decoding types.

use std::sync::Arc;

use super::convert::integer_type_for;
use super::{DataLocation, FunctionKind, Type, TypeError, TypeRef, TypeRegistry};

impl Type {
    /// Concrete runtime type a literal materializes as; the type itself otherwise.
    pub fn mobile_type(&self) -> Option<TypeRef> {
        match self {
            Type::IntegerConstant(value) => integer_type_for(value),
            Type::StringLiteral(_) => Some(Type::string_memory()),
            Type::Tuple(components) => {
                let mut mobiles = Vec::with_capacity(components.len());
                for component in components {
                    match component {
                        Some(c) => mobiles.push(Some(c.mobile_type()?)),
                        None => mobiles.push(None),
                    }
                }
                Some(Arc::new(Type::Tuple(mobiles)))
            }
            other => Some(Arc::new(other.clone())),
        }
    }

    /// Type used in the external interface of a function.
    pub fn interface_type(&self, reg: &TypeRegistry, in_library: bool) -> Result<TypeRef, TypeError> {
        match self {
            Type::Address { .. } | Type::Integer(_) | Type::Bool | Type::FixedBytes(_) => {
                Ok(Arc::new(self.clone()))
            }
            Type::Enum(_) | Type::Contract(_) if in_library => match self {
                Type::Contract(c) if c.is_super => Err(TypeError::NoInterfaceType(
                    "super cannot be used externally".into(),
                )),
                _ => Ok(Arc::new(self.clone())),
            },
            Type::Enum(_) => self.encoding_type(reg),
            Type::Contract(c) if !c.is_super => self.encoding_type(reg),
            Type::Function(f) if f.kind == FunctionKind::External => Ok(Arc::new(self.clone())),
            Type::Function(_) => Err(TypeError::NoInterfaceType(
                "Internal type cannot be used for external function type.".into(),
            )),
            Type::Array(a) => {
                let base = a.base.interface_type(reg, in_library)?;
                if in_library && a.location == DataLocation::Storage {
                    Ok(Arc::new(self.clone()))
                } else if a.is_byte_array() {
                    Ok(self.with_location(DataLocation::Memory, true))
                } else {
                    Ok(Type::array(DataLocation::Memory, base, a.length.clone())
                        .with_location(DataLocation::Memory, true))
                }
            }
            Type::Struct(s) => {
                let recursive = reg.is_recursive(s.id)?;
                if recursive && !(in_library && s.location == DataLocation::Storage) {
                    return Err(TypeError::NoInterfaceType(
                        "Recursive type not allowed for public or external contract functions."
                            .into(),
                    ));
                }
                if !recursive {
                    for member in reg.struct_def(s.id)?.members() {
                        let mut inner = &member.1;
                        while let Type::Array(a) = inner.as_ref() {
                            inner = &a.base;
                        }
                        inner.interface_type(reg, in_library)?;
                    }
                }
                if in_library && s.location == DataLocation::Storage {
                    Ok(Arc::new(self.clone()))
                } else {
                    Ok(self.with_location(DataLocation::Memory, true))
                }
            }
            Type::Mapping { key, value } if in_library => {
                key.interface_type(reg, true)?;
                value.interface_type(reg, true)?;
                Ok(Arc::new(self.clone()))
            }
            Type::Mapping { .. } => Err(TypeError::NoInterfaceType(
                "Only libraries are allowed to use the mapping type in public or external functions."
                    .into(),
            )),
            _ => Err(TypeError::NoInterfaceType(format!(
                "Type {} is not allowed in external functions.",
                self
            ))),
        }
    }

    /// Type a value is converted to right before it is ABI encoded.
    pub fn encoding_type(&self, reg: &TypeRegistry) -> Result<TypeRef, TypeError> {
        match self {
            Type::Address { .. } | Type::Integer(_) | Type::Bool | Type::FixedBytes(_) => {
                Ok(Arc::new(self.clone()))
            }
            Type::Enum(_) => Ok(Type::uint((self.storage_bytes(reg)? * 8) as u16)),
            Type::Contract(c) if !c.is_super => {
                if reg.contract(c.id)?.payable_fallback {
                    Ok(Type::address_payable())
                } else {
                    Ok(Type::address())
                }
            }
            Type::Function(f)
                if f.kind == FunctionKind::External && !f.gas_set && !f.value_set =>
            {
                Ok(Arc::new(self.clone()))
            }
            Type::Array(_) | Type::Struct(_) => {
                if self.location() == Some(DataLocation::Storage) {
                    Ok(Type::uint256())
                } else {
                    Ok(self.with_location(DataLocation::Memory, true))
                }
            }
            Type::Mapping { .. } => Ok(Type::uint256()),
            _ => Err(TypeError::NotEncodable(self.to_string())),
        }
    }

    /// Type a value has right after being ABI decoded.
    pub fn decoding_type(&self, reg: &TypeRegistry) -> Result<TypeRef, TypeError> {
        match self {
            Type::Array(_) | Type::Struct(_) => {
                if self.location() == Some(DataLocation::Storage) {
                    Ok(Type::uint256())
                } else {
                    Ok(Arc::new(self.clone()))
                }
            }
            _ => self.encoding_type(reg),
        }
    }

    /// Mobile type, then interface type, then encoding type.
    pub fn full_encoding_type(&self, reg: &TypeRegistry, in_library: bool) -> Result<TypeRef, TypeError> {
        let mobile = self
            .mobile_type()
            .ok_or_else(|| TypeError::NotEncodable(self.to_string()))?;
        mobile.interface_type(reg, in_library)?.encoding_type(reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DefId;

    #[test]
    fn literals_become_mobile() {
        assert_eq!(Type::constant(300).mobile_type(), Some(Type::uint(16)));
        assert_eq!(
            Type::string_literal("x").mobile_type(),
            Some(Type::string_memory())
        );
        let tuple = Type::tuple(vec![Type::constant(1), Type::boolean()]);
        assert_eq!(
            tuple.mobile_type(),
            Some(Type::tuple(vec![Type::uint(8), Type::boolean()]))
        );
    }

    #[test]
    fn storage_arrays_encode_as_memory_copies() {
        let reg = TypeRegistry::new();
        let storage = Type::array(DataLocation::Storage, Type::uint(8), None);
        let encoded = storage.full_encoding_type(&reg, false).unwrap();
        assert_eq!(encoded.identifier(), "t_array$_t_uint8_$dyn_memory_ptr");
        let library = storage.full_encoding_type(&reg, true).unwrap();
        assert_eq!(library, Type::uint256());
    }

    #[test]
    fn recursive_structs_have_no_interface_type() {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_struct("Node", None).unwrap();
        let me = Type::struct_type(id, "Node", DataLocation::Storage);
        reg.define_struct(
            id,
            vec![("next".into(), Type::array(DataLocation::Storage, me.clone(), None))],
        )
        .unwrap();
        assert!(me.interface_type(&reg, false).is_err());
        assert!(me.interface_type(&reg, true).is_ok());
        assert!(Type::enum_type(DefId(0), "Node").encoding_type(&reg).is_err());
    }

    #[test]
    fn constants_encode_through_mobile_type() {
        let reg = TypeRegistry::new();
        assert_eq!(
            Type::constant(-1).full_encoding_type(&reg, false).unwrap(),
            Type::int(8)
        );
        assert!(Type::mapping(Type::uint256(), Type::uint256())
            .interface_type(&reg, false)
            .is_err());
    }
}
