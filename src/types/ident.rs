//! Identifiers, display names and canonical names.

use sha3::{Digest, Keccak256};
use std::fmt;

use super::{ArrayType, DataLocation, MagicKind, Type, TypeError, TypeRef, TypeRegistry};

/// Escape a rich identifier so that it is a valid routine name fragment.
pub fn escape_identifier(rich: &str) -> String {
    rich.replace('$', "$$$")
        .replace(',', "_$_")
        .replace('(', "$_")
        .replace(')', "_$")
}

fn identifier_list<'a>(types: impl IntoIterator<Item = Option<&'a TypeRef>>) -> String {
    let parts: Vec<String> = types
        .into_iter()
        .map(|t| t.map(|t| t.rich_identifier()).unwrap_or_default())
        .collect();
    format!("({})", parts.join(","))
}

fn location_suffix(location: DataLocation, is_pointer: bool) -> String {
    let mut id = match location {
        DataLocation::Storage => "_storage",
        DataLocation::Memory => "_memory",
        DataLocation::CallData => "_calldata",
    }
    .to_string();
    if is_pointer {
        id.push_str("_ptr");
    }
    id
}

fn reference_part(location: DataLocation, is_pointer: bool) -> &'static str {
    match (location, is_pointer) {
        (DataLocation::Storage, true) => "storage pointer",
        (DataLocation::Storage, false) => "storage ref",
        (DataLocation::CallData, _) => "calldata",
        (DataLocation::Memory, _) => "memory",
    }
}

impl Type {
    /// Structural identifier, unique per type.
    pub fn rich_identifier(&self) -> String {
        match self {
            Type::Address { payable: true } => "t_address_payable".into(),
            Type::Address { payable: false } => "t_address".into(),
            Type::Integer(i) => format!("t_{}int{}", if i.signed { "" } else { "u" }, i.bits),
            Type::IntegerConstant(v) => {
                if v.sign() == num_bigint::Sign::Minus {
                    format!("t_rational_minus_{}_by_1", v.magnitude())
                } else {
                    format!("t_rational_{}_by_1", v.magnitude())
                }
            }
            Type::StringLiteral(value) => {
                format!("t_stringliteral_{}", hex::encode(Keccak256::digest(value)))
            }
            Type::Bool => "t_bool".into(),
            Type::FixedBytes(n) => format!("t_bytes{}", n),
            Type::Array(a) => array_rich_identifier(a),
            Type::Struct(s) => format!(
                "t_struct({}){}{}",
                s.name,
                s.id,
                location_suffix(s.location, s.is_pointer)
            ),
            Type::Enum(e) => format!("t_enum({}){}", e.name, e.id),
            Type::Contract(c) => format!(
                "{}({}){}",
                if c.is_super { "t_super" } else { "t_contract" },
                c.name,
                c.id
            ),
            Type::Function(f) => {
                let mut id = format!(
                    "t_function_{}_{}{}returns{}",
                    f.kind.identifier(),
                    f.mutability.keyword(),
                    identifier_list(f.params.iter().map(Some)),
                    identifier_list(f.returns.iter().map(Some)),
                );
                if f.gas_set {
                    id.push_str("gas");
                }
                if f.value_set {
                    id.push_str("value");
                }
                if let Some(bound) = &f.bound {
                    id.push_str("bound_to");
                    id.push_str(&identifier_list([Some(bound)]));
                }
                id
            }
            Type::Mapping { key, value } => {
                format!("t_mapping{}", identifier_list([Some(key), Some(value)]))
            }
            Type::Tuple(components) => {
                format!("t_tuple{}", identifier_list(components.iter().map(Option::as_ref)))
            }
            Type::TypeType(actual) => format!("t_type{}", identifier_list([Some(actual)])),
            Type::Modifier(params) => {
                format!("t_modifier{}", identifier_list(params.iter().map(Some)))
            }
            Type::Magic(kind) => match kind {
                MagicKind::Block => "t_magic_block".into(),
                MagicKind::Message => "t_magic_message".into(),
                MagicKind::Transaction => "t_magic_transaction".into(),
                MagicKind::Abi => "t_magic_abi".into(),
            },
        }
    }

    /// Escaped rich identifier, usable inside routine names.
    pub fn identifier(&self) -> String {
        escape_identifier(&self.rich_identifier())
    }

    /// Human readable name; the long form includes the data location.
    pub fn describe(&self, short: bool) -> String {
        match self {
            Type::Address { payable: true } => "address payable".into(),
            Type::Address { payable: false } => "address".into(),
            Type::Integer(i) => format!("{}int{}", if i.signed { "" } else { "u" }, i.bits),
            Type::IntegerConstant(v) => format!("int_const {}", v),
            Type::StringLiteral(value) => match std::str::from_utf8(value) {
                Ok(s) => format!("literal_string \"{}\"", s),
                Err(e) => format!(
                    "literal_string (contains invalid UTF-8 sequence at position {})",
                    e.valid_up_to()
                ),
            },
            Type::Bool => "bool".into(),
            Type::FixedBytes(n) => format!("bytes{}", n),
            Type::Array(a) => {
                let mut ret = if a.is_string() {
                    "string".to_string()
                } else if a.is_byte_array() {
                    "bytes".to_string()
                } else {
                    let len = a.length.as_ref().map(|l| l.to_string()).unwrap_or_default();
                    format!("{}[{}]", a.base.describe(short), len)
                };
                if !short {
                    ret.push(' ');
                    ret.push_str(reference_part(a.location, a.is_pointer));
                }
                ret
            }
            Type::Struct(s) => {
                if short {
                    format!("struct {}", s.name)
                } else {
                    format!("struct {} {}", s.name, reference_part(s.location, s.is_pointer))
                }
            }
            Type::Enum(e) => format!("enum {}", e.name),
            Type::Contract(c) => {
                format!("contract {}{}", if c.is_super { "super " } else { "" }, c.name)
            }
            Type::Function(f) => {
                let params: Vec<String> = f.params.iter().map(|t| t.describe(short)).collect();
                let mut name = format!("function ({})", params.join(","));
                if f.mutability != super::StateMutability::NonPayable {
                    name.push(' ');
                    name.push_str(f.mutability.keyword());
                }
                if f.kind == super::FunctionKind::External {
                    name.push_str(" external");
                }
                if !f.returns.is_empty() {
                    let returns: Vec<String> =
                        f.returns.iter().map(|t| t.describe(short)).collect();
                    name.push_str(&format!(" returns ({})", returns.join(",")));
                }
                name
            }
            Type::Mapping { key, value } => {
                format!("mapping({} => {})", key.describe(short), value.describe(short))
            }
            Type::Tuple(components) => {
                let parts: Vec<String> = components
                    .iter()
                    .map(|c| c.as_ref().map(|t| t.describe(short)).unwrap_or_default())
                    .collect();
                format!("tuple({})", parts.join(","))
            }
            Type::TypeType(actual) => format!("type({})", actual.describe(short)),
            Type::Modifier(params) => {
                let parts: Vec<String> = params.iter().map(|t| t.describe(short)).collect();
                format!("modifier ({})", parts.join(","))
            }
            Type::Magic(kind) => match kind {
                MagicKind::Block => "block".into(),
                MagicKind::Message => "msg".into(),
                MagicKind::Transaction => "tx".into(),
                MagicKind::Abi => "abi".into(),
            },
        }
    }

    /// Name used in ABI signatures and storage layout reports.
    pub fn canonical_name(&self, reg: &TypeRegistry) -> Result<String, TypeError> {
        Ok(match self {
            Type::Address { .. } => "address".into(),
            Type::Array(a) if a.is_string() => "string".into(),
            Type::Array(a) if a.is_byte_array() => "bytes".into(),
            Type::Array(a) => {
                let len = a.length.as_ref().map(|l| l.to_string()).unwrap_or_default();
                format!("{}[{}]", a.base.canonical_name(reg)?, len)
            }
            Type::Struct(s) => reg.struct_def(s.id)?.canonical_name(),
            Type::Enum(e) => reg.enum_def(e.id)?.canonical_name(),
            Type::Contract(c) => reg.contract(c.id)?.name.clone(),
            Type::Mapping { key, value } => format!(
                "mapping({} => {})",
                key.canonical_name(reg)?,
                value.canonical_name(reg)?
            ),
            other => other.describe(true),
        })
    }
}

fn array_rich_identifier(a: &ArrayType) -> String {
    let mut id = if a.is_string() {
        "t_string".to_string()
    } else if a.is_byte_array() {
        "t_bytes".to_string()
    } else {
        let mut id = format!("t_array{}", identifier_list([Some(&a.base)]));
        match &a.length {
            None => id.push_str("dyn"),
            Some(len) => id.push_str(&len.to_string()),
        }
        id
    };
    id.push_str(&location_suffix(a.location, a.is_pointer));
    id
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}", self.describe(false))
        } else {
            write!(f, "{}", self.describe(true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DefId;

    #[test]
    fn escapes_parentheses_and_commas() {
        let map = Type::mapping(Type::address(), Type::uint256());
        assert_eq!(map.rich_identifier(), "t_mapping(t_address,t_uint256)");
        assert_eq!(map.identifier(), "t_mapping$_t_address_$_t_uint256_$");
    }

    #[test]
    fn array_identifiers_carry_location() {
        let arr = Type::array(DataLocation::Storage, Type::uint(8), Some(3u8.into()));
        assert_eq!(arr.identifier(), "t_array$_t_uint8_$3_storage");
        let dyn_mem = Type::array(DataLocation::Memory, Type::uint256(), None);
        assert_eq!(dyn_mem.identifier(), "t_array$_t_uint256_$dyn_memory_ptr");
        assert_eq!(dyn_mem, dyn_mem.with_location(DataLocation::Memory, false));
        assert_eq!(Type::bytes_memory().identifier(), "t_bytes_memory_ptr");
        assert_eq!(Type::bytes(DataLocation::Memory), Type::bytes_memory());
        assert_eq!(
            Type::string(DataLocation::CallData).identifier(),
            "t_string_calldata_ptr"
        );
        let nested = Type::array(
            DataLocation::Memory,
            Type::array(DataLocation::Storage, Type::uint(8), Some(2u8.into())),
            None,
        );
        assert_eq!(
            nested.identifier(),
            "t_array$_t_array$_t_uint8_$2_memory_ptr_$dyn_memory_ptr"
        );
        let storage_ref = Type::bytes(DataLocation::Storage);
        assert_eq!(storage_ref.identifier(), "t_bytes_storage");
        assert_eq!(
            storage_ref.with_location(DataLocation::Storage, true).identifier(),
            "t_bytes_storage_ptr"
        );
    }

    #[test]
    fn constants_and_literals() {
        assert_eq!(Type::constant(-7).identifier(), "t_rational_minus_7_by_1");
        assert_eq!(Type::constant(42).identifier(), "t_rational_42_by_1");
        assert_eq!(
            Type::string_literal("").identifier(),
            "t_stringliteral_c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn user_types() {
        let s = Type::struct_type(DefId(3), "S", DataLocation::Memory);
        assert_eq!(s.identifier(), "t_struct$_S_$3_memory_ptr");
        assert_eq!(Type::enum_type(DefId(1), "E").identifier(), "t_enum$_E_$1");
        assert_eq!(format!("{:#}", s), "struct S memory");
    }
}
