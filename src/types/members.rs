//! Member lookup (`x.length`, `msg.sender`, struct fields, contract functions).

use std::rc::Rc;

use super::{
    DataLocation, DefId, FunctionKind, FunctionType, MagicKind, StateMutability, Type, TypeError,
    TypeRef, TypeRegistry,
};
use crate::layout::{Declaration, Member, MemberList};

fn function(kind: FunctionKind, params: Vec<TypeRef>, returns: Vec<TypeRef>, m: StateMutability) -> TypeRef {
    FunctionType::new(kind, params, returns, m).into_type()
}

impl Type {
    /// Declared member types of a struct that exist outside of storage.
    pub fn memory_member_types(&self, reg: &TypeRegistry) -> Result<Vec<TypeRef>, TypeError> {
        match self {
            Type::Struct(s) => Ok(reg
                .struct_def(s.id)?
                .members()
                .iter()
                .filter(|(_, ty)| ty.can_live_outside_storage())
                .map(|(_, ty)| ty.clone())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Byte offset of a struct member in the memory representation.
    pub fn memory_offset_of_member(&self, reg: &TypeRegistry, name: &str) -> Result<Option<u64>, TypeError> {
        let mut offset = 0;
        for member in self.members(reg, None)?.iter() {
            if member.name == name {
                return Ok(Some(offset));
            }
            offset += member.ty.memory_head_size(reg)?;
        }
        Ok(None)
    }

    /// Byte offset of a struct member in the call-data head of the struct.
    pub fn calldata_offset_of_member(&self, reg: &TypeRegistry, name: &str) -> Result<Option<u64>, TypeError> {
        let mut offset = 0;
        for member in self.members(reg, None)?.iter() {
            if member.name == name {
                return Ok(Some(offset));
            }
            offset += member.ty.calldata_head_size(reg)?;
        }
        Ok(None)
    }

    /// Members accessible on values of this type from within `scope`.
    ///
    /// Lists are computed once per type identifier and scope.
    pub fn members(&self, reg: &TypeRegistry, scope: Option<DefId>) -> Result<Rc<MemberList>, TypeError> {
        let key = (self.rich_identifier(), scope);
        if let Some(list) = reg.cached_members(&key) {
            return Ok(list);
        }
        let list = Rc::new(MemberList::new(self.native_members(reg, scope)?));
        Ok(reg.cache_members(key, list))
    }

    fn native_members(&self, reg: &TypeRegistry, scope: Option<DefId>) -> Result<Vec<Member>, TypeError> {
        use StateMutability::*;
        let bytes_memory = Type::bytes_memory();
        Ok(match self {
            Type::Address { payable } => {
                let mut members = vec![Member::new("balance", Type::uint256())];
                if *payable {
                    members.push(Member::new(
                        "transfer",
                        function(FunctionKind::Transfer, vec![Type::uint256()], vec![], NonPayable),
                    ));
                    members.push(Member::new(
                        "send",
                        function(FunctionKind::Send, vec![Type::uint256()], vec![Type::boolean()], NonPayable),
                    ));
                }
                let returns = vec![Type::boolean(), bytes_memory.clone()];
                members.push(Member::new(
                    "call",
                    function(FunctionKind::BareCall, vec![bytes_memory.clone()], returns.clone(), Payable),
                ));
                members.push(Member::new(
                    "delegatecall",
                    function(FunctionKind::BareDelegateCall, vec![bytes_memory.clone()], returns.clone(), NonPayable),
                ));
                members.push(Member::new(
                    "staticcall",
                    function(FunctionKind::BareStaticCall, vec![bytes_memory], returns, View),
                ));
                members
            }
            Type::FixedBytes(_) => vec![Member::new("length", Type::uint(8))],
            Type::Array(a) if a.is_string() => Vec::new(),
            Type::Array(a) => {
                let mut members = vec![Member::new("length", Type::uint256())];
                if a.is_dynamically_sized() && a.location == DataLocation::Storage {
                    let kind = if a.is_byte_array() {
                        FunctionKind::ByteArrayPush
                    } else {
                        FunctionKind::ArrayPush
                    };
                    members.push(Member::new(
                        "push",
                        function(kind, vec![a.base.clone()], vec![Type::uint256()], NonPayable),
                    ));
                    members.push(Member::new(
                        "pop",
                        function(FunctionKind::ArrayPop, vec![], vec![], NonPayable),
                    ));
                }
                members
            }
            Type::Struct(s) => reg
                .struct_def(s.id)?
                .members()
                .iter()
                .enumerate()
                .filter(|(_, (_, ty))| {
                    s.location == DataLocation::Storage || ty.can_live_outside_storage()
                })
                .map(|(index, (name, ty))| {
                    Member::declared(
                        name,
                        ty.with_location_if_reference(s.location),
                        Declaration { owner: s.id, index },
                    )
                })
                .collect(),
            Type::Contract(c) => {
                let def = reg.contract(c.id)?;
                let (kind, skip) = if c.is_super {
                    (FunctionKind::Internal, 1)
                } else {
                    (FunctionKind::External, 0)
                };
                let mut members: Vec<Member> = Vec::new();
                for base in def.linearized.iter().skip(skip) {
                    for (index, f) in reg.contract(*base)?.functions.iter().enumerate() {
                        if !c.is_super && !f.is_externally_visible() {
                            continue;
                        }
                        let ty = f.function_type(kind).into_type();
                        if members.iter().any(|m| m.name == f.name && m.ty == ty) {
                            continue;
                        }
                        members.push(Member::declared(&f.name, ty, Declaration { owner: *base, index }));
                    }
                }
                members
            }
            Type::TypeType(actual) => match actual.as_ref() {
                Type::Enum(e) => reg
                    .enum_def(e.id)?
                    .values
                    .iter()
                    .enumerate()
                    .map(|(index, name)| {
                        Member::declared(name, actual.clone(), Declaration { owner: e.id, index })
                    })
                    .collect(),
                Type::Contract(c) => {
                    let def = reg.contract(c.id)?;
                    let kind = if def.is_library {
                        Some(FunctionKind::DelegateCall)
                    } else if let Some(scope) = scope {
                        reg.contract(scope)?
                            .linearized
                            .contains(&c.id)
                            .then_some(FunctionKind::Internal)
                    } else {
                        None
                    };
                    match kind {
                        Some(kind) => def
                            .functions
                            .iter()
                            .enumerate()
                            .filter(|(_, f)| {
                                kind == FunctionKind::Internal || f.is_externally_visible()
                            })
                            .map(|(index, f)| {
                                Member::declared(
                                    &f.name,
                                    f.function_type(kind).into_type(),
                                    Declaration { owner: c.id, index },
                                )
                            })
                            .collect(),
                        None => Vec::new(),
                    }
                }
                _ => Vec::new(),
            },
            Type::Magic(kind) => magic_members(*kind),
            _ => Vec::new(),
        })
    }
}

fn magic_members(kind: MagicKind) -> Vec<Member> {
    use StateMutability::*;
    match kind {
        MagicKind::Block => vec![
            Member::new("coinbase", Type::address_payable()),
            Member::new("timestamp", Type::uint256()),
            Member::new(
                "blockhash",
                function(FunctionKind::BlockHash, vec![Type::uint256()], vec![Type::fixed_bytes(32)], View),
            ),
            Member::new("difficulty", Type::uint256()),
            Member::new("number", Type::uint256()),
            Member::new("gaslimit", Type::uint256()),
        ],
        MagicKind::Message => vec![
            Member::new("sender", Type::address_payable()),
            Member::new("gas", Type::uint256()),
            Member::new("value", Type::uint256()),
            Member::new(
                "data",
                Type::bytes(DataLocation::CallData).with_location(DataLocation::CallData, true),
            ),
            Member::new("sig", Type::fixed_bytes(4)),
        ],
        MagicKind::Transaction => vec![
            Member::new("origin", Type::address_payable()),
            Member::new("gasprice", Type::uint256()),
        ],
        MagicKind::Abi => {
            let encoded = vec![Type::bytes_memory()];
            vec![
                Member::new("encode", function(FunctionKind::AbiEncode, vec![], encoded.clone(), Pure)),
                Member::new(
                    "encodePacked",
                    function(FunctionKind::AbiEncodePacked, vec![], encoded.clone(), Pure),
                ),
                Member::new(
                    "encodeWithSelector",
                    function(FunctionKind::AbiEncodeWithSelector, vec![Type::fixed_bytes(4)], encoded.clone(), Pure),
                ),
                Member::new(
                    "encodeWithSignature",
                    function(FunctionKind::AbiEncodeWithSignature, vec![Type::string_memory()], encoded, Pure),
                ),
                Member::new(
                    "decode",
                    function(FunctionKind::AbiDecode, vec![Type::bytes_memory()], vec![], Pure),
                ),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContractSpec, FunctionDef, Visibility};

    #[test]
    fn memory_structs_skip_mappings() {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_struct("S", None).unwrap();
        reg.define_struct(
            id,
            vec![
                ("a".into(), Type::uint(128)),
                ("m".into(), Type::mapping(Type::uint256(), Type::uint256())),
                ("b".into(), Type::bytes(DataLocation::Storage)),
            ],
        )
        .unwrap();
        let storage = Type::struct_type(id, "S", DataLocation::Storage);
        let memory = storage.with_location(DataLocation::Memory, true);
        assert_eq!(storage.members(&reg, None).unwrap().len(), 3);
        let mem_members = memory.members(&reg, None).unwrap();
        let names: Vec<&str> = mem_members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            mem_members.get("b").map(|m| m.ty.location()),
            Some(Some(DataLocation::Memory))
        );
        assert_eq!(memory.memory_offset_of_member(&reg, "b").unwrap(), Some(32));
        assert_eq!(memory.memory_data_size(&reg).unwrap(), 64);
    }

    #[test]
    fn members_are_memoised() {
        let reg = TypeRegistry::new();
        let ty = Type::array(DataLocation::Storage, Type::uint256(), None);
        let first = ty.members(&reg, None).unwrap();
        let second = ty.members(&reg, None).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.get("push").is_some());
        let memory = Type::array(DataLocation::Memory, Type::uint256(), None);
        assert!(memory.members(&reg, None).unwrap().get("push").is_none());
    }

    #[test]
    fn library_functions_are_delegatecalls() {
        let mut reg = TypeRegistry::new();
        let lib = reg.declare_contract("L").unwrap();
        reg.define_contract(
            lib,
            ContractSpec {
                is_library: true,
                functions: vec![FunctionDef {
                    name: "f".into(),
                    params: vec![Type::uint256()],
                    returns: vec![],
                    mutability: StateMutability::Pure,
                    visibility: Visibility::Public,
                }],
                ..ContractSpec::default()
            },
        )
        .unwrap();
        let ty = std::sync::Arc::new(Type::TypeType(Type::contract(lib, "L")));
        let members = ty.members(&reg, None).unwrap();
        let f = members.get("f").and_then(|m| m.ty.as_function().map(|f| f.kind));
        assert_eq!(f, Some(FunctionKind::DelegateCall));
    }
}
