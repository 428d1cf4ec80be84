//! Function types, external signatures and selectors.

use sha3::{Digest, Keccak256};

use super::{Type, TypeError, TypeRef, TypeRegistry};

/// State mutability, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

impl StateMutability {
    pub fn keyword(self) -> &'static str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "pure" => Some(StateMutability::Pure),
            "view" => Some(StateMutability::View),
            "nonpayable" => Some(StateMutability::NonPayable),
            "payable" => Some(StateMutability::Payable),
            _ => None,
        }
    }
}

/// How a function value is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Internal,
    External,
    DelegateCall,
    BareCall,
    BareDelegateCall,
    BareStaticCall,
    Creation,
    Send,
    Transfer,
    ArrayPush,
    ArrayPop,
    ByteArrayPush,
    AbiEncode,
    AbiEncodePacked,
    AbiEncodeWithSelector,
    AbiEncodeWithSignature,
    AbiDecode,
    BlockHash,
    GasLeft,
}

impl FunctionKind {
    pub(crate) fn identifier(self) -> &'static str {
        match self {
            FunctionKind::Internal => "internal",
            FunctionKind::External => "external",
            FunctionKind::DelegateCall => "delegatecall",
            FunctionKind::BareCall => "barecall",
            FunctionKind::BareDelegateCall => "baredelegatecall",
            FunctionKind::BareStaticCall => "barestaticcall",
            FunctionKind::Creation => "creation",
            FunctionKind::Send => "send",
            FunctionKind::Transfer => "transfer",
            FunctionKind::ArrayPush => "arraypush",
            FunctionKind::ArrayPop => "arraypop",
            FunctionKind::ByteArrayPush => "bytearraypush",
            FunctionKind::AbiEncode => "abiencode",
            FunctionKind::AbiEncodePacked => "abiencodepacked",
            FunctionKind::AbiEncodeWithSelector => "abiencodewithselector",
            FunctionKind::AbiEncodeWithSignature => "abiencodewithsignature",
            FunctionKind::AbiDecode => "abidecode",
            FunctionKind::BlockHash => "blockhash",
            FunctionKind::GasLeft => "gasleft",
        }
    }
}

/// Type of a function value or declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub kind: FunctionKind,
    pub params: Vec<TypeRef>,
    pub returns: Vec<TypeRef>,
    pub mutability: StateMutability,
    pub gas_set: bool,
    pub value_set: bool,
    /// Type of the first argument when bound with `using ... for`.
    pub bound: Option<TypeRef>,
}

impl FunctionType {
    pub fn new(
        kind: FunctionKind,
        params: Vec<TypeRef>,
        returns: Vec<TypeRef>,
        mutability: StateMutability,
    ) -> Self {
        Self {
            kind,
            params,
            returns,
            mutability,
            gas_set: false,
            value_set: false,
            bound: None,
        }
    }

    pub fn into_type(self) -> TypeRef {
        std::sync::Arc::new(Type::Function(self))
    }

    pub fn is_bare_call(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::BareCall | FunctionKind::BareDelegateCall | FunctionKind::BareStaticCall
        )
    }

    fn equal_excluding_mutability(&self, other: &FunctionType) -> bool {
        self.kind == other.kind
            && self.params == other.params
            && self.returns == other.returns
            && self.gas_set == other.gas_set
            && self.value_set == other.value_set
            && self.bound == other.bound
    }

    /// Payable converts to non-payable and pure to view, never the reverse.
    pub fn is_implicitly_convertible_to(&self, other: &FunctionType) -> bool {
        if !self.equal_excluding_mutability(other) {
            return false;
        }
        let (from, to) = (self.mutability, other.mutability);
        if to == StateMutability::Payable && from != StateMutability::Payable {
            return false;
        }
        if from == StateMutability::Payable && to == StateMutability::NonPayable {
            return true;
        }
        from <= to
    }

    /// `name(type1,type2)` using the canonical names of the interface types.
    pub fn external_signature(
        &self,
        reg: &TypeRegistry,
        name: &str,
        in_library: bool,
    ) -> Result<String, TypeError> {
        let mut params = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let iface = param.interface_type(reg, in_library)?;
            params.push(iface.signature_in_external_function(reg, in_library)?);
        }
        Ok(format!("{}({})", name, params.join(",")))
    }

    /// First four bytes of the keccak256 hash of the external signature.
    pub fn selector(
        &self,
        reg: &TypeRegistry,
        name: &str,
        in_library: bool,
    ) -> Result<[u8; 4], TypeError> {
        let signature = self.external_signature(reg, name, in_library)?;
        let hash = Keccak256::digest(signature.as_bytes());
        let mut selector = [0u8; 4];
        for (dst, src) in selector.iter_mut().zip(hash.iter()) {
            *dst = *src;
        }
        Ok(selector)
    }

    /// Same function with parameters and return values replaced by their
    /// interface types, as seen by an external caller.
    pub fn interface_function_type(
        &self,
        reg: &TypeRegistry,
        in_library: bool,
    ) -> Result<FunctionType, TypeError> {
        let convert = |types: &[TypeRef]| -> Result<Vec<TypeRef>, TypeError> {
            types
                .iter()
                .map(|t| t.interface_type(reg, in_library))
                .collect()
        };
        Ok(FunctionType {
            kind: if in_library {
                FunctionKind::DelegateCall
            } else {
                FunctionKind::External
            },
            params: convert(&self.params)?,
            returns: convert(&self.returns)?,
            mutability: self.mutability,
            gas_set: false,
            value_set: false,
            bound: None,
        })
    }
}

impl Type {
    /// How this type appears in an external function signature.
    pub fn signature_in_external_function(
        &self,
        reg: &TypeRegistry,
        structs_by_name: bool,
    ) -> Result<String, TypeError> {
        match self {
            Type::Array(a) if a.is_byte_array() => self.canonical_name(reg),
            Type::Array(a) => {
                let len = a.length.as_ref().map(|l| l.to_string()).unwrap_or_default();
                Ok(format!(
                    "{}[{}]",
                    a.base.signature_in_external_function(reg, structs_by_name)?,
                    len
                ))
            }
            Type::Struct(_) if structs_by_name => self.canonical_name(reg),
            Type::Struct(_) => {
                let mut parts = Vec::new();
                for member in self.memory_member_types(reg)? {
                    let iface = member.interface_type(reg, false)?;
                    parts.push(iface.signature_in_external_function(reg, false)?);
                }
                Ok(format!("({})", parts.join(",")))
            }
            Type::Enum(_) if structs_by_name => self.canonical_name(reg),
            Type::Enum(_) | Type::Contract(_) => self
                .encoding_type(reg)?
                .signature_in_external_function(reg, structs_by_name),
            Type::Function(f) if f.kind == super::FunctionKind::External => Ok("function".into()),
            _ => self.canonical_name(reg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataLocation;

    #[test]
    fn transfer_selector() {
        let reg = TypeRegistry::new();
        let f = FunctionType::new(
            FunctionKind::Internal,
            vec![Type::address(), Type::uint256()],
            vec![Type::boolean()],
            StateMutability::NonPayable,
        );
        assert_eq!(
            f.external_signature(&reg, "transfer", false).unwrap(),
            "transfer(address,uint256)"
        );
        assert_eq!(f.selector(&reg, "transfer", false).unwrap(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn dynamic_parameters_in_signature() {
        let reg = TypeRegistry::new();
        let f = FunctionType::new(
            FunctionKind::External,
            vec![
                Type::string(DataLocation::Memory),
                Type::array(DataLocation::Memory, Type::uint(8), Some(3u8.into())),
            ],
            vec![],
            StateMutability::View,
        );
        assert_eq!(
            f.external_signature(&reg, "f", false).unwrap(),
            "f(string,uint8[3])"
        );
    }

    #[test]
    fn mutability_conversions() {
        let make = |m| FunctionType::new(FunctionKind::Internal, vec![], vec![], m);
        let pure = make(StateMutability::Pure);
        let view = make(StateMutability::View);
        let payable = make(StateMutability::Payable);
        let nonpayable = make(StateMutability::NonPayable);
        assert!(pure.is_implicitly_convertible_to(&view));
        assert!(!view.is_implicitly_convertible_to(&pure));
        assert!(payable.is_implicitly_convertible_to(&nonpayable));
        assert!(!nonpayable.is_implicitly_convertible_to(&payable));
        assert!(!payable.is_implicitly_convertible_to(&view));
    }
}
