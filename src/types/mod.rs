//! The type model.
//!
//! [`Type`] is a closed sum type with one variant per category. Values are
//! immutable and structurally compared; they are shared as [`TypeRef`]
//! (`Arc<Type>`). User-defined types (structs, enums, contracts) only carry a
//! [`DefId`] key and are resolved through a [`TypeRegistry`], which is what
//! allows a struct to mention itself without an ownership cycle.
//!
//! # Module Organization
//!
//! - [`registry`]: definitions of structs, enums and contracts, plus memoised member lists
//! - [`ident`]: rich identifiers, escaped identifiers, display and canonical names
//! - [`size`]: storage, memory and call-data size facts
//! - [`convert`]: implicit and explicit conversion rules, common type
//! - [`operator`]: unary and binary operator result types, constant folding
//! - [`derived`]: mobile, interface, encoding and decoding types
//! - [`members`]: member lists per type and scope
//! - [`function`]: function types, external signatures and selectors
//! - [`parse`]: parser for type names such as `mapping(address => uint256)`

mod convert;
mod derived;
mod error;
mod function;
mod ident;
mod members;
mod operator;
mod parse;
mod registry;
mod size;

pub use error::TypeError;
pub use function::{FunctionKind, FunctionType, StateMutability};
pub use operator::{BinaryOperator, UnaryOperator};
pub use parse::{ParseTypeError, TypeParser};
pub use ident::escape_identifier;
pub use registry::{
    ContractDef, ContractSpec, DefId, EnumDef, FunctionDef, StateVariable, StructDef,
    TypeRegistry, Visibility,
};

use num_bigint::{BigInt, BigUint};
use std::sync::Arc;

/// Shared handle to an immutable type.
pub type TypeRef = Arc<Type>;

/// Where a reference type lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataLocation {
    Storage,
    Memory,
    CallData,
}

impl DataLocation {
    /// Keyword used in type names (`storage`, `memory`, `calldata`).
    pub fn keyword(self) -> &'static str {
        match self {
            DataLocation::Storage => "storage",
            DataLocation::Memory => "memory",
            DataLocation::CallData => "calldata",
        }
    }
}

/// Category tag of a [`Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Address,
    Integer,
    IntegerConstant,
    StringLiteral,
    Bool,
    FixedBytes,
    Array,
    Struct,
    Enum,
    Contract,
    Function,
    Mapping,
    Tuple,
    TypeType,
    Modifier,
    Magic,
}

/// Sized integer, `uintN` or `intN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerType {
    pub bits: u16,
    pub signed: bool,
}

impl IntegerType {
    pub fn max_value(&self) -> BigInt {
        if self.signed {
            (BigInt::from(1u8) << (self.bits - 1)) - 1
        } else {
            (BigInt::from(1u8) << self.bits) - 1
        }
    }

    pub fn min_value(&self) -> BigInt {
        if self.signed {
            -(BigInt::from(1u8) << (self.bits - 1))
        } else {
            BigInt::from(0u8)
        }
    }
}

/// Flavour of an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Ordinary,
    Bytes,
    String,
}

/// `T[]`, `T[N]`, `bytes` or `string` in some data location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub location: DataLocation,
    pub is_pointer: bool,
    pub kind: ArrayKind,
    pub base: TypeRef,
    /// `None` for dynamically sized arrays.
    pub length: Option<BigUint>,
}

/// Memory and call-data references are always pointers; only storage
/// distinguishes a pointer from a reference to the data itself.
fn pointer_flag(location: DataLocation, is_pointer: bool) -> bool {
    is_pointer || location != DataLocation::Storage
}

impl ArrayType {
    pub fn is_byte_array(&self) -> bool {
        self.kind != ArrayKind::Ordinary
    }

    pub fn is_string(&self) -> bool {
        self.kind == ArrayKind::String
    }

    pub fn is_dynamically_sized(&self) -> bool {
        self.length.is_none()
    }

    /// Static length, zero for dynamic arrays.
    pub fn static_length(&self) -> BigUint {
        self.length.clone().unwrap_or_default()
    }
}

/// Reference to a struct definition in some data location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub id: DefId,
    pub name: String,
    pub location: DataLocation,
    pub is_pointer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub id: DefId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractType {
    pub id: DefId,
    pub name: String,
    /// `super` inside a contract: the bases without the contract itself.
    pub is_super: bool,
}

/// Globally available objects (`block`, `msg`, `tx`, `abi`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagicKind {
    Block,
    Message,
    Transaction,
    Abi,
}

/// A type of the language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Address { payable: bool },
    Integer(IntegerType),
    /// Integer literal or folded constant expression.
    IntegerConstant(BigInt),
    StringLiteral(Vec<u8>),
    Bool,
    FixedBytes(u8),
    Array(ArrayType),
    Struct(StructType),
    Enum(EnumType),
    Contract(ContractType),
    Function(FunctionType),
    Mapping { key: TypeRef, value: TypeRef },
    /// Components can be absent, e.g. `(, x) = f()`.
    Tuple(Vec<Option<TypeRef>>),
    TypeType(TypeRef),
    Modifier(Vec<TypeRef>),
    Magic(MagicKind),
}

impl Type {
    pub fn uint(bits: u16) -> TypeRef {
        Arc::new(Type::Integer(IntegerType {
            bits,
            signed: false,
        }))
    }

    pub fn int(bits: u16) -> TypeRef {
        Arc::new(Type::Integer(IntegerType { bits, signed: true }))
    }

    pub fn uint256() -> TypeRef {
        Type::uint(256)
    }

    pub fn address() -> TypeRef {
        Arc::new(Type::Address { payable: false })
    }

    pub fn address_payable() -> TypeRef {
        Arc::new(Type::Address { payable: true })
    }

    pub fn boolean() -> TypeRef {
        Arc::new(Type::Bool)
    }

    pub fn fixed_bytes(bytes: u8) -> TypeRef {
        Arc::new(Type::FixedBytes(bytes))
    }

    pub fn constant(value: impl Into<BigInt>) -> TypeRef {
        Arc::new(Type::IntegerConstant(value.into()))
    }

    pub fn string_literal(value: impl Into<Vec<u8>>) -> TypeRef {
        Arc::new(Type::StringLiteral(value.into()))
    }

    pub fn empty_tuple() -> TypeRef {
        Arc::new(Type::Tuple(Vec::new()))
    }

    pub fn tuple(components: Vec<TypeRef>) -> TypeRef {
        Arc::new(Type::Tuple(components.into_iter().map(Some).collect()))
    }

    /// `bytes` in the given location (a storage reference in storage).
    pub fn bytes(location: DataLocation) -> TypeRef {
        Arc::new(Type::Array(ArrayType {
            location,
            is_pointer: pointer_flag(location, false),
            kind: ArrayKind::Bytes,
            base: Type::fixed_bytes(1),
            length: None,
        }))
    }

    /// `string` in the given location (a storage reference in storage).
    pub fn string(location: DataLocation) -> TypeRef {
        Arc::new(Type::Array(ArrayType {
            location,
            is_pointer: pointer_flag(location, false),
            kind: ArrayKind::String,
            base: Type::fixed_bytes(1),
            length: None,
        }))
    }

    pub fn bytes_memory() -> TypeRef {
        Type::bytes(DataLocation::Memory).with_location(DataLocation::Memory, true)
    }

    pub fn string_memory() -> TypeRef {
        Type::string(DataLocation::Memory).with_location(DataLocation::Memory, true)
    }

    /// Ordinary array; reference base types are moved to the same location.
    pub fn array(location: DataLocation, base: TypeRef, length: Option<BigUint>) -> TypeRef {
        Arc::new(Type::Array(ArrayType {
            location,
            is_pointer: pointer_flag(location, false),
            kind: ArrayKind::Ordinary,
            base: base.with_location_if_reference(location),
            length,
        }))
    }

    pub fn mapping(key: TypeRef, value: TypeRef) -> TypeRef {
        Arc::new(Type::Mapping { key, value })
    }

    pub fn struct_type(id: DefId, name: impl Into<String>, location: DataLocation) -> TypeRef {
        Arc::new(Type::Struct(StructType {
            id,
            name: name.into(),
            location,
            is_pointer: pointer_flag(location, false),
        }))
    }

    pub fn enum_type(id: DefId, name: impl Into<String>) -> TypeRef {
        Arc::new(Type::Enum(EnumType {
            id,
            name: name.into(),
        }))
    }

    pub fn contract(id: DefId, name: impl Into<String>) -> TypeRef {
        Arc::new(Type::Contract(ContractType {
            id,
            name: name.into(),
            is_super: false,
        }))
    }

    pub fn category(&self) -> Category {
        match self {
            Type::Address { .. } => Category::Address,
            Type::Integer(_) => Category::Integer,
            Type::IntegerConstant(_) => Category::IntegerConstant,
            Type::StringLiteral(_) => Category::StringLiteral,
            Type::Bool => Category::Bool,
            Type::FixedBytes(_) => Category::FixedBytes,
            Type::Array(_) => Category::Array,
            Type::Struct(_) => Category::Struct,
            Type::Enum(_) => Category::Enum,
            Type::Contract(_) => Category::Contract,
            Type::Function(_) => Category::Function,
            Type::Mapping { .. } => Category::Mapping,
            Type::Tuple(_) => Category::Tuple,
            Type::TypeType(_) => Category::TypeType,
            Type::Modifier(_) => Category::Modifier,
            Type::Magic(_) => Category::Magic,
        }
    }

    /// Values of this type are held on the stack by value.
    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Address { .. }
            | Type::Integer(_)
            | Type::Bool
            | Type::FixedBytes(_)
            | Type::Enum(_)
            | Type::Function(_) => true,
            Type::Contract(c) => !c.is_super,
            _ => false,
        }
    }

    /// Arrays and structs, the types that carry a data location.
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Struct(_))
    }

    pub fn location(&self) -> Option<DataLocation> {
        match self {
            Type::Array(a) => Some(a.location),
            Type::Struct(s) => Some(s.location),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        match self {
            Type::Array(a) => a.is_pointer,
            Type::Struct(s) => s.is_pointer,
            _ => false,
        }
    }

    /// Reference in a location other than storage, or a storage pointer.
    pub fn is_pointer_or_non_storage(&self) -> bool {
        self.is_pointer() || self.location() != Some(DataLocation::Storage)
    }

    /// Copy of a reference type moved to `location`. Array base types are
    /// moved along (as storage references in storage). Other types are
    /// returned unchanged. `is_pointer` only matters in storage.
    pub fn with_location(&self, location: DataLocation, is_pointer: bool) -> TypeRef {
        let is_pointer = pointer_flag(location, is_pointer);
        match self {
            Type::Array(a) => Arc::new(Type::Array(ArrayType {
                location,
                is_pointer,
                kind: a.kind,
                base: a.base.with_location_if_reference(location),
                length: a.length.clone(),
            })),
            Type::Struct(s) => Arc::new(Type::Struct(StructType {
                id: s.id,
                name: s.name.clone(),
                location,
                is_pointer,
            })),
            other => Arc::new(other.clone()),
        }
    }

    pub fn with_location_if_reference(&self, location: DataLocation) -> TypeRef {
        self.with_location(location, false)
    }

    pub fn as_integer(&self) -> Option<IntegerType> {
        match self {
            Type::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            Type::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_dynamically_sized(&self) -> bool {
        match self {
            Type::Array(a) => a.is_dynamically_sized(),
            _ => false,
        }
    }

    /// Mappings and arrays of mappings exist only in storage.
    pub fn can_live_outside_storage(&self) -> bool {
        match self {
            Type::Mapping { .. } | Type::TypeType(_) | Type::Modifier(_) => false,
            Type::Array(a) => a.base.can_live_outside_storage(),
            _ => true,
        }
    }

    /// Storage slots can hold values of this type.
    pub fn can_be_stored(&self) -> bool {
        match self {
            Type::IntegerConstant(_)
            | Type::StringLiteral(_)
            | Type::Tuple(_)
            | Type::TypeType(_)
            | Type::Modifier(_)
            | Type::Magic(_) => false,
            Type::Function(f) => matches!(f.kind, FunctionKind::Internal | FunctionKind::External),
            _ => true,
        }
    }

    /// Value types are stored left aligned in their word (`bytesN`, external functions).
    pub fn left_aligned(&self) -> bool {
        match self {
            Type::FixedBytes(_) => true,
            Type::Function(f) => f.kind == FunctionKind::External,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Type::array(DataLocation::Memory, Type::uint(8), Some(3u8.into()));
        let b = Type::array(DataLocation::Memory, Type::uint(8), Some(3u8.into()));
        assert_eq!(a, b);
        assert_ne!(a, Type::array(DataLocation::Storage, Type::uint(8), Some(3u8.into())));
    }

    #[test]
    fn relocation_moves_nested_references() {
        let inner = Type::array(DataLocation::Storage, Type::uint(8), None);
        let outer = Type::array(DataLocation::Storage, inner, Some(2u8.into()));
        let moved = outer.with_location(DataLocation::Memory, true);
        let base = moved.as_array().map(|a| a.base.clone());
        assert_eq!(
            base.and_then(|b| b.location()),
            Some(DataLocation::Memory)
        );
        assert!(moved.is_pointer());
    }

    #[test]
    fn mappings_stay_in_storage() {
        let map = Type::mapping(Type::address(), Type::uint256());
        assert!(!map.can_live_outside_storage());
        assert!(map.can_be_stored());
        let arr = Type::array(DataLocation::Storage, map, None);
        assert!(!arr.can_live_outside_storage());
    }
}
