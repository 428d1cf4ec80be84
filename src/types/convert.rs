//! Implicit and explicit conversion rules, per pair of categories.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use super::{ArrayType, DataLocation, FunctionKind, StructType, Type, TypeRef, TypeRegistry};

impl Type {
    /// Whether a value of this type may be used where `to` is expected.
    pub fn is_implicitly_convertible_to(&self, reg: &TypeRegistry, to: &Type) -> bool {
        match (self, to) {
            (Type::Address { payable }, Type::Address { payable: target }) => {
                !*target || *payable
            }
            (Type::Integer(from), Type::Integer(target)) => {
                if target.bits < from.bits {
                    false
                } else if from.signed {
                    target.signed
                } else {
                    !target.signed || target.bits > from.bits
                }
            }
            (Type::IntegerConstant(value), Type::Integer(target)) => {
                *value >= target.min_value() && *value <= target.max_value()
            }
            (Type::IntegerConstant(value), Type::FixedBytes(_)) => value.is_zero(),
            (Type::StringLiteral(value), Type::FixedBytes(n)) => usize::from(*n) >= value.len(),
            (Type::StringLiteral(value), Type::Array(target)) => {
                target.location != DataLocation::CallData
                    && target.is_byte_array()
                    && !(target.location == DataLocation::Storage && target.is_pointer)
                    && !(target.is_string() && std::str::from_utf8(value).is_err())
            }
            (Type::FixedBytes(from), Type::FixedBytes(target)) => target >= from,
            (Type::Contract(from), Type::Contract(target)) => {
                if from == target {
                    return true;
                }
                let Ok(def) = reg.contract(from.id) else {
                    return false;
                };
                if from.is_super && def.linearized.len() <= 1 {
                    return false;
                }
                let skip = usize::from(from.is_super);
                !target.is_super && def.linearized.iter().skip(skip).any(|b| *b == target.id)
            }
            (Type::Array(from), Type::Array(target)) => array_convertible(reg, from, target),
            (Type::Struct(from), Type::Struct(target)) => struct_convertible(from, target),
            (Type::Function(from), Type::Function(target)) => {
                from.is_implicitly_convertible_to(target)
            }
            (Type::Tuple(from), Type::Tuple(target)) => {
                from.len() == target.len()
                    && from.iter().zip(target).all(|(s, t)| match (s, t) {
                        (Some(s), Some(t)) => s.is_implicitly_convertible_to(reg, t),
                        (None, Some(_)) => false,
                        (_, None) => true,
                    })
            }
            (Type::IntegerConstant(_) | Type::StringLiteral(_), _) => false,
            _ => self == to,
        }
    }

    /// Whether a (possibly lossy) cast from this type to `to` is allowed.
    pub fn is_explicitly_convertible_to(&self, reg: &TypeRegistry, to: &Type) -> bool {
        if self.is_implicitly_convertible_to(reg, to) {
            return true;
        }
        match (self, to) {
            (Type::Address { .. }, Type::Address { .. }) => true,
            (Type::Address { payable }, Type::Contract(c)) => {
                *payable || !contract_is_payable(reg, c.id)
            }
            (Type::Address { .. }, Type::Integer(i)) => i.bits == 160,
            (Type::Address { .. }, Type::FixedBytes(n)) => *n == 20,
            (Type::Integer(_), Type::Integer(_))
            | (Type::Integer(_), Type::Address { .. })
            | (Type::Integer(_), Type::Contract(_))
            | (Type::Integer(_), Type::Enum(_)) => true,
            (Type::Integer(i), Type::FixedBytes(n)) => i.bits == u16::from(*n) * 8,
            (Type::IntegerConstant(_), Type::FixedBytes(_) | Type::Integer(_)) => false,
            (Type::IntegerConstant(value), Type::Address { payable }) => {
                value.is_zero()
                    || (!*payable
                        && !value.is_negative()
                        && integer_type_for(value).is_some_and(|t| {
                            t.as_integer().is_some_and(|i| i.bits <= 160)
                        }))
            }
            (Type::IntegerConstant(value), Type::Enum(e)) => {
                let count = reg.enum_def(e.id).map(|d| d.values.len()).unwrap_or(0);
                !value.is_negative() && *value < BigInt::from(count)
                    && self
                        .mobile_type()
                        .is_some_and(|m| m.is_explicitly_convertible_to(reg, to))
            }
            (Type::IntegerConstant(_), _) => self
                .mobile_type()
                .is_some_and(|m| m.is_explicitly_convertible_to(reg, to)),
            (Type::FixedBytes(n), Type::Integer(i)) => u16::from(*n) * 8 == i.bits,
            (Type::FixedBytes(n), Type::Address { .. }) => *n == 20,
            (Type::FixedBytes(_), Type::FixedBytes(_)) => true,
            (Type::Contract(c), Type::Address { payable }) => {
                !c.is_super && (!*payable || contract_is_payable(reg, c.id))
            }
            (Type::Enum(_), Type::Integer(_)) => true,
            (Type::Array(from), Type::Array(target)) => {
                target.location == from.location && from.is_byte_array() && target.is_byte_array()
            }
            (Type::Function(f), Type::Address { payable: false }) => {
                f.kind == FunctionKind::External
            }
            _ => false,
        }
    }

    /// Type both operands convert to, preferring the mobile type of `a`.
    pub fn common_type(reg: &TypeRegistry, a: &Type, b: &Type) -> Option<TypeRef> {
        if let Some(mobile) = a.mobile_type() {
            if b.is_implicitly_convertible_to(reg, &mobile) {
                return Some(mobile);
            }
        }
        if let Some(mobile) = b.mobile_type() {
            if a.is_implicitly_convertible_to(reg, &mobile) {
                return Some(mobile);
            }
        }
        None
    }
}

fn contract_is_payable(reg: &TypeRegistry, id: super::DefId) -> bool {
    reg.contract(id).map(|c| c.payable_fallback).unwrap_or(false)
}

/// Smallest integer type that can hold a constant.
pub(crate) fn integer_type_for(value: &BigInt) -> Option<TypeRef> {
    let negative = value.is_negative();
    let magnitude = if negative {
        ((-value) - 1u8) << 1u8
    } else {
        value.clone()
    };
    if magnitude.bits() > 256 {
        return None;
    }
    let bytes = magnitude.bits().div_ceil(8).max(1);
    let bits = (bytes * 8) as u16;
    Some(if negative { Type::int(bits) } else { Type::uint(bits) })
}

fn array_convertible(reg: &TypeRegistry, from: &ArrayType, target: &ArrayType) -> bool {
    if target.is_byte_array() != from.is_byte_array() || target.is_string() != from.is_string() {
        return false;
    }
    if target.location == DataLocation::Storage
        && from.location != DataLocation::Storage
        && target.is_pointer
    {
        return false;
    }
    if target.location == DataLocation::CallData && from.location != target.location {
        return false;
    }
    if target.location == DataLocation::Storage && !target.is_pointer {
        if !from.base.is_implicitly_convertible_to(reg, &target.base) {
            return false;
        }
        match (&from.length, &target.length) {
            (_, None) => true,
            (Some(len), Some(target_len)) => target_len >= len,
            (None, Some(_)) => false,
        }
    } else {
        from.base.with_location_if_reference(from.location)
            == target.base.with_location_if_reference(from.location)
            && from.length == target.length
    }
}

fn struct_convertible(from: &StructType, target: &StructType) -> bool {
    if target.location == DataLocation::Storage
        && from.location != DataLocation::Storage
        && target.is_pointer
    {
        return false;
    }
    if target.location == DataLocation::CallData && from.location != target.location {
        return false;
    }
    from.id == target.id
}
