//! Result types of unary and binary operators, with constant folding.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::fmt;
use std::sync::Arc;

use super::{DataLocation, FunctionKind, Type, TypeRef, TypeRegistry};

/// Folded constants wider than this are rejected.
const MAX_CONSTANT_BITS: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    BitNot,
    Sub,
    Add,
    Inc,
    Dec,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Sar,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOperator {
    pub fn is_compare(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Eq | Ne | Lt | Gt | Le | Ge)
    }

    pub fn is_bit(self) -> bool {
        matches!(self, BinaryOperator::BitOr | BinaryOperator::BitXor | BinaryOperator::BitAnd)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOperator::Shl | BinaryOperator::Sar | BinaryOperator::Shr)
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Shl => "<<",
            Sar => ">>",
            Shr => ">>>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Exp => "**",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Sub => "-",
            UnaryOperator::Add => "+",
            UnaryOperator::Inc => "++",
            UnaryOperator::Dec => "--",
            UnaryOperator::Delete => "delete",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn bounded(value: BigInt) -> Option<TypeRef> {
    (value.bits() <= MAX_CONSTANT_BITS).then(|| Type::constant(value))
}

/// Folds `left op right` on two constants. `None` when the operation is
/// undefined (division by zero, negative exponent, comparison) or the
/// result too wide.
fn fold(op: BinaryOperator, left: &BigInt, right: &BigInt) -> Option<TypeRef> {
    use BinaryOperator::*;
    let value = match op {
        BitOr => left | right,
        BitXor => left ^ right,
        BitAnd => left & right,
        Add => left + right,
        Sub => left - right,
        Mul => left * right,
        Div if right.is_zero() => return None,
        Div => left / right,
        Mod if right.is_zero() => return None,
        Mod => left % right,
        Exp => {
            if right.is_negative() {
                return None;
            }
            let exponent = right.to_u32()?;
            let base_bits = left.bits();
            if base_bits > 1 && base_bits.saturating_mul(u64::from(exponent)) > MAX_CONSTANT_BITS {
                return None;
            }
            num_traits::pow(left.clone(), exponent.to_usize()?)
        }
        Shl => {
            if right.is_negative() {
                return None;
            }
            let amount = right.to_u64().filter(|a| *a <= MAX_CONSTANT_BITS)?;
            left << amount
        }
        Sar => {
            if right.is_negative() {
                return None;
            }
            match right.to_u64() {
                Some(amount) if amount <= MAX_CONSTANT_BITS => left >> amount,
                _ if left.is_negative() => BigInt::from(-1),
                _ => BigInt::zero(),
            }
        }
        Shr | Or | And | Eq | Ne | Lt | Gt | Le | Ge => return None,
    };
    bounded(value)
}

impl Type {
    /// Type of `op x` for `x` of this type, `None` if not applicable.
    pub fn unary_operator_result(&self, op: UnaryOperator) -> Option<TypeRef> {
        if op == UnaryOperator::Delete {
            let deletable = match self {
                Type::Array(_) | Type::Struct(_) => {
                    self.location() != Some(DataLocation::CallData)
                        && !(self.location() == Some(DataLocation::Storage) && self.is_pointer())
                }
                Type::Mapping { .. } => false,
                other => other.is_value_type(),
            };
            return deletable.then(Type::empty_tuple);
        }
        match self {
            Type::Integer(i) => match op {
                UnaryOperator::Sub if !i.signed => None,
                UnaryOperator::Sub
                | UnaryOperator::Inc
                | UnaryOperator::Dec
                | UnaryOperator::BitNot => Some(Arc::new(self.clone())),
                _ => None,
            },
            Type::IntegerConstant(value) => match op {
                UnaryOperator::BitNot => bounded(!value.clone()),
                UnaryOperator::Add => Some(Arc::new(self.clone())),
                UnaryOperator::Sub => bounded(-value.clone()),
                _ => None,
            },
            Type::Bool if op == UnaryOperator::Not => Some(Type::boolean()),
            Type::FixedBytes(_) if op == UnaryOperator::BitNot => {
                Some(Arc::new(self.clone()))
            }
            _ => None,
        }
    }

    /// Type of `self op other`, `None` if the operator is not applicable.
    pub fn binary_operator_result(
        &self,
        reg: &TypeRegistry,
        op: BinaryOperator,
        other: &Type,
    ) -> Option<TypeRef> {
        match self {
            Type::Integer(_) | Type::IntegerConstant(_) if op.is_shift() => {
                if op == BinaryOperator::Shr {
                    return None;
                }
                let amount_ok = match other {
                    Type::Integer(i) => !i.signed,
                    Type::IntegerConstant(v) => !v.is_negative(),
                    _ => false,
                };
                if !amount_ok {
                    return None;
                }
                match (self, other) {
                    (Type::IntegerConstant(l), Type::IntegerConstant(r)) => fold(op, l, r),
                    (Type::IntegerConstant(_), _) => self.mobile_type(),
                    _ => Some(Arc::new(self.clone())),
                }
            }
            Type::Integer(_) | Type::IntegerConstant(_) if op == BinaryOperator::Exp => {
                match (self, other) {
                    (Type::IntegerConstant(l), Type::IntegerConstant(r)) => fold(op, l, r),
                    (_, Type::Integer(i)) if i.signed => None,
                    (_, Type::Integer(_)) | (_, Type::IntegerConstant(_)) => {
                        if let Type::IntegerConstant(r) = other {
                            if r.is_negative() {
                                return None;
                            }
                        }
                        self.mobile_type()
                    }
                    _ => None,
                }
            }
            Type::IntegerConstant(l) => match other {
                // Comparisons are typed on the mobile types of both sides.
                Type::IntegerConstant(_) if op.is_compare() => {
                    self.mobile_type()?;
                    other.mobile_type()?;
                    Type::common_type(reg, self, other).map(|_| Type::boolean())
                }
                Type::IntegerConstant(r) => fold(op, l, r),
                Type::Integer(_) => other.binary_operator_result(reg, op, self),
                _ => None,
            },
            Type::Integer(_) => {
                if op.is_boolean() {
                    return None;
                }
                let common = Type::common_type(reg, self, other)?;
                if op.is_compare() {
                    Some(Type::boolean())
                } else {
                    Some(common)
                }
            }
            Type::FixedBytes(_) if op.is_shift() => {
                let amount_ok = match other {
                    Type::Integer(i) => !i.signed,
                    Type::IntegerConstant(v) => !v.is_negative(),
                    _ => false,
                };
                (amount_ok && op != BinaryOperator::Shr).then(|| Arc::new(self.clone()))
            }
            Type::FixedBytes(_) => {
                let common = Type::common_type(reg, self, other)?;
                if !matches!(common.as_ref(), Type::FixedBytes(_)) {
                    return None;
                }
                if op.is_compare() {
                    Some(Type::boolean())
                } else if op.is_bit() {
                    Some(common)
                } else {
                    None
                }
            }
            Type::Address { .. } => {
                if !op.is_compare() {
                    return None;
                }
                Type::common_type(reg, self, other).map(|_| Type::boolean())
            }
            Type::Bool => {
                let applicable = matches!(
                    op,
                    BinaryOperator::Eq | BinaryOperator::Ne | BinaryOperator::And | BinaryOperator::Or
                );
                (applicable && *other == Type::Bool).then(Type::boolean)
            }
            Type::Function(f) => {
                let applicable = matches!(op, BinaryOperator::Eq | BinaryOperator::Ne)
                    && f.kind == FunctionKind::Internal
                    && matches!(other, Type::Function(g) if g.kind == FunctionKind::Internal);
                applicable.then(Type::boolean)
            }
            Type::Enum(_) => {
                if !op.is_compare() {
                    return None;
                }
                Type::common_type(reg, self, other).map(|_| Type::boolean())
            }
            Type::Contract(c) if !c.is_super => {
                if !matches!(op, BinaryOperator::Eq | BinaryOperator::Ne) {
                    return None;
                }
                Type::common_type(reg, self, other).map(|_| Type::boolean())
            }
            _ => None,
        }
    }
}
