//! 256-bit machine words.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use once_cell::sync::Lazy;

static MODULUS: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 256u32);
static SIGN_BIT: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 255u32);

/// An unsigned 256-bit word; arithmetic wraps modulo 2^256.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Word(BigUint);

impl Word {
    pub fn zero() -> Self {
        Word(BigUint::zero())
    }

    pub fn one() -> Self {
        Word(BigUint::one())
    }

    /// Reduces `value` modulo 2^256.
    pub fn new(value: BigUint) -> Self {
        if value < *MODULUS {
            Word(value)
        } else {
            Word(value % &*MODULUS)
        }
    }

    /// Two's complement of a signed value.
    pub fn from_signed(value: &BigInt) -> Self {
        match value.sign() {
            Sign::Minus => {
                let magnitude = Word::new(value.magnitude().clone());
                Word::zero().sub(&magnitude)
            }
            _ => Word::new(value.magnitude().clone()),
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value { Word::one() } else { Word::zero() }
    }

    /// Big-endian, left padded with zeros if shorter than 32 bytes.
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        Word::new(BigUint::from_bytes_be(bytes))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let digits = self.0.to_bytes_be();
        let start = 32usize.saturating_sub(digits.len());
        if let Some(slot) = out.get_mut(start..) {
            slot.copy_from_slice(digits.get(..slot.len()).unwrap_or_default());
        }
        out
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn into_value(self) -> BigUint {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.0.to_usize()
    }

    pub fn is_negative(&self) -> bool {
        self.0 >= *SIGN_BIT
    }

    /// Value interpreted as two's complement.
    pub fn to_signed(&self) -> BigInt {
        if self.is_negative() {
            BigInt::from(self.0.clone()) - BigInt::from(MODULUS.clone())
        } else {
            BigInt::from(self.0.clone())
        }
    }

    pub fn add(&self, other: &Word) -> Word {
        Word::new(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &Word) -> Word {
        if self.0 >= other.0 {
            Word(&self.0 - &other.0)
        } else {
            Word(&*MODULUS - &other.0 + &self.0)
        }
    }

    pub fn mul(&self, other: &Word) -> Word {
        Word::new(&self.0 * &other.0)
    }

    /// Division by zero yields zero.
    pub fn div(&self, other: &Word) -> Word {
        if other.is_zero() {
            Word::zero()
        } else {
            Word(&self.0 / &other.0)
        }
    }

    pub fn rem(&self, other: &Word) -> Word {
        if other.is_zero() {
            Word::zero()
        } else {
            Word(&self.0 % &other.0)
        }
    }

    pub fn and(&self, other: &Word) -> Word {
        Word(&self.0 & &other.0)
    }

    pub fn or(&self, other: &Word) -> Word {
        Word(&self.0 | &other.0)
    }

    pub fn xor(&self, other: &Word) -> Word {
        Word(&self.0 ^ &other.0)
    }

    pub fn not(&self) -> Word {
        Word(&*MODULUS - 1u8 - &self.0)
    }

    /// `self << shift`, zero for shifts of 256 and more.
    pub fn shl(&self, shift: &Word) -> Word {
        match shift.to_usize() {
            Some(s) if s < 256 => Word::new(&self.0 << s),
            _ => Word::zero(),
        }
    }

    pub fn shr(&self, shift: &Word) -> Word {
        match shift.to_usize() {
            Some(s) if s < 256 => Word(&self.0 >> s),
            _ => Word::zero(),
        }
    }

    /// Arithmetic shift right.
    pub fn sar(&self, shift: &Word) -> Word {
        let s = shift.to_usize().unwrap_or(usize::MAX).min(256);
        Word::from_signed(&(self.to_signed() >> s))
    }

    pub fn slt(&self, other: &Word) -> bool {
        self.to_signed() < other.to_signed()
    }

    /// Sign extends from byte `byte` (counted from the least significant).
    pub fn signextend(&self, byte: &Word) -> Word {
        match byte.to_usize() {
            Some(b) if b < 31 => {
                let bits = 8 * (b + 1);
                let low = &self.0 & ((BigUint::one() << bits) - 1u8);
                if low.bit((bits - 1) as u64) {
                    let high = &*MODULUS - (BigUint::one() << bits);
                    Word(low | high)
                } else {
                    Word(low)
                }
            }
            _ => self.clone(),
        }
    }

    /// Byte `index` counted from the most significant.
    pub fn byte(&self, index: &Word) -> Word {
        match index.to_usize() {
            Some(i) if i < 32 => {
                let bytes = self.to_be_bytes();
                Word(BigUint::from(bytes.get(i).copied().unwrap_or(0)))
            }
            _ => Word::zero(),
        }
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word(BigUint::from(value))
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Word(BigUint::from(value))
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        Word::from_bool(value)
    }
}

impl From<BigUint> for Word {
    fn from(value: BigUint) -> Self {
        Word::new(value)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word(0x{:x})", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_arithmetic() {
        let max = Word::zero().not();
        assert_eq!(max.add(&Word::one()), Word::zero());
        assert_eq!(Word::zero().sub(&Word::one()), max);
        assert_eq!(Word::from(7u64).div(&Word::zero()), Word::zero());
    }

    #[test]
    fn signed_operations() {
        let minus_one = Word::from_signed(&BigInt::from(-1));
        assert!(minus_one.is_negative());
        assert!(minus_one.slt(&Word::zero()));
        assert_eq!(minus_one.sar(&Word::from(4u64)), minus_one);
        assert_eq!(Word::from(0x80u64).signextend(&Word::zero()).to_signed(), BigInt::from(-128));
        assert_eq!(Word::from(0x7fu64).signextend(&Word::zero()), Word::from(0x7fu64));
    }

    #[test]
    fn bytes_and_shifts() {
        let w = Word::from(0xabcdu64);
        assert_eq!(w.byte(&Word::from(31u64)), Word::from(0xcdu64));
        assert_eq!(w.byte(&Word::from(32u64)), Word::zero());
        assert_eq!(w.shl(&Word::from(256u64)), Word::zero());
        assert_eq!(Word::from_be_slice(&w.to_be_bytes()), w);
        assert_eq!(w.to_be_bytes().get(30..), Some(&[0xab, 0xcd][..]));
    }
}
