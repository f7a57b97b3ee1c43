//! Fixed-width, wraparound bit-vector values.
//!
//! A [`Bv`] is an unsigned magnitude held reduced modulo `2^width`; no
//! value ever escapes that range. The signed view reinterprets the stored
//! pattern as two's complement. Values are immutable: every operation
//! returns a new one.
//!
//! Semantics worth naming because they are contracts, not accidents:
//! - Every binary operation requires equal widths and fails before any
//!   computation otherwise.
//! - Division and remainder act on the unsigned magnitudes, truncating
//!   toward zero; the signed view is never consulted.
//! - Shift amounts are the **signed** interpretation of the right operand.
//!   `shr` is arithmetic (operates on the signed value of the left
//!   operand); [`Bv::lshr`] is the logical variant on the raw pattern.
//! - Equality compares the unsigned pattern; the `s*`-prefixed orderings
//!   compare the signed view and the `u*`-prefixed ones the unsigned view.

use std::any::Any;
use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use symbex_core::{BackendValue, Result, SymbexError};

/// A fixed-width bit-vector value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bv {
    width: u32,
    bits: BigUint,
}

fn modulus(width: u32) -> BigUint {
    BigUint::one() << width
}

/// Reduce an integer into `[0, 2^width)` with floor semantics, so negative
/// inputs wrap the way two's-complement storage does.
fn reduce(value: &BigInt, width: u32) -> BigUint {
    let m = BigInt::from(modulus(width));
    let mut r = value % &m;
    if r.is_negative() {
        r += &m;
    }
    r.magnitude().clone()
}

impl Bv {
    /// Construct from any integer, reducing modulo `2^width`.
    pub fn new(value: impl Into<BigInt>, width: u32) -> Result<Self> {
        if width == 0 {
            return Err(SymbexError::InvalidWidth);
        }
        let value = value.into();
        Ok(Self {
            width,
            bits: reduce(&value, width),
        })
    }

    fn with_bits(bits: BigUint, width: u32) -> Self {
        let bits = if bits.bits() > u64::from(width) {
            bits % modulus(width)
        } else {
            bits
        };
        Self { width, bits }
    }

    /// The bit count.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The stored unsigned magnitude.
    #[must_use]
    pub fn unsigned(&self) -> &BigUint {
        &self.bits
    }

    /// The two's-complement reinterpretation of the stored pattern:
    /// patterns with the sign bit set are `stored - 2^width`.
    #[must_use]
    pub fn signed(&self) -> BigInt {
        let half = BigUint::one() << (self.width - 1);
        if self.bits >= half {
            BigInt::from(self.bits.clone()) - BigInt::from(modulus(self.width))
        } else {
            BigInt::from(self.bits.clone())
        }
    }

    fn check_width(&self, other: &Bv) -> Result<()> {
        if self.width != other.width {
            return Err(SymbexError::WidthMismatch {
                lhs: self.width,
                rhs: other.width,
            });
        }
        Ok(())
    }

    /// Clamped, validated shift amount from a signed interpretation.
    fn shift_amount(&self, amount: &BigInt) -> Result<u32> {
        if amount.is_negative() {
            return Err(SymbexError::InvalidShift {
                amount: amount.clone(),
            });
        }
        // Anything at or past the width shifts everything out; clamping
        // keeps the arithmetic cheap without changing the result.
        Ok(amount.to_u32().unwrap_or(self.width).min(self.width))
    }

    /// Wrapping addition.
    pub fn add(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        Ok(Self::with_bits(&self.bits + &other.bits, self.width))
    }

    /// Wrapping subtraction.
    pub fn sub(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        let diff = BigInt::from(self.bits.clone()) - BigInt::from(other.bits.clone());
        Ok(Self {
            width: self.width,
            bits: reduce(&diff, self.width),
        })
    }

    /// Wrapping multiplication.
    pub fn mul(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        Ok(Self::with_bits(&self.bits * &other.bits, self.width))
    }

    /// Unsigned division, truncating toward zero.
    pub fn div(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        if other.bits.is_zero() {
            return Err(SymbexError::DivisionByZero);
        }
        Ok(Self::with_bits(&self.bits / &other.bits, self.width))
    }

    /// Unsigned remainder.
    pub fn rem(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        if other.bits.is_zero() {
            return Err(SymbexError::DivisionByZero);
        }
        Ok(Self::with_bits(&self.bits % &other.bits, self.width))
    }

    /// Two's-complement negation.
    #[must_use]
    pub fn neg(&self) -> Bv {
        let v = -self.signed();
        Self {
            width: self.width,
            bits: reduce(&v, self.width),
        }
    }

    /// Bitwise conjunction.
    pub fn and(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        Ok(Self {
            width: self.width,
            bits: &self.bits & &other.bits,
        })
    }

    /// Bitwise disjunction.
    pub fn or(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        Ok(Self {
            width: self.width,
            bits: &self.bits | &other.bits,
        })
    }

    /// Bitwise exclusive or.
    pub fn xor(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        Ok(Self {
            width: self.width,
            bits: &self.bits ^ &other.bits,
        })
    }

    /// Bitwise complement: xor against the all-ones pattern.
    #[must_use]
    pub fn invert(&self) -> Bv {
        Self {
            width: self.width,
            bits: &self.bits ^ (modulus(self.width) - BigUint::one()),
        }
    }

    /// Left shift by the signed interpretation of `other`.
    pub fn shl(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        let n = self.shift_amount(&other.signed())?;
        Ok(Self::with_bits(&self.bits << n, self.width))
    }

    /// Arithmetic (sign-extending) right shift by the signed interpretation
    /// of `other`.
    pub fn shr(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        let n = self.shift_amount(&other.signed())?;
        let v = self.signed() >> n;
        Ok(Self {
            width: self.width,
            bits: reduce(&v, self.width),
        })
    }

    /// Logical (zero-filling) right shift by the signed interpretation of
    /// `other`.
    pub fn lshr(&self, other: &Bv) -> Result<Bv> {
        self.check_width(other)?;
        let n = self.shift_amount(&other.signed())?;
        Ok(Self {
            width: self.width,
            bits: &self.bits >> n,
        })
    }

    /// Pattern equality.
    pub fn eq_(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits == other.bits)
    }

    /// Pattern inequality.
    pub fn ne_(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits != other.bits)
    }

    /// Signed less-than.
    pub fn slt(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.signed() < other.signed())
    }

    /// Signed less-or-equal.
    pub fn sle(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.signed() <= other.signed())
    }

    /// Signed greater-than.
    pub fn sgt(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.signed() > other.signed())
    }

    /// Signed greater-or-equal.
    pub fn sge(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.signed() >= other.signed())
    }

    /// Unsigned less-than.
    pub fn ult(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits < other.bits)
    }

    /// Unsigned less-or-equal.
    pub fn ule(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits <= other.bits)
    }

    /// Unsigned greater-than.
    pub fn ugt(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits > other.bits)
    }

    /// Unsigned greater-or-equal.
    pub fn uge(&self, other: &Bv) -> Result<bool> {
        self.check_width(other)?;
        Ok(self.bits >= other.bits)
    }

    /// Bits `[low, high]` inclusive, as a new value of width
    /// `high - low + 1`.
    pub fn extract(&self, high: u32, low: u32) -> Result<Bv> {
        if high < low || high >= self.width {
            return Err(SymbexError::InvalidExtract {
                high,
                low,
                width: self.width,
            });
        }
        let width = high - low + 1;
        let mask = modulus(width) - BigUint::one();
        Ok(Self {
            width,
            bits: (&self.bits >> low) & mask,
        })
    }

    /// Widen by `extra` bits preserving the unsigned value.
    #[must_use]
    pub fn zero_ext(&self, extra: u32) -> Bv {
        Self {
            width: self.width + extra,
            bits: self.bits.clone(),
        }
    }

    /// Widen by `extra` bits preserving the signed value, replicating the
    /// sign bit into the new high bits.
    #[must_use]
    pub fn sign_ext(&self, extra: u32) -> Bv {
        let width = self.width + extra;
        let v = self.signed();
        Self {
            width,
            bits: reduce(&v, width),
        }
    }

    /// Concatenate values; the first occupies the most significant bits.
    pub fn concat(parts: &[Bv]) -> Result<Bv> {
        let mut bits = BigUint::zero();
        let mut width = 0u32;
        for part in parts {
            bits = (bits << part.width) | &part.bits;
            width += part.width;
        }
        if width == 0 {
            return Err(SymbexError::InvalidWidth);
        }
        Ok(Self { width, bits })
    }

    /// Circular left rotation; the amount is taken modulo the width, so
    /// negative amounts rotate right.
    #[must_use]
    pub fn rotate_left(&self, amount: &BigInt) -> Bv {
        let w = BigInt::from(self.width);
        let mut n = amount % &w;
        if n.is_negative() {
            n += &w;
        }
        let n = n.to_u32().unwrap_or(0);
        if n == 0 {
            return self.clone();
        }
        let mask = modulus(self.width) - BigUint::one();
        let bits = ((&self.bits << n) & mask) | (&self.bits >> (self.width - n));
        Self {
            width: self.width,
            bits,
        }
    }

    /// Circular right rotation; the amount is taken modulo the width.
    #[must_use]
    pub fn rotate_right(&self, amount: &BigInt) -> Bv {
        self.rotate_left(&-amount)
    }
}

impl fmt::Display for Bv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.bits, self.width)
    }
}

impl BackendValue for Bv {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bits(&self) -> Option<u32> {
        Some(self.width)
    }

    fn dyn_eq(&self, other: &dyn BackendValue) -> bool {
        other.as_any().downcast_ref::<Bv>() == Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(value: i64, width: u32) -> Bv {
        Bv::new(value, width).unwrap()
    }

    #[test]
    fn construction_reduces_modulo_width() {
        assert_eq!(bv(256, 8).unsigned(), &BigUint::zero());
        assert_eq!(bv(257, 8), bv(1, 8));
        assert_eq!(bv(-1, 8), bv(255, 8));
        assert_eq!(bv(-256, 8), bv(0, 8));
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(matches!(Bv::new(1, 0), Err(SymbexError::InvalidWidth)));
    }

    #[test]
    fn twos_complement_round_trip() {
        assert_eq!(bv(255, 8).signed(), BigInt::from(-1));
        assert_eq!(bv(128, 8).signed(), BigInt::from(-128));
        assert_eq!(bv(127, 8).signed(), BigInt::from(127));
        assert_eq!(bv(1, 8).signed(), BigInt::from(1));
    }

    #[test]
    fn reference_arithmetic_scenario() {
        let a = bv(1, 8);
        let b = bv(2, 8);
        assert_eq!(a.or(&b).unwrap(), bv(3, 8));
        assert_eq!(a.and(&b).unwrap(), bv(0, 8));
        assert_eq!(a.div(&b).unwrap(), bv(0, 8));
        assert_eq!(b.mul(&b).unwrap(), bv(4, 8));
        assert_eq!(a.signed(), BigInt::from(a.unsigned().clone()));
        assert_eq!(a.add(&bv(8, 8)).unwrap(), bv(9, 8));
    }

    #[test]
    fn width_mismatch_fails_before_compute() {
        let err = bv(1, 8).add(&bv(1, 16));
        assert!(matches!(
            err,
            Err(SymbexError::WidthMismatch { lhs: 8, rhs: 16 })
        ));
    }

    #[test]
    fn division_uses_unsigned_magnitudes() {
        // 0xff / 2 is 127, not -1 / 2.
        assert_eq!(bv(255, 8).div(&bv(2, 8)).unwrap(), bv(127, 8));
        assert!(matches!(
            bv(1, 8).div(&bv(0, 8)),
            Err(SymbexError::DivisionByZero)
        ));
    }

    #[test]
    fn wrapping_behaviour() {
        assert_eq!(bv(255, 8).add(&bv(1, 8)).unwrap(), bv(0, 8));
        assert_eq!(bv(0, 8).sub(&bv(1, 8)).unwrap(), bv(255, 8));
        assert_eq!(bv(16, 8).mul(&bv(16, 8)).unwrap(), bv(0, 8));
    }

    #[test]
    fn invert_is_xor_with_all_ones() {
        assert_eq!(bv(0, 8).invert(), bv(255, 8));
        assert_eq!(bv(0b1010, 4).invert(), bv(0b0101, 4));
    }

    #[test]
    fn neg_is_twos_complement() {
        assert_eq!(bv(1, 8).neg(), bv(255, 8));
        assert_eq!(bv(0, 8).neg(), bv(0, 8));
        assert_eq!(bv(128, 8).neg(), bv(128, 8));
    }

    #[test]
    fn shifts_take_signed_amounts() {
        assert_eq!(bv(1, 8).shl(&bv(3, 8)).unwrap(), bv(8, 8));
        // An amount with the sign bit set is negative, not huge.
        assert!(matches!(
            bv(1, 8).shl(&bv(255, 8)),
            Err(SymbexError::InvalidShift { .. })
        ));
    }

    #[test]
    fn right_shift_is_arithmetic() {
        // 0x80 is -128; -128 >> 1 is -64 = 0xc0.
        assert_eq!(bv(0x80, 8).shr(&bv(1, 8)).unwrap(), bv(0xc0, 8));
        assert_eq!(bv(0x40, 8).shr(&bv(1, 8)).unwrap(), bv(0x20, 8));
    }

    #[test]
    fn logical_shift_is_zero_filling() {
        assert_eq!(bv(0x80, 8).lshr(&bv(1, 8)).unwrap(), bv(0x40, 8));
        assert_eq!(bv(0xff, 8).lshr(&bv(4, 8)).unwrap(), bv(0x0f, 8));
    }

    #[test]
    fn oversized_shift_amounts_clear() {
        assert_eq!(bv(0xff, 8).shl(&bv(8, 8)).unwrap(), bv(0, 8));
        assert_eq!(bv(0x7f, 8).lshr(&bv(8, 8)).unwrap(), bv(0, 8));
        // Arithmetic shift saturates to the sign.
        assert_eq!(bv(0x80, 8).shr(&bv(8, 8)).unwrap(), bv(0xff, 8));
    }

    #[test]
    fn signed_and_unsigned_orderings_diverge() {
        let small = bv(1, 8);
        let big = bv(0xff, 8); // -1 signed
        assert!(big.slt(&small).unwrap());
        assert!(big.ugt(&small).unwrap());
        assert!(small.sgt(&big).unwrap());
        assert!(small.ult(&big).unwrap());
    }

    #[test]
    fn extract_reference_cases() {
        let d = bv(255, 8);
        assert_eq!(d.extract(1, 0).unwrap(), bv(3, 2));
        assert_eq!(d.extract(7, 0).unwrap(), d);
        assert!(matches!(
            d.extract(8, 0),
            Err(SymbexError::InvalidExtract { .. })
        ));
        assert!(matches!(
            d.extract(0, 1),
            Err(SymbexError::InvalidExtract { .. })
        ));
    }

    #[test]
    fn extension_reference_cases() {
        let d = bv(255, 8);
        let s = d.sign_ext(8);
        assert_eq!(s.width(), 16);
        assert_eq!(s.unsigned(), &BigUint::from(0xffffu32));

        let z = d.zero_ext(8);
        assert_eq!(z.width(), 16);
        assert_eq!(z.unsigned(), &BigUint::from(255u32));

        // Widening by zero preserves everything.
        assert_eq!(d.zero_ext(0), d);
    }

    #[test]
    fn concat_reference_cases() {
        let e = bv(0b1010, 4);
        let f = bv(0b11, 2);
        let quad = Bv::concat(&[e.clone(), e.clone(), e.clone(), e.clone()]).unwrap();
        assert_eq!(quad, bv(0b1010_1010_1010_1010, 16));
        let mixed = Bv::concat(&[e, f.clone(), f]).unwrap();
        assert_eq!(mixed, bv(0b1010_1111, 8));
        assert!(matches!(Bv::concat(&[]), Err(SymbexError::InvalidWidth)));
    }

    #[test]
    fn rotations_are_circular() {
        let v = bv(0b1000_0001, 8);
        assert_eq!(v.rotate_left(&BigInt::from(1)), bv(0b0000_0011, 8));
        assert_eq!(v.rotate_right(&BigInt::from(1)), bv(0b1100_0000, 8));
        assert_eq!(v.rotate_left(&BigInt::from(8)), v);
        assert_eq!(v.rotate_left(&BigInt::from(3)).rotate_right(&BigInt::from(3)), v);
        // Negative amounts rotate the other way.
        assert_eq!(v.rotate_left(&BigInt::from(-1)), v.rotate_right(&BigInt::from(1)));
    }

    #[test]
    fn display_shows_hex_and_width() {
        assert_eq!(bv(255, 8).to_string(), "0xff:8");
    }
}
