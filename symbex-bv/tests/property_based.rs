//! Property-based tests for the bit-vector domain and the expression layer.

use num_bigint::{BigInt, BigUint};
use num_traits::One;
use proptest::prelude::*;

use symbex_bv::{default_manager, Bv};

/// Strategy for widths that keep the arithmetic observable.
fn width_strategy() -> impl Strategy<Value = u32> {
    1u32..=64
}

fn modulus(width: u32) -> BigInt {
    BigInt::one() << width
}

fn floor_mod(value: i64, width: u32) -> BigUint {
    let m = modulus(width);
    let r = ((BigInt::from(value) % &m) + &m) % &m;
    r.magnitude().clone()
}

proptest! {
    /// Construction always reduces into [0, 2^width).
    #[test]
    fn construction_reduces(value in any::<i64>(), width in width_strategy()) {
        let v = Bv::new(value, width).unwrap();
        prop_assert_eq!(v.unsigned(), &floor_mod(value, width));
        prop_assert!(BigInt::from(v.unsigned().clone()) < modulus(width));
    }

    /// Full extraction is the identity.
    #[test]
    fn full_extract_identity(value in any::<i64>(), width in width_strategy()) {
        let v = Bv::new(value, width).unwrap();
        prop_assert_eq!(v.extract(width - 1, 0).unwrap(), v);
    }

    /// Concatenation places the first operand in the high bits.
    #[test]
    fn concat_value_formula(
        a in any::<u32>(),
        b in any::<u32>(),
        wa in 1u32..=32,
        wb in 1u32..=32,
    ) {
        let va = Bv::new(a, wa).unwrap();
        let vb = Bv::new(b, wb).unwrap();
        let cat = Bv::concat(&[va.clone(), vb.clone()]).unwrap();

        prop_assert_eq!(cat.width(), wa + wb);
        let expected = (va.unsigned() << wb) | vb.unsigned();
        prop_assert_eq!(cat.unsigned(), &expected);
    }

    /// The signed view follows the standard two's-complement rule and
    /// round-trips through construction.
    #[test]
    fn signed_round_trip(value in any::<i64>(), width in width_strategy()) {
        let v = Bv::new(value, width).unwrap();
        let signed = v.signed();

        let half = BigInt::one() << (width - 1);
        if BigInt::from(v.unsigned().clone()) >= half {
            prop_assert_eq!(&signed, &(BigInt::from(v.unsigned().clone()) - modulus(width)));
        } else {
            prop_assert_eq!(&signed, &BigInt::from(v.unsigned().clone()));
        }

        prop_assert_eq!(Bv::new(signed, width).unwrap(), v);
    }

    /// Sign extension preserves the signed value; zero extension the
    /// unsigned one.
    #[test]
    fn extensions_preserve_their_view(
        value in any::<i64>(),
        width in width_strategy(),
        extra in 0u32..=32,
    ) {
        let v = Bv::new(value, width).unwrap();
        prop_assert_eq!(v.sign_ext(extra).signed(), v.signed());
        let zero_ext = v.zero_ext(extra);
        prop_assert_eq!(zero_ext.unsigned(), v.unsigned());
    }

    /// Rotation by the width is the identity, and rotations invert each
    /// other.
    #[test]
    fn rotation_identities(
        value in any::<i64>(),
        width in width_strategy(),
        amount in 0i64..=128,
    ) {
        let v = Bv::new(value, width).unwrap();
        let n = BigInt::from(amount);
        prop_assert_eq!(v.rotate_left(&BigInt::from(width)), v.clone());
        prop_assert_eq!(v.rotate_left(&n).rotate_right(&n), v);
    }

    /// Chopping an expression and concatenating the slices in the same
    /// order reconstructs the value exactly.
    #[test]
    fn chop_concat_round_trip(value in any::<u32>(), chunk in prop::sample::select(vec![1u32, 2, 4, 8, 16, 32])) {
        let mgr = default_manager();
        let v = mgr.mk_bvv(value, 32).unwrap();

        let slices = v.chop(chunk).unwrap();
        prop_assert_eq!(slices.len() as u32, 32 / chunk);

        let rebuilt = mgr.mk_concat(&slices).unwrap();
        let rebuilt = rebuilt.realize().unwrap();
        prop_assert_eq!(
            rebuilt.downcast_ref::<Bv>(),
            Some(&Bv::new(value, 32).unwrap())
        );
    }

    /// Reversing twice is the identity.
    #[test]
    fn double_reverse_identity(value in any::<u32>()) {
        let mgr = default_manager();
        let v = mgr.mk_bvv(value, 32).unwrap();
        let twice = v.reversed(8).unwrap().reversed(8).unwrap();
        let realized = twice.realize().unwrap();
        prop_assert_eq!(
            realized.downcast_ref::<Bv>(),
            Some(&Bv::new(value, 32).unwrap())
        );
    }

    /// Operator sugar and the value-level ALU agree.
    #[test]
    fn sugar_matches_the_alu(a in any::<u8>(), b in any::<u8>()) {
        let mgr = default_manager();
        let ea = mgr.mk_bvv(a, 8).unwrap();
        let eb = mgr.mk_bvv(b, 8).unwrap();

        let va = Bv::new(a, 8).unwrap();
        let vb = Bv::new(b, 8).unwrap();

        let sum = (&ea + &eb).realize().unwrap();
        prop_assert_eq!(sum.downcast_ref::<Bv>(), Some(&va.add(&vb).unwrap()));

        let xor = (&ea ^ &eb).realize().unwrap();
        prop_assert_eq!(xor.downcast_ref::<Bv>(), Some(&va.xor(&vb).unwrap()));

        let diff = (&ea - &eb).realize().unwrap();
        prop_assert_eq!(diff.downcast_ref::<Bv>(), Some(&va.sub(&vb).unwrap()));
    }

    /// Unsigned and signed orderings agree exactly when the sign bits do.
    #[test]
    fn ordering_views_relate(a in any::<u8>(), b in any::<u8>()) {
        let va = Bv::new(a, 8).unwrap();
        let vb = Bv::new(b, 8).unwrap();

        let same_sign = (a >= 128) == (b >= 128);
        if same_sign {
            prop_assert_eq!(va.ult(&vb).unwrap(), va.slt(&vb).unwrap());
        } else {
            prop_assert_ne!(va.ult(&vb).unwrap(), va.slt(&vb).unwrap());
        }
    }
}
