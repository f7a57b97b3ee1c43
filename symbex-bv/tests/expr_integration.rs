//! End-to-end composition and realization through the default chain.

use num_bigint::BigInt;
use symbex_bv::{default_manager, Bv};
use symbex_core::{OpCode, SymbexError, Value};

fn bv(value: i64, width: u32) -> Bv {
    Bv::new(value, width).unwrap()
}

fn realize_bv(e: &symbex_core::Expr) -> Bv {
    e.realize().unwrap().downcast_ref::<Bv>().cloned().unwrap()
}

#[test]
fn width8_reference_scenario() {
    let mgr = default_manager();
    let a = mgr.mk_bvv(1, 8).unwrap();
    let b = mgr.mk_bvv(2, 8).unwrap();

    assert_eq!(realize_bv(&(&a | &b)), bv(3, 8));
    assert_eq!(realize_bv(&(&a & &b)), bv(0, 8));
    assert_eq!(realize_bv(&(&a / &b)), bv(0, 8));
    assert_eq!(realize_bv(&(&b * &b)), bv(4, 8));

    let c = mgr.mk_bvv(128, 8).unwrap();
    assert_eq!(realize_bv(&c).signed(), BigInt::from(-128));
}

#[test]
fn structural_reference_scenario() {
    let mgr = default_manager();
    let d = mgr.mk_bvv(255, 8).unwrap();

    let low = d.extract(1, 0).unwrap();
    assert_eq!(realize_bv(&low), bv(3, 2));

    let signed = d.sign_extend(8).unwrap();
    let signed = realize_bv(&signed);
    assert_eq!(signed.width(), 16);
    assert_eq!(signed.unsigned(), &num_bigint::BigUint::from(0xffffu32));

    let zeroed = d.zero_extend(8).unwrap();
    let zeroed = realize_bv(&zeroed);
    assert_eq!(zeroed.width(), 16);
    assert_eq!(zeroed.unsigned(), &num_bigint::BigUint::from(255u32));
}

#[test]
fn full_extract_is_identity() {
    let mgr = default_manager();
    let v = mgr.mk_bvv(0xab, 8).unwrap();
    assert_eq!(realize_bv(&v.extract(7, 0).unwrap()), bv(0xab, 8));
}

#[test]
fn concat_of_unwidened_extensions() {
    let mgr = default_manager();
    let a = mgr.mk_bvv(0xde, 8).unwrap();
    let b = mgr.mk_bvv(0xad, 8).unwrap();

    let cat = mgr
        .mk_concat(&[a.zero_extend(0).unwrap(), b.zero_extend(0).unwrap()])
        .unwrap();
    let cat = realize_bv(&cat);
    assert_eq!(cat.width(), 16);
    assert_eq!(cat, bv(0xdead, 16));
}

#[test]
fn chop_then_concat_reconstructs() {
    let mgr = default_manager();
    let v = mgr.mk_bvv(0xdead_beefu32, 32).unwrap();

    let slices = v.chop(8).unwrap();
    assert_eq!(slices.len(), 4);
    assert_eq!(realize_bv(&slices[0]), bv(0xde, 8));
    assert_eq!(realize_bv(&slices[3]), bv(0xef, 8));

    let rebuilt = mgr.mk_concat(&slices).unwrap();
    assert_eq!(realize_bv(&rebuilt), bv(0xdead_beefu32 as i64, 32));
}

#[test]
fn reversed_swaps_byte_order() {
    let mgr = default_manager();
    let v = mgr.mk_bvv(0xdead_beefu32, 32).unwrap();
    let r = v.reversed(8).unwrap();
    assert_eq!(realize_bv(&r), bv(0xefbe_addeu32 as i64, 32));
}

#[test]
fn rotations_through_the_chain() {
    let mgr = default_manager();
    let v = mgr.mk_bvv(0b1000_0001, 8).unwrap();

    let l = mgr.mk_rotate_left(&v, 1u32).unwrap();
    assert_eq!(realize_bv(&l), bv(0b0000_0011, 8));

    let r = mgr.mk_rotate_right(&v, 1u32).unwrap();
    assert_eq!(realize_bv(&r), bv(0b1100_0000, 8));

    let full = mgr.mk_rotate_left(&v, 8u32).unwrap();
    assert_eq!(realize_bv(&full), bv(0b1000_0001, 8));
}

#[test]
fn logical_shift_through_the_chain() {
    let mgr = default_manager();
    let v = mgr.mk_bvv(0x80, 8).unwrap();
    let amount = mgr.mk_bvv(1, 8).unwrap();

    let l = mgr.mk_lshr(&v, &amount).unwrap();
    assert_eq!(realize_bv(&l), bv(0x40, 8));

    // The operator form is arithmetic.
    assert_eq!(realize_bv(&(&v >> &amount)), bv(0xc0, 8));
}

#[test]
fn symbolic_composition_defers() {
    let mgr = default_manager();
    let x = mgr.mk_bvs("x", 8).unwrap();
    let one = mgr.mk_bvv(1, 8).unwrap();

    let sum = &x + &one;
    assert!(sum.is_symbolic().unwrap());
    assert!(sum.variables().unwrap().contains("x"));
    assert!(sum.cached_native().is_none());
    assert_eq!(sum.cached_ast().unwrap().op(), OpCode::Add);

    // Without a solver backend there is nothing to realize a symbol with.
    assert!(matches!(
        sum.realize(),
        Err(SymbexError::UnresolvedExpression)
    ));
}

#[test]
fn symbolic_widths_flow_structurally() {
    let mgr = default_manager();
    let x = mgr.mk_bvs("x", 32).unwrap();
    assert_eq!(x.bits().unwrap(), 32);
    assert_eq!((&x + 1i64).bits().unwrap(), 32);
    assert_eq!(x.extract(15, 0).unwrap().bits().unwrap(), 16);
    assert_eq!(x.reversed(8).unwrap().bits().unwrap(), 32);
}

#[test]
fn split_a_symbolic_conjunction() {
    let mgr = default_manager();
    let x = mgr.mk_bvs("x", 8).unwrap();
    let y = mgr.mk_bvs("y", 8).unwrap();
    let lhs = x.ult(&y).unwrap();
    let rhs = x.ne_(0i64).unwrap();
    let both = mgr.mk_and(&[lhs, rhs]).unwrap();

    let parts = both.split(&[OpCode::BoolAnd]).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].cached_ast().unwrap().op(), OpCode::ULT);
    assert_eq!(parts[1].cached_ast().unwrap().op(), OpCode::Ne);

    // A non-matching top operator comes back as a singleton.
    let solo = both.split(&[OpCode::BoolOr]).unwrap();
    assert_eq!(solo.len(), 1);
}

#[test]
fn comparisons_realize_to_booleans() {
    let mgr = default_manager();
    let small = mgr.mk_bvv(1, 8).unwrap();
    let big = mgr.mk_bvv(0xff, 8).unwrap();

    assert_eq!(
        big.lt_(&small).unwrap().realize().unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        big.ult(&small).unwrap().realize().unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        small.ule(&big).unwrap().realize().unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn division_by_zero_is_terminal() {
    let mgr = default_manager();
    let a = mgr.mk_bvv(1, 8).unwrap();
    let z = mgr.mk_bvv(0, 8).unwrap();
    assert!(matches!(
        a.operate(OpCode::Div, &[symbex_core::OpArg::from(&z)]),
        Err(SymbexError::DivisionByZero)
    ));
}

#[test]
fn scalar_on_the_left_matches_scalar_on_the_right() {
    let mgr = default_manager();
    let a = mgr.mk_bvv(40, 8).unwrap();
    assert_eq!(realize_bv(&(2i64 + a.clone())), realize_bv(&(a + 2i64)));
}

#[test]
fn abstract_then_evaluate_round_trips() {
    let mgr = default_manager();
    let c = mgr.mk_bvv(0x5a, 8).unwrap();
    let node = c.abstractify().unwrap();
    assert_eq!(node.op(), OpCode::BitVecVal);

    let replayed = node.eval(&mgr, mgr.backends(), false).unwrap();
    assert_eq!(
        replayed.cached_native().unwrap().downcast_ref::<Bv>(),
        Some(&bv(0x5a, 8))
    );
}
