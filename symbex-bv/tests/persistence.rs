//! Store, reload, and deferred hydration through the in-memory store.

use symbex_bv::{default_manager, Bv};
use symbex_core::{ExprKey, OpCode, SymbexError};

#[test]
fn store_and_reload_a_concrete_expression() {
    let mgr = default_manager();
    let c = mgr.mk_bvv(0x42, 8).unwrap();

    let key = c.persist().unwrap();
    // Storing caches the portable form.
    assert_eq!(c.cached_ast().unwrap().op(), OpCode::BitVecVal);

    let loaded = mgr.load_expression(&key).unwrap();
    let v = loaded.realize().unwrap();
    assert_eq!(v.downcast_ref::<Bv>(), Some(&Bv::new(0x42, 8).unwrap()));
}

#[test]
fn storing_twice_reuses_the_key() {
    let mgr = default_manager();
    let x = mgr.mk_bvs("x", 8).unwrap();

    let key1 = x.persist().unwrap();
    let key2 = x.persist().unwrap();
    assert_eq!(key1, key2);
    assert_eq!(x.key(), Some(key1));
}

#[test]
fn deferred_handles_behave_like_full_ones_after_access() {
    let mgr = default_manager();
    let x = mgr.mk_bvs("x", 8).unwrap();
    let sum = &x + 1i64;
    let key = sum.persist().unwrap();

    let revived = mgr.defer(key);
    assert!(revived.is_deferred());

    // Any access hydrates; afterwards the handle carries full data.
    assert!(revived.is_symbolic().unwrap());
    assert!(!revived.is_deferred());
    assert!(revived.variables().unwrap().contains("x"));
    assert_eq!(revived.cached_ast().unwrap().op(), OpCode::Add);
}

#[test]
fn deferred_handles_compose_like_full_ones() {
    let mgr = default_manager();
    let c = mgr.mk_bvv(2, 8).unwrap();
    let key = c.persist().unwrap();

    let revived = mgr.defer(key);
    let sum = revived + 3i64;
    let v = sum.realize().unwrap();
    assert_eq!(v.downcast_ref::<Bv>(), Some(&Bv::new(5, 8).unwrap()));
}

#[test]
fn unknown_keys_surface_a_persistence_error() {
    let mgr = default_manager();
    let ghost = mgr.defer(ExprKey::from("expr-9999"));
    assert!(matches!(
        ghost.realize(),
        Err(SymbexError::Persistence { .. })
    ));
    assert!(matches!(
        mgr.load_expression(&ExprKey::from("nope")),
        Err(SymbexError::Persistence { .. })
    ));
}
