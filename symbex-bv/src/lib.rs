//! Symbex BV - fixed-width bit-vectors and the concrete backend
//!
//! This crate provides the concrete domain of the symbex toolkit: [`Bv`],
//! the fixed-width wraparound bit-vector value with exact two's-complement
//! and modular-arithmetic semantics, and [`ConcreteBackend`], the
//! always-available backend that realizes operations over concrete
//! operands.
//!
//! # Examples
//!
//! ```
//! use symbex_bv::{default_manager, Bv};
//!
//! # fn main() -> symbex_core::Result<()> {
//! let mgr = default_manager();
//!
//! // Concrete operands compute eagerly.
//! let a = mgr.mk_bvv(1, 8)?;
//! let b = mgr.mk_bvv(2, 8)?;
//! let or = (&a | &b).realize()?;
//! assert_eq!(or.downcast_ref::<Bv>(), Some(&Bv::new(3, 8)?));
//!
//! // Symbolic operands defer, and realize once everything is concrete.
//! let x = mgr.mk_bvs("x", 8)?;
//! let sum = &x + &b;
//! assert!(sum.is_symbolic()?);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod value;

pub use backend::ConcreteBackend;
pub use value::Bv;

use std::sync::Arc;

use symbex_core::{BackendStack, ExprManager, MemoryStore, StructuralBackend};

/// The standard backend ordering: the concrete calculator first, the
/// structural recorder as the catch-all.
#[must_use]
pub fn default_stack() -> BackendStack {
    BackendStack::new(vec![Arc::new(ConcreteBackend), Arc::new(StructuralBackend)])
}

/// A manager over [`default_stack`] with an in-memory expression store.
#[must_use]
pub fn default_manager() -> ExprManager {
    ExprManager::with_store(default_stack(), Arc::new(MemoryStore::new()))
}
