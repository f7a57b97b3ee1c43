//! Symbex Core - expression handles, operator registry, and backend dispatch
//!
//! This crate provides the representation and dispatch engine of the symbex
//! toolkit:
//! - A deferred-operation AST ([`OpNode`]) over shared operands
//! - The dual-state expression handle ([`Expr`]) holding a realized native
//!   value, an AST, or a pending reload key
//! - The ordered backend-resolution protocol ([`BackendStack`]) with typed
//!   rejection-based fallback
//! - The closed operator registry ([`OpCode`]) with reflectable opposites
//!   and scalar fast paths
//! - Persistence by stable reload key ([`ExprStore`], [`MemoryStore`])
//!
//! # Examples
//!
//! ## Composing symbolic expressions
//!
//! ```
//! use std::sync::Arc;
//! use symbex_core::{BackendStack, ExprManager, OpCode, StructuralBackend};
//!
//! # fn main() -> symbex_core::Result<()> {
//! let mgr = ExprManager::new(BackendStack::new(vec![Arc::new(StructuralBackend)]));
//!
//! let x = mgr.mk_bvs("x", 8)?;
//! let y = mgr.mk_bvs("y", 8)?;
//! let sum = &x + &y;
//!
//! assert!(sum.is_symbolic()?);
//! assert_eq!(sum.cached_ast().unwrap().op(), OpCode::Add);
//! # Ok(())
//! # }
//! ```
//!
//! ## Splitting a conjunction into conjuncts
//!
//! ```
//! use std::sync::Arc;
//! use symbex_core::{BackendStack, ExprManager, OpCode, StructuralBackend};
//!
//! # fn main() -> symbex_core::Result<()> {
//! let mgr = ExprManager::new(BackendStack::new(vec![Arc::new(StructuralBackend)]));
//!
//! let p = mgr.mk_bvs("p", 1)?;
//! let q = mgr.mk_bvs("q", 1)?;
//! let both = mgr.mk_and(&[p, q])?;
//!
//! let conjuncts = both.split(&[OpCode::BoolAnd])?;
//! assert_eq!(conjuncts.len(), 2);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod backend;
pub mod error;
pub mod expr;
pub mod manager;
pub mod op;
pub mod store;
pub mod structural;
pub mod value;

pub use ast::{OpArg, OpNode};
pub use backend::{merged_metadata, Abstraction, Backend, BackendStack, Dispatch};
pub use error::{Result, SymbexError};
pub use expr::Expr;
pub use manager::ExprManager;
pub use op::{OpCode, OpFamily, ScalarFn};
pub use store::{ExprKey, ExprStore, MemoryStore};
pub use structural::StructuralBackend;
pub use value::{BackendValue, NativeValue, Value, VarSet};
