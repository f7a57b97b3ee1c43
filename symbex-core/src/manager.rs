//! The expression manager: factory surface and threaded configuration.
//!
//! An [`ExprManager`] owns the ordered backend chain and the optional
//! persistence collaborator. Handles carry a cheap clone of their manager,
//! which is how the registered chain reaches `operate`/`realize` without
//! any process-global state. Factory operations route through the same
//! resolution protocol as everything else, so a chain with a concrete
//! calculator realizes constants eagerly while a structural-only chain
//! records them as ASTs.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::ast::OpArg;
use crate::backend::BackendStack;
use crate::error::{Result, SymbexError};
use crate::expr::Expr;
use crate::op::OpCode;
use crate::store::{ExprKey, ExprStore};

struct ManagerInner {
    backends: BackendStack,
    store: Option<Arc<dyn ExprStore>>,
}

/// Factory and configuration handle for expressions.
#[derive(Clone)]
pub struct ExprManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for ExprManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprManager")
            .field("backends", &self.inner.backends)
            .field("store", &self.inner.store.is_some())
            .finish()
    }
}

impl ExprManager {
    /// Create a manager over an ordered backend chain.
    #[must_use]
    pub fn new(backends: BackendStack) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                backends,
                store: None,
            }),
        }
    }

    /// Create a manager with a persistence collaborator.
    #[must_use]
    pub fn with_store(backends: BackendStack, store: Arc<dyn ExprStore>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                backends,
                store: Some(store),
            }),
        }
    }

    /// The registered backend chain.
    #[must_use]
    pub fn backends(&self) -> &BackendStack {
        &self.inner.backends
    }

    fn call(&self, op: OpCode, args: &[OpArg]) -> Result<Expr> {
        self.inner.backends.call(self, op, args)
    }

    /// A bit-vector constant of the given width.
    pub fn mk_bvv(&self, value: impl Into<BigInt>, width: u32) -> Result<Expr> {
        self.call(
            OpCode::BitVecVal,
            &[OpArg::from(value.into()), OpArg::from(width)],
        )
    }

    /// A free bit-vector symbol.
    pub fn mk_bvs(&self, name: &str, width: u32) -> Result<Expr> {
        self.call(OpCode::BitVec, &[OpArg::from(name), OpArg::from(width)])
    }

    /// A boolean constant.
    pub fn mk_bool(&self, value: bool) -> Result<Expr> {
        self.call(OpCode::BoolVal, &[OpArg::from(value)])
    }

    /// Concatenation; the first part occupies the most significant bits.
    pub fn mk_concat(&self, parts: &[Expr]) -> Result<Expr> {
        let args: Vec<OpArg> = parts.iter().map(OpArg::from).collect();
        self.call(OpCode::Concat, &args)
    }

    /// Bits `[low, high]` inclusive of `expr`.
    pub fn mk_extract(&self, high: u32, low: u32, expr: &Expr) -> Result<Expr> {
        self.call(
            OpCode::Extract,
            &[OpArg::from(high), OpArg::from(low), OpArg::from(expr)],
        )
    }

    /// Widen `expr` by `n` bits preserving the unsigned value.
    pub fn mk_zero_ext(&self, n: u32, expr: &Expr) -> Result<Expr> {
        self.call(OpCode::ZeroExt, &[OpArg::from(n), OpArg::from(expr)])
    }

    /// Widen `expr` by `n` bits preserving the signed value.
    pub fn mk_sign_ext(&self, n: u32, expr: &Expr) -> Result<Expr> {
        self.call(OpCode::SignExt, &[OpArg::from(n), OpArg::from(expr)])
    }

    /// Ternary choice over a boolean condition.
    pub fn mk_if(&self, cond: &Expr, then_expr: &Expr, else_expr: &Expr) -> Result<Expr> {
        self.call(
            OpCode::If,
            &[
                OpArg::from(cond),
                OpArg::from(then_expr),
                OpArg::from(else_expr),
            ],
        )
    }

    /// Boolean conjunction over any number of operands.
    pub fn mk_and(&self, parts: &[Expr]) -> Result<Expr> {
        let args: Vec<OpArg> = parts.iter().map(OpArg::from).collect();
        self.call(OpCode::BoolAnd, &args)
    }

    /// Boolean disjunction over any number of operands.
    pub fn mk_or(&self, parts: &[Expr]) -> Result<Expr> {
        let args: Vec<OpArg> = parts.iter().map(OpArg::from).collect();
        self.call(OpCode::BoolOr, &args)
    }

    /// Boolean negation.
    pub fn mk_not(&self, expr: &Expr) -> Result<Expr> {
        self.call(OpCode::BoolNot, &[OpArg::from(expr)])
    }

    /// Circular left rotation of `expr` by `amount` bits.
    pub fn mk_rotate_left<A: Into<OpArg>>(&self, expr: &Expr, amount: A) -> Result<Expr> {
        self.call(OpCode::RotateLeft, &[OpArg::from(expr), amount.into()])
    }

    /// Circular right rotation of `expr` by `amount` bits.
    pub fn mk_rotate_right<A: Into<OpArg>>(&self, expr: &Expr, amount: A) -> Result<Expr> {
        self.call(OpCode::RotateRight, &[OpArg::from(expr), amount.into()])
    }

    /// Logical (zero-filling) right shift.
    pub fn mk_lshr<A: Into<OpArg>>(&self, expr: &Expr, amount: A) -> Result<Expr> {
        self.call(OpCode::LShR, &[OpArg::from(expr), amount.into()])
    }

    /// A deferred handle that will hydrate from the store on first access.
    #[must_use]
    pub fn defer(&self, key: ExprKey) -> Expr {
        Expr::deferred(self, key)
    }

    /// Load a stored expression through the persistence collaborator.
    pub fn load_expression(&self, key: &ExprKey) -> Result<Expr> {
        match &self.inner.store {
            Some(store) => store.load(key),
            None => Err(SymbexError::Persistence {
                key: key.to_string(),
            }),
        }
    }

    /// Persist an expression through the persistence collaborator.
    pub fn store_expression(&self, expr: &Expr) -> Result<ExprKey> {
        match &self.inner.store {
            Some(store) => store.store(expr),
            None => Err(SymbexError::Persistence {
                key: "<no store configured>".to_owned(),
            }),
        }
    }
}
