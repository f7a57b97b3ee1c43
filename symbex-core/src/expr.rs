//! The expression handle.
//!
//! An [`Expr`] is the externally visible symbolic value: a cheap-clone
//! handle over a state record holding the free-variable set, the symbolic
//! flag, and a tagged representation with exactly one active case —
//! deferred (reload key only), concrete (realized native value), abstract
//! (operation node), or resolved (both cached, so realize and abstract
//! become no-ops).
//!
//! Caching realized values and recovered ASTs back into the handle is an
//! explicit, documented side effect of [`Expr::realize_with`] and
//! [`Expr::abstractify_with`]. The internal mutex only upholds aliasing
//! rules for shared handles; concurrent realization of the *same* handle
//! must be serialized by the caller.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::ast::{OpArg, OpNode};
use crate::backend::BackendStack;
use crate::error::{Result, SymbexError};
use crate::manager::ExprManager;
use crate::op::OpCode;
use crate::store::ExprKey;
use crate::value::{Value, VarSet};

/// The active representation of a handle.
#[derive(Debug, Clone)]
enum Repr {
    /// Only a reload key is known; hydrates through the store on access.
    Deferred,
    /// A realized backend value.
    Concrete(Value),
    /// A deferred-operation AST.
    Abstract(Arc<OpNode>),
    /// Both forms cached.
    Resolved(Value, Arc<OpNode>),
}

impl Repr {
    fn native(&self) -> Option<&Value> {
        match self {
            Repr::Concrete(v) | Repr::Resolved(v, _) => Some(v),
            _ => None,
        }
    }

    fn ast(&self) -> Option<&Arc<OpNode>> {
        match self {
            Repr::Abstract(n) | Repr::Resolved(_, n) => Some(n),
            _ => None,
        }
    }

    fn attach_native(&mut self, value: Value) {
        *self = match std::mem::replace(self, Repr::Deferred) {
            Repr::Abstract(n) | Repr::Resolved(_, n) => Repr::Resolved(value, n),
            _ => Repr::Concrete(value),
        };
    }

    fn attach_ast(&mut self, node: Arc<OpNode>) {
        *self = match std::mem::replace(self, Repr::Deferred) {
            Repr::Concrete(v) | Repr::Resolved(v, _) => Repr::Resolved(v, node),
            _ => Repr::Abstract(node),
        };
    }
}

#[derive(Debug, Clone)]
struct ExprState {
    variables: VarSet,
    symbolic: bool,
    repr: Repr,
    key: Option<ExprKey>,
}

/// The externally visible symbolic value.
///
/// Clones share state: realizing one clone realizes them all, which is what
/// lets reused operands form a DAG without repeated evaluation.
#[derive(Clone)]
pub struct Expr {
    mgr: ExprManager,
    state: Arc<Mutex<ExprState>>,
}

impl Expr {
    fn with_state(mgr: &ExprManager, state: ExprState) -> Self {
        Self {
            mgr: mgr.clone(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Build a handle around a realized value.
    #[must_use]
    pub fn from_value(mgr: &ExprManager, value: Value, variables: VarSet, symbolic: bool) -> Self {
        Self::with_state(
            mgr,
            ExprState {
                variables,
                symbolic,
                repr: Repr::Concrete(value),
                key: None,
            },
        )
    }

    /// Build a handle around an operation node.
    #[must_use]
    pub fn from_node(mgr: &ExprManager, node: Arc<OpNode>, variables: VarSet, symbolic: bool) -> Self {
        Self::with_state(
            mgr,
            ExprState {
                variables,
                symbolic,
                repr: Repr::Abstract(node),
                key: None,
            },
        )
    }

    /// Build a reload-key-only handle that hydrates through the manager's
    /// store on first access.
    #[must_use]
    pub fn deferred(mgr: &ExprManager, key: ExprKey) -> Self {
        Self::with_state(
            mgr,
            ExprState {
                variables: VarSet::default(),
                symbolic: false,
                repr: Repr::Deferred,
                key: Some(key),
            },
        )
    }

    /// The manager this handle was created through.
    #[must_use]
    pub fn manager(&self) -> &ExprManager {
        &self.mgr
    }

    fn lock(&self) -> MutexGuard<'_, ExprState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a deferred handle through the persistence collaborator.
    ///
    /// A no-op for handles that already carry data.
    fn hydrate(&self) -> Result<()> {
        let key = {
            let st = self.lock();
            if !matches!(st.repr, Repr::Deferred) {
                return Ok(());
            }
            st.key.clone()
        };
        let Some(key) = key else {
            return Err(SymbexError::UnresolvedExpression);
        };
        debug!(key = %key, "hydrating deferred expression");
        let loaded = self.mgr.load_expression(&key)?;
        let loaded_state = loaded.lock().clone();
        let mut st = self.lock();
        if matches!(st.repr, Repr::Deferred) {
            *st = loaded_state;
            st.key = Some(key);
        }
        Ok(())
    }

    /// Free variables this expression depends on.
    pub fn variables(&self) -> Result<VarSet> {
        self.hydrate()?;
        Ok(self.lock().variables.clone())
    }

    /// Whether any operand is transitively symbolic.
    pub fn is_symbolic(&self) -> Result<bool> {
        self.hydrate()?;
        Ok(self.lock().symbolic)
    }

    /// The reload key, when the handle has been persisted or deferred.
    #[must_use]
    pub fn key(&self) -> Option<ExprKey> {
        self.lock().key.clone()
    }

    pub(crate) fn set_key(&self, key: ExprKey) {
        self.lock().key = Some(key);
    }

    /// Snapshot of the cached native value. Does not hydrate or evaluate.
    #[must_use]
    pub fn cached_native(&self) -> Option<Value> {
        self.lock().repr.native().cloned()
    }

    /// Snapshot of the cached AST. Does not hydrate or abstract.
    #[must_use]
    pub fn cached_ast(&self) -> Option<Arc<OpNode>> {
        self.lock().repr.ast().cloned()
    }

    /// Whether the handle is still waiting on its reload key.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self.lock().repr, Repr::Deferred)
    }

    /// Apply an operator with this handle as the first operand.
    ///
    /// Dispatches through the manager's registered backend chain.
    pub fn operate(&self, op: OpCode, operands: &[OpArg]) -> Result<Expr> {
        self.operate_with(op, operands, None)
    }

    /// Apply an operator against an explicit backend ordering.
    ///
    /// When this handle and every operand are realized plain scalars and
    /// the operator has a native form, the result is computed directly and
    /// wrapped without consulting any backend.
    pub fn operate_with(
        &self,
        op: OpCode,
        operands: &[OpArg],
        stack: Option<&BackendStack>,
    ) -> Result<Expr> {
        self.hydrate()?;

        if let Some(f) = op.scalar_fn() {
            if let Some(self_val) = self.cached_native().filter(Value::is_scalar) {
                let mut vals = Vec::with_capacity(operands.len() + 1);
                vals.push(self_val);
                let mut all_scalar = true;
                for arg in operands {
                    match arg {
                        OpArg::Value(v) if v.is_scalar() => vals.push(v.clone()),
                        _ => {
                            all_scalar = false;
                            break;
                        }
                    }
                }
                if all_scalar {
                    if let Some(result) = f(&vals) {
                        let value = result?;
                        return Ok(Expr::from_value(&self.mgr, value, VarSet::default(), false));
                    }
                }
            }
        }

        let mut args = Vec::with_capacity(operands.len() + 1);
        args.push(OpArg::Expr(self.clone()));
        args.extend(operands.iter().cloned());
        let stack = stack.unwrap_or_else(|| self.mgr.backends());
        stack.call(&self.mgr, op, &args)
    }

    /// Realize this handle to a backend-native value, caching the result.
    ///
    /// Equivalent to `realize_with(None, false)`: with no explicit backend
    /// list, the evaluated value is cached back into the handle.
    pub fn realize(&self) -> Result<Value> {
        self.realize_with(None, false)
    }

    /// Realize against an explicit backend ordering.
    ///
    /// Plain scalars are already irreducible and pass through untouched. A
    /// cached native value is returned as-is without an explicit list, or
    /// run through the list's conversion chain with one. An abstract handle
    /// evaluates its AST bottom-up; the result is cached when `cache` is
    /// set or no explicit list was given.
    pub fn realize_with(&self, stack: Option<&BackendStack>, cache: bool) -> Result<Value> {
        self.hydrate()?;

        let (native, node) = {
            let st = self.lock();
            (st.repr.native().cloned(), st.repr.ast().cloned())
        };

        if let Some(value) = native {
            if value.is_scalar() {
                return Ok(value);
            }
            return match stack {
                None => Ok(value),
                Some(stack) => {
                    let converted = stack.convert(&value)?;
                    if cache {
                        self.lock().repr.attach_native(converted.clone());
                    }
                    Ok(converted)
                }
            };
        }

        if let Some(node) = node {
            let chain = stack.unwrap_or_else(|| self.mgr.backends());
            let result = node.eval(&self.mgr, chain, cache)?;
            let value = result
                .cached_native()
                .ok_or(SymbexError::UnresolvedExpression)?;
            if cache || stack.is_none() {
                let variables = result.variables()?;
                let symbolic = result.is_symbolic()?;
                let mut st = self.lock();
                st.repr.attach_native(value.clone());
                st.variables = variables;
                st.symbolic = symbolic;
            }
            return Ok(value);
        }

        Err(SymbexError::UnresolvedExpression)
    }

    /// Recover the portable AST form, caching it into the handle.
    pub fn abstractify(&self) -> Result<Arc<OpNode>> {
        self.abstractify_with(None)
    }

    /// Recover the AST form against an explicit backend ordering.
    pub fn abstractify_with(&self, stack: Option<&BackendStack>) -> Result<Arc<OpNode>> {
        self.hydrate()?;

        if let Some(node) = self.lock().repr.ast() {
            debug!("abstract form already cached");
            return Ok(node.clone());
        }

        let native = self
            .cached_native()
            .ok_or(SymbexError::AbstractionFailure)?;
        let chain = stack.unwrap_or_else(|| self.mgr.backends());
        let abstraction = chain.abstractify(&native)?;

        let mut st = self.lock();
        st.repr.attach_ast(abstraction.node.clone());
        st.variables = abstraction.variables;
        st.symbolic = abstraction.symbolic;
        Ok(abstraction.node)
    }

    /// Split a node whose top-level operator is in `ops` into its operands.
    ///
    /// A non-matching operator yields a singleton containing this handle. A
    /// matching node must consist entirely of first-class sub-expressions.
    pub fn split(&self, ops: &[OpCode]) -> Result<Vec<Expr>> {
        self.split_with(ops, None)
    }

    /// `split` against an explicit backend ordering for the abstraction.
    pub fn split_with(&self, ops: &[OpCode], stack: Option<&BackendStack>) -> Result<Vec<Expr>> {
        let node = self.abstractify_with(stack)?;
        if !ops.contains(&node.op()) {
            return Ok(vec![self.clone()]);
        }
        debug!(op = %node.op(), "splitting expression");
        node.args()
            .iter()
            .map(|arg| match arg {
                OpArg::Expr(e) => Ok(e.clone()),
                _ => Err(SymbexError::MalformedSplit { op: node.op() }),
            })
            .collect()
    }

    /// Bit width of this expression, from its value or its structure.
    pub fn bits(&self) -> Result<u32> {
        self.hydrate()?;
        let st = self.lock();
        if let Some(b) = st.repr.native().and_then(Value::bits) {
            return Ok(b);
        }
        if let Some(b) = st.repr.ast().and_then(|n| n.bits()) {
            return Ok(b);
        }
        Err(SymbexError::IndeterminateWidth)
    }

    /// Bits `[low, high]` inclusive, as a new expression.
    pub fn extract(&self, high: u32, low: u32) -> Result<Expr> {
        self.mgr.mk_extract(high, low, self)
    }

    /// A single bit, as a width-1 expression.
    pub fn bit(&self, index: u32) -> Result<Expr> {
        self.mgr.mk_extract(index, index, self)
    }

    /// Widen by `n` bits preserving the unsigned value.
    pub fn zero_extend(&self, n: u32) -> Result<Expr> {
        self.mgr.mk_zero_ext(n, self)
    }

    /// Widen by `n` bits preserving the signed value.
    pub fn sign_extend(&self, n: u32) -> Result<Expr> {
        self.mgr.mk_sign_ext(n, self)
    }

    /// Slice into `chunk`-bit pieces, most significant first.
    ///
    /// The expression length must be an exact multiple of `chunk`.
    pub fn chop(&self, chunk: u32) -> Result<Vec<Expr>> {
        let len = self.bits()?;
        if chunk == 0 || len % chunk != 0 {
            return Err(SymbexError::InvalidChopWidth { len, chunk });
        }
        if len == chunk {
            return Ok(vec![self.clone()]);
        }
        (0..len / chunk)
            .rev()
            .map(|n| self.extract((n + 1) * chunk - 1, n * chunk))
            .collect()
    }

    /// Reverse the expression's `chunk`-bit pieces (byte/word-order
    /// reversal, not bit reversal).
    pub fn reversed(&self, chunk: u32) -> Result<Expr> {
        let mut parts = self.chop(chunk)?;
        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }
        parts.reverse();
        self.mgr.mk_concat(&parts)
    }

    /// Ask the backend chain for a simpler handle with the same meaning.
    pub fn simplify(&self) -> Result<Expr> {
        self.simplify_with(None)
    }

    /// `simplify` against an explicit backend ordering.
    pub fn simplify_with(&self, stack: Option<&BackendStack>) -> Result<Expr> {
        self.hydrate()?;
        let chain = stack.unwrap_or_else(|| self.mgr.backends());
        chain.simplify(&self.mgr, self)
    }

    /// Persist through the manager's store, remembering the reload key.
    pub fn persist(&self) -> Result<ExprKey> {
        self.mgr.store_expression(self)
    }

    // comparison constructors; signed orderings follow the operator family,
    // the unsigned ones dispatch by name

    /// Pattern equality.
    pub fn eq_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Eq, &[other.into()])
    }

    /// Pattern inequality.
    pub fn ne_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Ne, &[other.into()])
    }

    /// Signed less-than.
    pub fn lt_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Lt, &[other.into()])
    }

    /// Signed less-or-equal.
    pub fn le_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Le, &[other.into()])
    }

    /// Signed greater-than.
    pub fn gt_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Gt, &[other.into()])
    }

    /// Signed greater-or-equal.
    pub fn ge_<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::Ge, &[other.into()])
    }

    /// Unsigned less-than.
    pub fn ult<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::ULT, &[other.into()])
    }

    /// Unsigned less-or-equal.
    pub fn ule<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::ULE, &[other.into()])
    }

    /// Unsigned greater-than.
    pub fn ugt<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::UGT, &[other.into()])
    }

    /// Unsigned greater-or-equal.
    pub fn uge<A: Into<OpArg>>(&self, other: A) -> Result<Expr> {
        self.operate(OpCode::UGE, &[other.into()])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        match &st.repr {
            Repr::Concrete(v) | Repr::Resolved(v, _) => v.fmt(f),
            Repr::Abstract(n) => n.fmt(f),
            Repr::Deferred => match &st.key {
                Some(key) => write!(f, "deferred({key})"),
                None => write!(f, "deferred(?)"),
            },
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr").field("state", &*self.lock()).finish()
    }
}

// Operator sugar over `operate`. These panic on hard errors (a width
// mismatch cannot be propagated through `std::ops`); the fallible method
// forms are the primary API.

macro_rules! op_sugar {
    ($self:expr, $op:expr, $($arg:expr),*) => {
        match $self.operate($op, &[$($arg),*]) {
            Ok(e) => e,
            Err(e) => panic!("{} failed: {e}", $op),
        }
    };
    ($self:expr, $op:expr) => {
        match $self.operate($op, &[]) {
            Ok(e) => e,
            Err(e) => panic!("{} failed: {e}", $op),
        }
    };
}

macro_rules! impl_scalar_operand {
    ($tr:ident, $method:ident, $op:ident, $rop:ident, $ty:ty) => {
        impl std::ops::$tr<$ty> for Expr {
            type Output = Expr;
            fn $method(self, rhs: $ty) -> Expr {
                op_sugar!(self, OpCode::$op, OpArg::from(rhs))
            }
        }

        impl std::ops::$tr<$ty> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: $ty) -> Expr {
                op_sugar!(self, OpCode::$op, OpArg::from(rhs))
            }
        }

        impl std::ops::$tr<Expr> for $ty {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                op_sugar!(rhs, OpCode::$rop, OpArg::from(self))
            }
        }
    };
}

macro_rules! impl_binary_operator {
    ($tr:ident, $method:ident, $op:ident, $rop:ident) => {
        impl std::ops::$tr for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                op_sugar!(self, OpCode::$op, OpArg::Expr(rhs))
            }
        }

        impl std::ops::$tr<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                op_sugar!(self, OpCode::$op, OpArg::Expr(rhs.clone()))
            }
        }

        impl_scalar_operand!($tr, $method, $op, $rop, i32);
        impl_scalar_operand!($tr, $method, $op, $rop, i64);
        impl_scalar_operand!($tr, $method, $op, $rop, u32);
        impl_scalar_operand!($tr, $method, $op, $rop, u64);
    };
}

impl_binary_operator!(Add, add, Add, RAdd);
impl_binary_operator!(Sub, sub, Sub, RSub);
impl_binary_operator!(Mul, mul, Mul, RMul);
impl_binary_operator!(Div, div, Div, RDiv);
impl_binary_operator!(Rem, rem, Mod, RMod);
impl_binary_operator!(BitAnd, bitand, And, RAnd);
impl_binary_operator!(BitOr, bitor, Or, ROr);
impl_binary_operator!(BitXor, bitxor, Xor, RXor);
impl_binary_operator!(Shl, shl, Shl, RShl);
impl_binary_operator!(Shr, shr, Shr, RShr);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        op_sugar!(self, OpCode::Neg)
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        op_sugar!(self, OpCode::Neg)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        op_sugar!(self, OpCode::Invert)
    }
}

impl std::ops::Not for &Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        op_sugar!(self, OpCode::Invert)
    }
}
