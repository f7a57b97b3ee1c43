//! The backend capability interface and the ordered resolution protocol.
//!
//! A backend is a pluggable component that can realize or abstract
//! expression values in its own representation domain. Backends signal
//! non-applicability with [`Dispatch::Rejected`], which the protocol treats
//! as "try the next backend" — never as a request failure. Anything a
//! backend returns on the error channel is a hard failure and aborts the
//! whole chain.
//!
//! The ordered list itself is read-only configuration, threaded explicitly
//! into every entry point rather than held as ambient state, so different
//! call sites (and different tests) can supply different orderings.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ast::OpArg;
use crate::error::{Result, SymbexError};
use crate::expr::Expr;
use crate::manager::ExprManager;
use crate::op::OpCode;
use crate::value::{Value, VarSet};

/// Outcome of asking one backend to service a request.
#[derive(Debug)]
pub enum Dispatch<T> {
    /// The backend serviced the request.
    Resolved(T),
    /// The backend cannot service this request; try the next one.
    Rejected,
}

impl<T> Dispatch<T> {
    /// Convert into an `Option`, discarding the rejection marker.
    pub fn resolved(self) -> Option<T> {
        match self {
            Dispatch::Resolved(v) => Some(v),
            Dispatch::Rejected => None,
        }
    }
}

/// The structural form of a realized value, as recovered by a backend.
#[derive(Debug, Clone)]
pub struct Abstraction {
    /// The recovered operation node.
    pub node: Arc<crate::ast::OpNode>,
    /// Free variables the expression depends on.
    pub variables: VarSet,
    /// Whether the expression is symbolic.
    pub symbolic: bool,
}

/// A pluggable resolution domain.
///
/// The default method bodies reject, so a backend only implements the
/// capabilities it actually has.
pub trait Backend: Send + Sync {
    /// Short stable name, used in logs and hard-error reports.
    fn name(&self) -> &'static str;

    /// Apply an operator to an operand list, producing a new handle in this
    /// backend's domain (realized or abstract, whichever it builds).
    fn call(&self, mgr: &ExprManager, op: OpCode, args: &[OpArg]) -> Result<Dispatch<Expr>>;

    /// Reinterpret an already-realized value in this backend's domain.
    fn convert(&self, value: &Value) -> Result<Dispatch<Value>> {
        let _ = value;
        Ok(Dispatch::Rejected)
    }

    /// Recover the portable structural form of a realized value.
    fn abstractify(&self, value: &Value) -> Result<Dispatch<Abstraction>> {
        let _ = value;
        Ok(Dispatch::Rejected)
    }

    /// Produce a simpler handle with the same meaning.
    fn simplify(&self, mgr: &ExprManager, expr: &Expr) -> Result<Dispatch<Expr>> {
        let _ = (mgr, expr);
        Ok(Dispatch::Rejected)
    }
}

/// An ordered, read-only list of backends tried in priority order.
#[derive(Clone, Default)]
pub struct BackendStack {
    backends: Vec<Arc<dyn Backend>>,
}

impl fmt::Debug for BackendStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

impl BackendStack {
    /// Build a stack from an ordered backend list.
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }

    /// Number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Iterate the backends in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.iter()
    }

    /// Dispatch an operator application: first non-rejecting backend wins.
    ///
    /// If every backend rejects and the operator is a binary reflectable
    /// one, the chain is retried once with the operands swapped and the
    /// opposite operator. Exhaustion raises `UnsupportedOperation`.
    pub fn call(&self, mgr: &ExprManager, op: OpCode, args: &[OpArg]) -> Result<Expr> {
        if let Some(expected) = op.arity() {
            if args.len() != expected {
                return Err(SymbexError::Arity {
                    op,
                    expected,
                    found: args.len(),
                });
            }
        }

        if let Some(expr) = self.call_once(mgr, op, args)? {
            return Ok(expr);
        }

        if let (Some(opposite), [lhs, rhs]) = (op.opposite(), args) {
            debug!(%op, %opposite, "all backends rejected; retrying with swapped operands");
            let swapped = [rhs.clone(), lhs.clone()];
            if let Some(expr) = self.call_once(mgr, opposite, &swapped)? {
                return Ok(expr);
            }
        }

        Err(SymbexError::UnsupportedOperation { op })
    }

    fn call_once(&self, mgr: &ExprManager, op: OpCode, args: &[OpArg]) -> Result<Option<Expr>> {
        for backend in &self.backends {
            debug!(backend = backend.name(), %op, "trying operation");
            match backend.call(mgr, op, args)? {
                Dispatch::Resolved(expr) => return Ok(Some(expr)),
                Dispatch::Rejected => {
                    debug!(backend = backend.name(), %op, "rejected");
                }
            }
        }
        Ok(None)
    }

    /// Convert a realized value: first non-rejecting backend wins.
    pub fn convert(&self, value: &Value) -> Result<Value> {
        for backend in &self.backends {
            debug!(backend = backend.name(), "trying conversion");
            if let Dispatch::Resolved(v) = backend.convert(value)? {
                return Ok(v);
            }
        }
        Err(SymbexError::ConversionFailure {
            value: value.to_string(),
        })
    }

    /// Recover a structural form: first non-rejecting backend wins.
    pub fn abstractify(&self, value: &Value) -> Result<Abstraction> {
        for backend in &self.backends {
            debug!(backend = backend.name(), "trying abstraction");
            if let Dispatch::Resolved(a) = backend.abstractify(value)? {
                return Ok(a);
            }
        }
        Err(SymbexError::AbstractionFailure)
    }

    /// Simplify a handle: first non-rejecting backend wins.
    pub fn simplify(&self, mgr: &ExprManager, expr: &Expr) -> Result<Expr> {
        for backend in &self.backends {
            debug!(backend = backend.name(), "trying simplification");
            if let Dispatch::Resolved(e) = backend.simplify(mgr, expr)? {
                return Ok(e);
            }
        }
        Err(SymbexError::SimplificationFailure)
    }
}

/// Merge free-variable sets and symbolic flags across an operand list.
///
/// Only expression operands carry metadata; values and raw nodes contribute
/// nothing. Deferred operands hydrate on access, so this can fail with a
/// persistence error.
pub fn merged_metadata(args: &[OpArg]) -> Result<(VarSet, bool)> {
    let mut variables = VarSet::default();
    let mut symbolic = false;
    for arg in args {
        if let OpArg::Expr(e) = arg {
            variables.extend(e.variables()?);
            symbolic |= e.is_symbolic()?;
        }
    }
    Ok((variables, symbolic))
}
