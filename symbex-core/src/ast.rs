//! Deferred-operation nodes.
//!
//! An [`OpNode`] is an immutable record of an operator application over an
//! ordered operand list. Operands may be expression handles, nested nodes,
//! or already-realized values; handles are shared, not owned, so reused
//! sub-expressions form a DAG. Nodes cache nothing: evaluating the same
//! node twice is always safe and equivalent.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::backend::BackendStack;
use crate::error::{Result, SymbexError};
use crate::expr::Expr;
use crate::manager::ExprManager;
use crate::op::OpCode;
use crate::value::Value;

/// An operand of an [`OpNode`].
#[derive(Debug, Clone)]
pub enum OpArg {
    /// A first-class sub-expression, shared by reference.
    Expr(Expr),
    /// A nested node without its own handle.
    Node(Arc<OpNode>),
    /// An already-realized value.
    Value(Value),
}

impl OpArg {
    /// Bit width of the operand, when determinable without realization.
    #[must_use]
    pub fn bits(&self) -> Option<u32> {
        match self {
            OpArg::Expr(e) => e.bits().ok(),
            OpArg::Node(n) => n.bits(),
            OpArg::Value(v) => v.bits(),
        }
    }

    fn as_width(&self) -> Option<u32> {
        match self {
            OpArg::Value(Value::Int(i)) => i.to_u32(),
            _ => None,
        }
    }
}

impl From<Expr> for OpArg {
    fn from(e: Expr) -> Self {
        OpArg::Expr(e)
    }
}

impl From<&Expr> for OpArg {
    fn from(e: &Expr) -> Self {
        OpArg::Expr(e.clone())
    }
}

impl From<Value> for OpArg {
    fn from(v: Value) -> Self {
        OpArg::Value(v)
    }
}

impl From<Arc<OpNode>> for OpArg {
    fn from(n: Arc<OpNode>) -> Self {
        OpArg::Node(n)
    }
}

impl From<OpNode> for OpArg {
    fn from(n: OpNode) -> Self {
        OpArg::Node(Arc::new(n))
    }
}

impl From<bool> for OpArg {
    fn from(b: bool) -> Self {
        OpArg::Value(Value::from(b))
    }
}

impl From<i32> for OpArg {
    fn from(i: i32) -> Self {
        OpArg::Value(Value::from(i))
    }
}

impl From<i64> for OpArg {
    fn from(i: i64) -> Self {
        OpArg::Value(Value::from(i))
    }
}

impl From<u32> for OpArg {
    fn from(i: u32) -> Self {
        OpArg::Value(Value::from(i))
    }
}

impl From<u64> for OpArg {
    fn from(i: u64) -> Self {
        OpArg::Value(Value::from(i))
    }
}

impl From<&str> for OpArg {
    fn from(s: &str) -> Self {
        OpArg::Value(Value::from(s))
    }
}

impl From<BigInt> for OpArg {
    fn from(i: BigInt) -> Self {
        OpArg::Value(Value::Int(i))
    }
}

impl fmt::Display for OpArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpArg::Expr(e) => e.fmt(f),
            OpArg::Node(n) => n.fmt(f),
            OpArg::Value(v) => v.fmt(f),
        }
    }
}

/// An immutable operator application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpNode {
    op: OpCode,
    args: SmallVec<[OpArg; 4]>,
}

impl OpNode {
    /// Build a node, checking the operand count against the registry.
    pub fn new<I>(op: OpCode, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = OpArg>,
    {
        let args: SmallVec<[OpArg; 4]> = args.into_iter().collect();
        if let Some(expected) = op.arity() {
            if args.len() != expected {
                return Err(SymbexError::Arity {
                    op,
                    expected,
                    found: args.len(),
                });
            }
        }
        Ok(Self { op, args })
    }

    /// The operation tag.
    #[must_use]
    pub fn op(&self) -> OpCode {
        self.op
    }

    /// The ordered operand list.
    #[must_use]
    pub fn args(&self) -> &[OpArg] {
        &self.args
    }

    /// Evaluate the node bottom-up against an ordered backend list.
    ///
    /// Operands are realized first (handles through their realize path,
    /// nested nodes recursively, values passed through untouched), then the
    /// operator is dispatched through the resolution protocol. Results are
    /// not cached here; caching is the handle's responsibility. The manager
    /// is threaded through so that accepting backends can build the result
    /// handle; operand handles keep using their own.
    pub fn eval(&self, mgr: &ExprManager, stack: &BackendStack, cache: bool) -> Result<Expr> {
        let mut realized: SmallVec<[OpArg; 4]> = SmallVec::with_capacity(self.args.len());
        for arg in &self.args {
            match arg {
                OpArg::Expr(e) => {
                    realized.push(OpArg::Value(e.realize_with(Some(stack), cache)?));
                }
                OpArg::Node(n) => {
                    realized.push(OpArg::Expr(n.eval(mgr, stack, cache)?));
                }
                OpArg::Value(v) => realized.push(OpArg::Value(v.clone())),
            }
        }
        stack.call(mgr, self.op, &realized)
    }

    /// Bit width of the value this node produces, inferred structurally.
    ///
    /// Boolean-sorted operations have no width; width-changing operations
    /// compute theirs from their operands.
    #[must_use]
    pub fn bits(&self) -> Option<u32> {
        use OpCode::*;
        match self.op {
            Eq | Ne | Ge | Le | Gt | Lt | UGE | ULE | UGT | ULT | BoolAnd | BoolOr | BoolNot
            | BoolVal => None,
            BitVec | BitVecVal => self.args.get(1).and_then(OpArg::as_width),
            Extract => {
                let high = self.args.first().and_then(OpArg::as_width)?;
                let low = self.args.get(1).and_then(OpArg::as_width)?;
                high.checked_sub(low).map(|d| d + 1)
            }
            ZeroExt | SignExt => {
                let extra = self.args.first().and_then(OpArg::as_width)?;
                let inner = self.args.get(1).and_then(OpArg::bits)?;
                Some(inner + extra)
            }
            Concat => {
                let mut total = 0u32;
                for arg in &self.args {
                    total += arg.bits()?;
                }
                Some(total)
            }
            If => self.args.get(1).and_then(OpArg::bits),
            _ => self.args.first().and_then(OpArg::bits),
        }
    }
}

impl fmt::Display for OpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.op)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

/// Serializable mirror of an operand: handles flatten to their structural
/// or scalar form.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OpArgRepr {
    Node(OpNode),
    Value(Value),
}

impl Serialize for OpArg {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match self {
            OpArg::Node(n) => OpArgRepr::Node((**n).clone()),
            OpArg::Value(v) => OpArgRepr::Value(v.clone()),
            OpArg::Expr(e) => {
                if let Some(node) = e.cached_ast() {
                    OpArgRepr::Node((*node).clone())
                } else if let Some(v) = e.cached_native().filter(Value::is_scalar) {
                    OpArgRepr::Value(v)
                } else {
                    return Err(serde::ser::Error::custom(
                        "expression operand has no portable form; abstract it first",
                    ));
                }
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OpArg {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match OpArgRepr::deserialize(deserializer)? {
            OpArgRepr::Node(n) => OpArg::Node(Arc::new(n)),
            OpArgRepr::Value(v) => OpArg::Value(v),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_is_checked_at_construction() {
        let err = OpNode::new(OpCode::Add, vec![OpArg::from(1i64)]);
        assert!(matches!(
            err,
            Err(SymbexError::Arity {
                op: OpCode::Add,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn variadic_nodes_accept_any_count() {
        for n in 0..4usize {
            let args = (0..n).map(|i| OpArg::from(i as i64));
            assert!(OpNode::new(OpCode::BoolAnd, args).is_ok());
        }
    }

    #[test]
    fn structural_width_inference() {
        let leaf = OpNode::new(
            OpCode::BitVecVal,
            vec![OpArg::from(255i64), OpArg::from(8u32)],
        )
        .unwrap();
        assert_eq!(leaf.bits(), Some(8));

        let ext = OpNode::new(
            OpCode::ZeroExt,
            vec![OpArg::from(8u32), OpArg::from(leaf.clone())],
        )
        .unwrap();
        assert_eq!(ext.bits(), Some(16));

        let slice = OpNode::new(
            OpCode::Extract,
            vec![OpArg::from(3u32), OpArg::from(1u32), OpArg::from(leaf.clone())],
        )
        .unwrap();
        assert_eq!(slice.bits(), Some(3));

        let cat = OpNode::new(
            OpCode::Concat,
            vec![OpArg::from(leaf.clone()), OpArg::from(leaf)],
        )
        .unwrap();
        assert_eq!(cat.bits(), Some(16));
    }

    #[test]
    fn comparison_nodes_have_no_width() {
        let leaf = OpNode::new(
            OpCode::BitVecVal,
            vec![OpArg::from(1i64), OpArg::from(8u32)],
        )
        .unwrap();
        let node = OpNode::new(
            OpCode::ULT,
            vec![OpArg::from(leaf.clone()), OpArg::from(leaf)],
        )
        .unwrap();
        assert_eq!(node.bits(), None);
    }

    #[test]
    fn display_renders_prefix_form() {
        let leaf = OpNode::new(
            OpCode::BitVecVal,
            vec![OpArg::from(7i64), OpArg::from(4u32)],
        )
        .unwrap();
        assert_eq!(leaf.to_string(), "(BitVecVal 7 4)");
    }

    #[test]
    fn structural_serde_round_trip() {
        let leaf = OpNode::new(
            OpCode::BitVecVal,
            vec![OpArg::from(255i64), OpArg::from(8u32)],
        )
        .unwrap();
        let node = OpNode::new(
            OpCode::ZeroExt,
            vec![OpArg::from(8u32), OpArg::from(leaf)],
        )
        .unwrap();

        let json = serde_json::to_string(&node).unwrap();
        let back: OpNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.op(), OpCode::ZeroExt);
        assert_eq!(back.bits(), Some(16));
    }
}
