//! The concrete backend: the always-available calculator.
//!
//! Realizes operations whose operands are all concrete — bit-vector
//! values, plain integers (promoted to the partner's width), booleans, and
//! text. Anything symbolic, deferred, or foreign is rejected so the next
//! backend in the chain can have it. Width mismatches and division by zero
//! are hard errors, not rejections: no later backend is allowed to paper
//! over them.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use symbex_core::{
    merged_metadata, Abstraction, Backend, Dispatch, Expr, ExprManager, NativeValue, OpArg,
    OpCode, OpNode, Result, SymbexError, Value,
};

use crate::value::Bv;

/// Backend that computes over concrete values.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcreteBackend;

/// A concretized operand.
#[derive(Debug, Clone)]
enum CVal {
    Bv(Bv),
    Bool(bool),
    Int(BigInt),
    Str(String),
}

impl CVal {
    fn lower(value: &Value) -> Option<CVal> {
        match value {
            Value::Bool(b) => Some(CVal::Bool(*b)),
            Value::Int(i) => Some(CVal::Int(i.clone())),
            Value::Str(s) => Some(CVal::Str(s.clone())),
            Value::Native(n) => n.downcast_ref::<Bv>().cloned().map(CVal::Bv),
        }
    }

    fn lift(self) -> Value {
        match self {
            CVal::Bv(bv) => Value::Native(NativeValue::new(bv)),
            CVal::Bool(b) => Value::Bool(b),
            CVal::Int(i) => Value::Int(i),
            CVal::Str(s) => Value::Str(s),
        }
    }
}

/// Both operands as same-width bit-vectors, promoting a plain integer to
/// its partner's width.
fn promote(a: CVal, b: CVal) -> Result<Option<(Bv, Bv)>> {
    Ok(Some(match (a, b) {
        (CVal::Bv(a), CVal::Bv(b)) => (a, b),
        (CVal::Bv(a), CVal::Int(i)) => {
            let b = Bv::new(i, a.width())?;
            (a, b)
        }
        (CVal::Int(i), CVal::Bv(b)) => {
            let a = Bv::new(i, b.width())?;
            (a, b)
        }
        _ => return Ok(None),
    }))
}

fn two(vals: Vec<CVal>) -> Option<(CVal, CVal)> {
    let mut it = vals.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Some((a, b)),
        _ => None,
    }
}

fn as_u32(v: &CVal) -> Option<u32> {
    match v {
        CVal::Int(i) => i.to_u32(),
        _ => None,
    }
}

fn rotation_amount(v: &CVal) -> Option<BigInt> {
    match v {
        CVal::Int(i) => Some(i.clone()),
        CVal::Bv(bv) => Some(BigInt::from(bv.unsigned().clone())),
        _ => None,
    }
}

type BvBinOp = fn(&Bv, &Bv) -> Result<Bv>;
type IntBinOp = fn(&BigInt, &BigInt) -> Result<BigInt>;
type BvCmp = fn(&Bv, &Bv) -> Result<bool>;

fn int_div(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(SymbexError::DivisionByZero);
    }
    Ok(a / b)
}

fn int_rem(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(SymbexError::DivisionByZero);
    }
    Ok(a % b)
}

fn int_shift(b: &BigInt) -> Result<usize> {
    if b.is_negative() {
        return Err(SymbexError::InvalidShift { amount: b.clone() });
    }
    b.to_usize()
        .ok_or_else(|| SymbexError::InvalidShift { amount: b.clone() })
}

fn int_shl(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    Ok(a << int_shift(b)?)
}

fn int_shr(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    Ok(a >> int_shift(b)?)
}

impl ConcreteBackend {
    fn concretize(args: &[OpArg]) -> Option<Vec<CVal>> {
        args.iter()
            .map(|arg| {
                let value = match arg {
                    OpArg::Value(v) => v.clone(),
                    OpArg::Expr(e) => e.cached_native()?,
                    OpArg::Node(_) => return None,
                };
                CVal::lower(&value)
            })
            .collect()
    }

    fn binary(vals: Vec<CVal>, bv_op: BvBinOp, int_op: IntBinOp) -> Result<Option<CVal>> {
        let Some((a, b)) = two(vals) else {
            return Ok(None);
        };
        if let (CVal::Int(a), CVal::Int(b)) = (&a, &b) {
            return Ok(Some(CVal::Int(int_op(a, b)?)));
        }
        match promote(a, b)? {
            Some((a, b)) => Ok(Some(CVal::Bv(bv_op(&a, &b)?))),
            None => Ok(None),
        }
    }

    fn compare(vals: Vec<CVal>, bv_cmp: BvCmp, ord: fn(std::cmp::Ordering) -> bool) -> Result<Option<CVal>> {
        let Some((a, b)) = two(vals) else {
            return Ok(None);
        };
        match (&a, &b) {
            (CVal::Int(x), CVal::Int(y)) => return Ok(Some(CVal::Bool(ord(x.cmp(y))))),
            (CVal::Str(x), CVal::Str(y)) => return Ok(Some(CVal::Bool(ord(x.cmp(y))))),
            _ => {}
        }
        match promote(a, b)? {
            Some((a, b)) => Ok(Some(CVal::Bool(bv_cmp(&a, &b)?))),
            None => Ok(None),
        }
    }

    fn equality(vals: Vec<CVal>, negate: bool) -> Result<Option<CVal>> {
        let Some((a, b)) = two(vals) else {
            return Ok(None);
        };
        match (&a, &b) {
            (CVal::Bool(x), CVal::Bool(y)) => return Ok(Some(CVal::Bool((x == y) != negate))),
            (CVal::Int(x), CVal::Int(y)) => return Ok(Some(CVal::Bool((x == y) != negate))),
            (CVal::Str(x), CVal::Str(y)) => return Ok(Some(CVal::Bool((x == y) != negate))),
            _ => {}
        }
        match promote(a, b)? {
            Some((a, b)) => Ok(Some(CVal::Bool(a.eq_(&b)? != negate))),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn apply(op: OpCode, mut vals: Vec<CVal>) -> Result<Option<CVal>> {
        use OpCode::*;

        // A reflected operation is its base form with swapped operands.
        let op = if op.is_reflected() {
            let Some(base) = op.opposite() else {
                return Ok(None);
            };
            if vals.len() == 2 {
                vals.swap(0, 1);
            }
            base
        } else {
            op
        };

        match op {
            Add => Self::binary(vals, Bv::add, |a, b| Ok(a + b)),
            Sub => Self::binary(vals, Bv::sub, |a, b| Ok(a - b)),
            Mul => Self::binary(vals, Bv::mul, |a, b| Ok(a * b)),
            Div => Self::binary(vals, Bv::div, int_div),
            Mod => Self::binary(vals, Bv::rem, int_rem),
            And => Self::binary(vals, Bv::and, |a, b| Ok(a & b)),
            Or => Self::binary(vals, Bv::or, |a, b| Ok(a | b)),
            Xor => Self::binary(vals, Bv::xor, |a, b| Ok(a ^ b)),
            Shl => Self::binary(vals, Bv::shl, int_shl),
            Shr => Self::binary(vals, Bv::shr, int_shr),
            LShR => {
                let Some((a, b)) = two(vals) else {
                    return Ok(None);
                };
                match promote(a, b)? {
                    Some((a, b)) => Ok(Some(CVal::Bv(a.lshr(&b)?))),
                    None => Ok(None),
                }
            }

            Eq => Self::equality(vals, false),
            Ne => Self::equality(vals, true),
            Ge => Self::compare(vals, Bv::sge, |o| o.is_ge()),
            Le => Self::compare(vals, Bv::sle, |o| o.is_le()),
            Gt => Self::compare(vals, Bv::sgt, |o| o.is_gt()),
            Lt => Self::compare(vals, Bv::slt, |o| o.is_lt()),
            UGE => Self::compare(vals, Bv::uge, |o| o.is_ge()),
            ULE => Self::compare(vals, Bv::ule, |o| o.is_le()),
            UGT => Self::compare(vals, Bv::ugt, |o| o.is_gt()),
            ULT => Self::compare(vals, Bv::ult, |o| o.is_lt()),

            Neg => match vals.as_slice() {
                [CVal::Bv(v)] => Ok(Some(CVal::Bv(v.neg()))),
                [CVal::Int(i)] => Ok(Some(CVal::Int(-i))),
                _ => Ok(None),
            },
            Invert => match vals.as_slice() {
                [CVal::Bv(v)] => Ok(Some(CVal::Bv(v.invert()))),
                [CVal::Int(i)] => Ok(Some(CVal::Int(-i - BigInt::from(1)))),
                _ => Ok(None),
            },

            RotateLeft | RotateRight => {
                let Some((a, b)) = two(vals) else {
                    return Ok(None);
                };
                let (CVal::Bv(v), Some(amount)) = (&a, rotation_amount(&b)) else {
                    return Ok(None);
                };
                Ok(Some(CVal::Bv(if op == RotateLeft {
                    v.rotate_left(&amount)
                } else {
                    v.rotate_right(&amount)
                })))
            }

            Concat => {
                let parts: Option<Vec<Bv>> = vals
                    .iter()
                    .map(|v| match v {
                        CVal::Bv(bv) => Some(bv.clone()),
                        _ => None,
                    })
                    .collect();
                match parts {
                    Some(parts) => Ok(Some(CVal::Bv(Bv::concat(&parts)?))),
                    None => Ok(None),
                }
            }
            Extract => match vals.as_slice() {
                [high, low, CVal::Bv(v)] => {
                    let (Some(high), Some(low)) = (as_u32(high), as_u32(low)) else {
                        return Ok(None);
                    };
                    Ok(Some(CVal::Bv(v.extract(high, low)?)))
                }
                _ => Ok(None),
            },
            ZeroExt => match vals.as_slice() {
                [extra, CVal::Bv(v)] => match as_u32(extra) {
                    Some(extra) => Ok(Some(CVal::Bv(v.zero_ext(extra)))),
                    None => Ok(None),
                },
                _ => Ok(None),
            },
            SignExt => match vals.as_slice() {
                [extra, CVal::Bv(v)] => match as_u32(extra) {
                    Some(extra) => Ok(Some(CVal::Bv(v.sign_ext(extra)))),
                    None => Ok(None),
                },
                _ => Ok(None),
            },

            If => {
                let mut it = vals.into_iter();
                match (it.next(), it.next(), it.next(), it.next()) {
                    (Some(CVal::Bool(c)), Some(t), Some(e), None) => {
                        Ok(Some(if c { t } else { e }))
                    }
                    _ => Ok(None),
                }
            }
            BoolAnd => {
                let mut acc = true;
                for v in &vals {
                    match v {
                        CVal::Bool(b) => acc &= b,
                        _ => return Ok(None),
                    }
                }
                Ok(Some(CVal::Bool(acc)))
            }
            BoolOr => {
                let mut acc = false;
                for v in &vals {
                    match v {
                        CVal::Bool(b) => acc |= b,
                        _ => return Ok(None),
                    }
                }
                Ok(Some(CVal::Bool(acc)))
            }
            BoolNot => match vals.as_slice() {
                [CVal::Bool(b)] => Ok(Some(CVal::Bool(!b))),
                _ => Ok(None),
            },

            BoolVal => match vals.as_slice() {
                [CVal::Bool(b)] => Ok(Some(CVal::Bool(*b))),
                _ => Ok(None),
            },
            BitVecVal => match vals.as_slice() {
                [CVal::Int(v), width] => match as_u32(width) {
                    Some(width) => Ok(Some(CVal::Bv(Bv::new(v.clone(), width)?))),
                    None => Ok(None),
                },
                _ => Ok(None),
            },
            // A free symbol has no concrete realization.
            BitVec => Ok(None),

            // Reflected forms were rewritten above.
            RAdd | RSub | RMul | RDiv | RMod | RAnd | ROr | RXor | RShl | RShr => Ok(None),
        }
    }
}

impl Backend for ConcreteBackend {
    fn name(&self) -> &'static str {
        "concrete"
    }

    fn call(&self, mgr: &ExprManager, op: OpCode, args: &[OpArg]) -> Result<Dispatch<Expr>> {
        let Some(vals) = Self::concretize(args) else {
            tracing::trace!(%op, "operand is not concrete");
            return Ok(Dispatch::Rejected);
        };
        match Self::apply(op, vals)? {
            Some(result) => {
                let (variables, symbolic) = merged_metadata(args)?;
                Ok(Dispatch::Resolved(Expr::from_value(
                    mgr,
                    result.lift(),
                    variables,
                    symbolic,
                )))
            }
            None => Ok(Dispatch::Rejected),
        }
    }

    fn convert(&self, value: &Value) -> Result<Dispatch<Value>> {
        match value {
            Value::Native(n) if n.downcast_ref::<Bv>().is_none() => Ok(Dispatch::Rejected),
            _ => Ok(Dispatch::Resolved(value.clone())),
        }
    }

    fn abstractify(&self, value: &Value) -> Result<Dispatch<Abstraction>> {
        let node = match value {
            Value::Native(n) => match n.downcast_ref::<Bv>() {
                Some(bv) => OpNode::new(
                    OpCode::BitVecVal,
                    [
                        OpArg::from(BigInt::from(bv.unsigned().clone())),
                        OpArg::from(bv.width()),
                    ],
                )?,
                None => return Ok(Dispatch::Rejected),
            },
            Value::Bool(b) => OpNode::new(OpCode::BoolVal, [OpArg::from(*b)])?,
            _ => return Ok(Dispatch::Rejected),
        };
        Ok(Dispatch::Resolved(Abstraction {
            node: Arc::new(node),
            variables: Default::default(),
            symbolic: false,
        }))
    }

    fn simplify(&self, _mgr: &ExprManager, expr: &Expr) -> Result<Dispatch<Expr>> {
        // A realized handle is already irreducible.
        if expr.cached_native().is_some() {
            Ok(Dispatch::Resolved(expr.clone()))
        } else {
            Ok(Dispatch::Rejected)
        }
    }
}
