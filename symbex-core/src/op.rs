//! The operator registry.
//!
//! A closed set of operation tags, plus the static, process-wide metadata
//! every dispatch path consults: the operator family, the fixed arity
//! (variadic operations report `None`), the opposite tag for reflectable
//! operators, and the native fast-path function over plain scalars.
//!
//! The registry is configuration data, not state: all of it lives in
//! `match` tables on [`OpCode`] and never changes at runtime.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SymbexError};
use crate::value::Value;

/// Operator family, mirroring how backends group capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpFamily {
    /// Wrapping arithmetic over same-width operands.
    Arithmetic,
    /// Signed orderings plus pattern (in)equality.
    Comparison,
    /// Bit-pattern operations and shifts.
    Bitwise,
    /// Unsigned orderings, dispatched by name.
    BackendComparison,
    /// Named bit operations (rotations, logical shift).
    BackendBitwise,
    /// Combinators over plain truth values.
    Boolean,
    /// Width-changing structural operations.
    Structural,
    /// Value-construction operations.
    Creation,
}

/// Native fast-path function over plain scalars.
///
/// Returns `None` when the operand types are not ones the native operator
/// understands, in which case the caller falls back to backend dispatch.
pub type ScalarFn = fn(&[Value]) -> Option<Result<Value>>;

/// A symbolic operation tag drawn from the closed registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OpCode {
    // arithmetic
    Add,
    RAdd,
    Sub,
    RSub,
    Mul,
    RMul,
    Div,
    RDiv,
    Mod,
    RMod,

    // comparison
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,

    // bitwise
    Neg,
    Invert,
    And,
    RAnd,
    Or,
    ROr,
    Xor,
    RXor,
    Shl,
    RShl,
    Shr,
    RShr,

    // unsigned comparisons, dispatched by name
    UGE,
    ULE,
    UGT,
    ULT,

    // named bit operations
    RotateLeft,
    RotateRight,
    LShR,

    // boolean combinators
    BoolAnd,
    BoolOr,
    BoolNot,
    If,

    // structural
    Concat,
    Extract,
    SignExt,
    ZeroExt,

    // creation
    BoolVal,
    BitVec,
    BitVecVal,
}

impl OpCode {
    /// Every registered operation, in registry order.
    pub const ALL: &'static [OpCode] = &[
        OpCode::Add,
        OpCode::RAdd,
        OpCode::Sub,
        OpCode::RSub,
        OpCode::Mul,
        OpCode::RMul,
        OpCode::Div,
        OpCode::RDiv,
        OpCode::Mod,
        OpCode::RMod,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Ge,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Lt,
        OpCode::Neg,
        OpCode::Invert,
        OpCode::And,
        OpCode::RAnd,
        OpCode::Or,
        OpCode::ROr,
        OpCode::Xor,
        OpCode::RXor,
        OpCode::Shl,
        OpCode::RShl,
        OpCode::Shr,
        OpCode::RShr,
        OpCode::UGE,
        OpCode::ULE,
        OpCode::UGT,
        OpCode::ULT,
        OpCode::RotateLeft,
        OpCode::RotateRight,
        OpCode::LShR,
        OpCode::BoolAnd,
        OpCode::BoolOr,
        OpCode::BoolNot,
        OpCode::If,
        OpCode::Concat,
        OpCode::Extract,
        OpCode::SignExt,
        OpCode::ZeroExt,
        OpCode::BoolVal,
        OpCode::BitVec,
        OpCode::BitVecVal,
    ];

    /// Stable name used in rendered ASTs and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Add => "add",
            OpCode::RAdd => "radd",
            OpCode::Sub => "sub",
            OpCode::RSub => "rsub",
            OpCode::Mul => "mul",
            OpCode::RMul => "rmul",
            OpCode::Div => "div",
            OpCode::RDiv => "rdiv",
            OpCode::Mod => "mod",
            OpCode::RMod => "rmod",
            OpCode::Eq => "eq",
            OpCode::Ne => "ne",
            OpCode::Ge => "ge",
            OpCode::Le => "le",
            OpCode::Gt => "gt",
            OpCode::Lt => "lt",
            OpCode::Neg => "neg",
            OpCode::Invert => "invert",
            OpCode::And => "and",
            OpCode::RAnd => "rand",
            OpCode::Or => "or",
            OpCode::ROr => "ror",
            OpCode::Xor => "xor",
            OpCode::RXor => "rxor",
            OpCode::Shl => "shl",
            OpCode::RShl => "rshl",
            OpCode::Shr => "shr",
            OpCode::RShr => "rshr",
            OpCode::UGE => "UGE",
            OpCode::ULE => "ULE",
            OpCode::UGT => "UGT",
            OpCode::ULT => "ULT",
            OpCode::RotateLeft => "RotateLeft",
            OpCode::RotateRight => "RotateRight",
            OpCode::LShR => "LShR",
            OpCode::BoolAnd => "And",
            OpCode::BoolOr => "Or",
            OpCode::BoolNot => "Not",
            OpCode::If => "If",
            OpCode::Concat => "Concat",
            OpCode::Extract => "Extract",
            OpCode::SignExt => "SignExt",
            OpCode::ZeroExt => "ZeroExt",
            OpCode::BoolVal => "BoolVal",
            OpCode::BitVec => "BitVec",
            OpCode::BitVecVal => "BitVecVal",
        }
    }

    /// The family this operation belongs to.
    #[must_use]
    pub fn family(self) -> OpFamily {
        use OpCode::*;
        match self {
            Add | RAdd | Sub | RSub | Mul | RMul | Div | RDiv | Mod | RMod => OpFamily::Arithmetic,
            Eq | Ne | Ge | Le | Gt | Lt => OpFamily::Comparison,
            Neg | Invert | And | RAnd | Or | ROr | Xor | RXor | Shl | RShl | Shr | RShr => {
                OpFamily::Bitwise
            }
            UGE | ULE | UGT | ULT => OpFamily::BackendComparison,
            RotateLeft | RotateRight | LShR => OpFamily::BackendBitwise,
            BoolAnd | BoolOr | BoolNot | If => OpFamily::Boolean,
            Concat | Extract | SignExt | ZeroExt => OpFamily::Structural,
            BoolVal | BitVec | BitVecVal => OpFamily::Creation,
        }
    }

    /// Fixed operand count, or `None` for the variadic operations.
    #[must_use]
    pub fn arity(self) -> Option<usize> {
        use OpCode::*;
        match self {
            Concat | BoolAnd | BoolOr => None,
            Neg | Invert | BoolNot | BoolVal => Some(1),
            If | Extract => Some(3),
            _ => Some(2),
        }
    }

    /// The opposite operation for reflectable operators.
    ///
    /// Applying the opposite with swapped operands is equivalent to the
    /// original call. The unary operations and the name-dispatched backend
    /// operations have no opposite.
    #[must_use]
    pub fn opposite(self) -> Option<OpCode> {
        use OpCode::*;
        Some(match self {
            Add => RAdd,
            RAdd => Add,
            Sub => RSub,
            RSub => Sub,
            Mul => RMul,
            RMul => Mul,
            Div => RDiv,
            RDiv => Div,
            Mod => RMod,
            RMod => Mod,
            Eq => Eq,
            Ne => Ne,
            Ge => Le,
            Le => Ge,
            Gt => Lt,
            Lt => Gt,
            And => RAnd,
            RAnd => And,
            Or => ROr,
            ROr => Or,
            Xor => RXor,
            RXor => Xor,
            Shl => RShl,
            RShl => Shl,
            Shr => RShr,
            RShr => Shr,
            _ => return None,
        })
    }

    /// Whether this is the reflected form of another operator.
    #[must_use]
    pub fn is_reflected(self) -> bool {
        matches!(
            self,
            OpCode::RAdd
                | OpCode::RSub
                | OpCode::RMul
                | OpCode::RDiv
                | OpCode::RMod
                | OpCode::RAnd
                | OpCode::ROr
                | OpCode::RXor
                | OpCode::RShl
                | OpCode::RShr
        )
    }

    /// Native fast-path function over plain scalars, when one exists.
    ///
    /// Only the base operator families have native forms; the reflected and
    /// name-dispatched operations always go through backends.
    #[must_use]
    pub fn scalar_fn(self) -> Option<ScalarFn> {
        use OpCode::*;
        Some(match self {
            Add => sc_add,
            Sub => sc_sub,
            Mul => sc_mul,
            Div => sc_div,
            Mod => sc_mod,
            Eq => sc_eq,
            Ne => sc_ne,
            Ge => sc_ge,
            Le => sc_le,
            Gt => sc_gt,
            Lt => sc_lt,
            Neg => sc_neg,
            Invert => sc_invert,
            And => sc_and,
            Or => sc_or,
            Xor => sc_xor,
            Shl => sc_shl,
            Shr => sc_shr,
            _ => return None,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn shift_amount(amount: &BigInt) -> Result<usize> {
    if amount.is_negative() {
        return Err(SymbexError::InvalidShift {
            amount: amount.clone(),
        });
    }
    amount.to_usize().ok_or_else(|| SymbexError::InvalidShift {
        amount: amount.clone(),
    })
}

fn sc_add(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a + b))),
        [Value::Str(a), Value::Str(b)] => Some(Ok(Value::Str(format!("{a}{b}")))),
        _ => None,
    }
}

fn sc_sub(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a - b))),
        _ => None,
    }
}

fn sc_mul(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a * b))),
        _ => None,
    }
}

fn sc_div(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(_), Value::Int(b)] if b == &BigInt::from(0) => {
            Some(Err(SymbexError::DivisionByZero))
        }
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a / b))),
        _ => None,
    }
}

fn sc_mod(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(_), Value::Int(b)] if b == &BigInt::from(0) => {
            Some(Err(SymbexError::DivisionByZero))
        }
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a % b))),
        _ => None,
    }
}

fn sc_eq(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [a, b] if a.is_scalar() && b.is_scalar() => Some(Ok(Value::Bool(a == b))),
        _ => None,
    }
}

fn sc_ne(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [a, b] if a.is_scalar() && b.is_scalar() => Some(Ok(Value::Bool(a != b))),
        _ => None,
    }
}

fn sc_ge(args: &[Value]) -> Option<Result<Value>> {
    scalar_ord(args, |o| o.is_ge())
}

fn sc_le(args: &[Value]) -> Option<Result<Value>> {
    scalar_ord(args, |o| o.is_le())
}

fn sc_gt(args: &[Value]) -> Option<Result<Value>> {
    scalar_ord(args, |o| o.is_gt())
}

fn sc_lt(args: &[Value]) -> Option<Result<Value>> {
    scalar_ord(args, |o| o.is_lt())
}

fn scalar_ord(args: &[Value], f: fn(std::cmp::Ordering) -> bool) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Bool(f(a.cmp(b))))),
        [Value::Str(a), Value::Str(b)] => Some(Ok(Value::Bool(f(a.cmp(b))))),
        _ => None,
    }
}

fn sc_neg(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a)] => Some(Ok(Value::Int(-a))),
        _ => None,
    }
}

fn sc_invert(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a)] => Some(Ok(Value::Int(-a - BigInt::from(1)))),
        _ => None,
    }
}

fn sc_and(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a & b))),
        [Value::Bool(a), Value::Bool(b)] => Some(Ok(Value::Bool(a & b))),
        _ => None,
    }
}

fn sc_or(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a | b))),
        [Value::Bool(a), Value::Bool(b)] => Some(Ok(Value::Bool(a | b))),
        _ => None,
    }
}

fn sc_xor(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(Ok(Value::Int(a ^ b))),
        [Value::Bool(a), Value::Bool(b)] => Some(Ok(Value::Bool(a ^ b))),
        _ => None,
    }
}

fn sc_shl(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(shift_amount(b).map(|n| Value::Int(a << n))),
        _ => None,
    }
}

fn sc_shr(args: &[Value]) -> Option<Result<Value>> {
    match args {
        [Value::Int(a), Value::Int(b)] => Some(shift_amount(b).map(|n| Value::Int(a >> n))),
        _ => None,
    }
}
