//! Realized values: plain scalars and backend-native objects.
//!
//! A [`Value`] is what an expression holds once some backend has realized
//! it. Plain scalars (booleans, integers, text) are first-class so the
//! scalar fast path can operate on them without backend dispatch;
//! everything else is an opaque [`NativeValue`] owned by whichever backend
//! produced it, reachable only by downcasting.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Set of free-variable names an expression depends on.
pub type VarSet = FxHashSet<Arc<str>>;

/// Object trait for backend-native values.
///
/// Backends wrap their domain values (a concrete bit-vector, a solver term)
/// in this trait so the core can carry them without knowing their type.
pub trait BackendValue: fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Bit width of the value, when it has one.
    fn bits(&self) -> Option<u32> {
        None
    }

    /// Structural equality against another native value.
    ///
    /// Values of different backends compare unequal.
    fn dyn_eq(&self, other: &dyn BackendValue) -> bool;
}

/// Shared handle to a backend-native value.
#[derive(Debug, Clone)]
pub struct NativeValue(Arc<dyn BackendValue>);

impl NativeValue {
    /// Wrap a backend value.
    pub fn new<T: BackendValue>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Downcast to a concrete backend value type.
    #[must_use]
    pub fn downcast_ref<T: BackendValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }

    /// Bit width hint from the underlying value.
    #[must_use]
    pub fn bits(&self) -> Option<u32> {
        self.0.bits()
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(&*other.0)
    }
}

/// A realized expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain truth value.
    Bool(bool),
    /// Plain arbitrary-precision integer.
    Int(BigInt),
    /// Plain text.
    Str(String),
    /// Backend-native object.
    Native(NativeValue),
}

impl Value {
    /// True for the plain-scalar cases eligible for the fast path.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Native(_))
    }

    /// The boolean payload, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// The text payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The native payload, if this is a backend object.
    #[must_use]
    pub fn as_native(&self) -> Option<&NativeValue> {
        match self {
            Value::Native(n) => Some(n),
            _ => None,
        }
    }

    /// Downcast a native payload to a concrete backend value type.
    #[must_use]
    pub fn downcast_ref<T: BackendValue>(&self) -> Option<&T> {
        self.as_native().and_then(NativeValue::downcast_ref)
    }

    /// Bit width of the value, when it has one.
    #[must_use]
    pub fn bits(&self) -> Option<u32> {
        match self {
            Value::Native(n) => n.bits(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Native(n) => n.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NativeValue> for Value {
    fn from(n: NativeValue) -> Self {
        Value::Native(n)
    }
}

/// Serializable mirror of the scalar cases.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ScalarRepr {
    Bool(bool),
    Int(BigInt),
    Str(String),
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match self {
            Value::Bool(b) => ScalarRepr::Bool(*b),
            Value::Int(i) => ScalarRepr::Int(i.clone()),
            Value::Str(s) => ScalarRepr::Str(s.clone()),
            Value::Native(n) => {
                return Err(serde::ser::Error::custom(format!(
                    "backend-native value {n} is not serializable; abstract it first"
                )))
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match ScalarRepr::deserialize(deserializer)? {
            ScalarRepr::Bool(b) => Value::Bool(b),
            ScalarRepr::Int(i) => Value::Int(i),
            ScalarRepr::Str(s) => Value::Str(s),
        })
    }
}
