//! Persistence of expressions by stable reload key.
//!
//! The core only needs the call contract: `load` materializes a
//! fully-populated handle for a known key, `store` assigns a stable key and
//! is idempotent for an already-stored handle. Durability and transport
//! belong to the collaborator. [`MemoryStore`] is the in-process
//! implementation used by tests and single-process embedders.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SymbexError};
use crate::expr::Expr;

/// Opaque, stable identifier for a stored expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprKey(String);

impl ExprKey {
    /// Wrap a key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExprKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExprKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ExprKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The persistence collaborator contract.
pub trait ExprStore: Send + Sync {
    /// Materialize a fully-populated handle for `key`.
    fn load(&self, key: &ExprKey) -> Result<Expr>;

    /// Persist a handle, assigning (or re-using) its stable key.
    fn store(&self, expr: &Expr) -> Result<ExprKey>;
}

/// In-process expression store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<ExprKey, Expr>>,
    counter: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, FxHashMap<ExprKey, Expr>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExprStore for MemoryStore {
    fn load(&self, key: &ExprKey) -> Result<Expr> {
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| SymbexError::Persistence {
                key: key.to_string(),
            })
    }

    fn store(&self, expr: &Expr) -> Result<ExprKey> {
        if let Some(key) = expr.key() {
            if self.entries().contains_key(&key) {
                return Ok(key);
            }
        }

        // Cache the portable form before the handle is externally
        // reachable, the same way pickled expressions carried their AST.
        expr.abstractify()?;

        let key = ExprKey::new(format!("expr-{}", self.counter.fetch_add(1, Ordering::Relaxed)));
        self.entries().insert(key.clone(), expr.clone());
        expr.set_key(key.clone());
        Ok(key)
    }
}
