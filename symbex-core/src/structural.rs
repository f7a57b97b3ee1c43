//! The structural backend: composition without computation.
//!
//! Accepts every registered operator by recording it as an [`OpNode`] and
//! returning an abstract handle, which is what keeps operator application
//! total even when no backend can realize the operands yet. It has no
//! native domain, so conversion, abstraction, and simplification requests
//! are rejected. In a typical chain it is registered last, behind the
//! concrete calculator and any solver backends.

use std::sync::Arc;

use crate::ast::{OpArg, OpNode};
use crate::backend::{merged_metadata, Backend, Dispatch};
use crate::error::Result;
use crate::expr::Expr;
use crate::manager::ExprManager;
use crate::op::OpCode;
use crate::value::Value;

/// Backend that answers every operator application with an AST.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralBackend;

impl Backend for StructuralBackend {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn call(&self, mgr: &ExprManager, op: OpCode, args: &[OpArg]) -> Result<Dispatch<Expr>> {
        let (mut variables, mut symbolic) = merged_metadata(args)?;

        if op == OpCode::BitVec {
            // Symbol creation: the new name is a free variable.
            match args.first() {
                Some(OpArg::Value(Value::Str(name))) => {
                    variables.insert(Arc::from(name.as_str()));
                    symbolic = true;
                }
                _ => return Ok(Dispatch::Rejected),
            }
        }

        let node = OpNode::new(op, args.iter().cloned())?;
        Ok(Dispatch::Resolved(Expr::from_node(
            mgr,
            Arc::new(node),
            variables,
            symbolic,
        )))
    }
}
