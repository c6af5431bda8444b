use itertools::Itertools;

use super::{check_carried_types, emit_node};
use crate::error::{TraceError, TraceResult};
use crate::ir::{OpKind, WhileNode};
use crate::trace::{TraceContext, TraceMode, TracedFn, Value, LOG_TARGET};
use crate::tree::Tree;
use crate::types::{ShapedType, ValueType};

/// A while loop: `while cond_fn(state) { state = body_fn(state) }`.
///
/// Both functions take the loop-carried values as arguments. The predicate
/// must return a single boolean scalar; the body returns the next state.
#[derive(Clone, Debug)]
pub struct WhileLoop<'f> {
    cond_fn: TracedFn<'f>,
    body_fn: TracedFn<'f>,
}

/// Build a while loop from its predicate and body.
pub fn while_loop<'f>(cond_fn: TracedFn<'f>, body_fn: TracedFn<'f>) -> WhileLoop<'f> {
    WhileLoop { cond_fn, body_fn }
}

impl WhileLoop<'_> {
    /// Trace the loop starting from `init`, returning the final state.
    pub fn call(&self, ctx: &mut TraceContext, init: &[Value]) -> TraceResult<Tree<Value>> {
        let mode = ctx.resolve_mode("while_loop")?;
        let in_types = init.iter().map(Value::aval).collect_vec();

        // The predicate only reads the carried values, never the register.
        let cond = ctx.capture(&self.cond_fn, &in_types, &TraceMode::Classical)?;
        if !cond.out_tree.is_leaf() || cond.program.outputs().len() != 1 {
            return Err(TraceError::type_mismatch(format!(
                "cond_fun must return a boolean scalar, but got pytree {}.",
                cond.out_tree
            )));
        }
        let pred_types = cond.program.output_types();
        if pred_types != [ValueType::from(ShapedType::bool_scalar())] {
            return Err(TraceError::type_mismatch(format!(
                "cond_fun must return a boolean scalar, but got output type(s) [{}].",
                pred_types.iter().join(", ")
            )));
        }

        let body = ctx.capture(&self.body_fn, &in_types, &mode)?;
        let carried = in_types.into_iter().map(ValueType::from).collect_vec();
        check_carried_types("while loop", &carried, &body)?;
        tracing::debug!(
            target: LOG_TARGET,
            quantum = mode.is_quantum(),
            cond_consts = cond.consts.len(),
            body_consts = body.consts.len(),
            "while_loop"
        );

        let operands = cond
            .consts
            .iter()
            .chain(&body.consts)
            .cloned()
            .chain(init.iter().map(Value::to_atom))
            .collect();
        let kind = OpKind::WhileLoop(WhileNode {
            cond_consts: cond.consts.len(),
            body_consts: body.consts.len(),
            cond: cond.program,
            body: body.program,
            out_tree: body.out_tree.clone(),
        });
        emit_node(ctx, &mode, kind, operands, &carried, &body.out_tree)
    }
}
