use itertools::Itertools;

use super::{check_carried_types, emit_node};
use crate::error::TraceResult;
use crate::ir::{ForNode, OpKind};
use crate::trace::{TraceContext, TracedFn, Value, LOG_TARGET};
use crate::tree::Tree;
use crate::types::ValueType;

/// A counted loop: `for i in range(lower, upper, step) { state = body_fn(i, state) }`.
///
/// The body takes the iteration index before the loop-carried values and
/// returns only the next carried values. Bounds may be traced; they are not
/// checked while tracing.
#[derive(Clone, Debug)]
pub struct ForLoop<'f> {
    lower: Value,
    upper: Value,
    step: Value,
    body_fn: TracedFn<'f>,
}

/// Build a counted loop from its bounds and body.
pub fn for_loop<'f>(
    lower: impl Into<Value>,
    upper: impl Into<Value>,
    step: impl Into<Value>,
    body_fn: TracedFn<'f>,
) -> ForLoop<'f> {
    ForLoop {
        lower: lower.into(),
        upper: upper.into(),
        step: step.into(),
        body_fn,
    }
}

impl ForLoop<'_> {
    /// Trace the loop starting from `init`, returning the final state.
    pub fn call(&self, ctx: &mut TraceContext, init: &[Value]) -> TraceResult<Tree<Value>> {
        let mode = ctx.resolve_mode("for_loop")?;
        // The index takes the type of the lower bound.
        let in_types = std::iter::once(&self.lower)
            .chain(init)
            .map(Value::aval)
            .collect_vec();
        let body = ctx.capture(&self.body_fn, &in_types, &mode)?;
        let carried = in_types[1..]
            .iter()
            .cloned()
            .map(ValueType::from)
            .collect_vec();
        check_carried_types("for loop", &carried, &body)?;
        tracing::debug!(
            target: LOG_TARGET,
            quantum = mode.is_quantum(),
            body_consts = body.consts.len(),
            "for_loop"
        );

        let operands = [&self.lower, &self.upper, &self.step]
            .into_iter()
            .map(Value::to_atom)
            .chain(body.consts.iter().cloned())
            .chain(init.iter().map(Value::to_atom))
            .collect();
        let kind = OpKind::CountedLoop(ForNode {
            body_consts: body.consts.len(),
            body: body.program,
            out_tree: body.out_tree.clone(),
        });
        emit_node(ctx, &mode, kind, operands, &carried, &body.out_tree)
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::error::TraceError;
    use crate::ir::{Atom, Literal};
    use crate::trace::trace_program;
    use crate::types::{DType, ShapedType};

    fn accumulate<'f>() -> TracedFn<'f> {
        TracedFn::new("body", 2, |ctx, args| Ok(ctx.add(&args[1], &args[0])?.into()))
    }

    #[test]
    fn index_is_not_carried() {
        let outer = TracedFn::nullary("outer", |ctx| {
            for_loop(0, 5, 1, accumulate()).call(ctx, &[Value::from(0)])
        });
        let prog = trace_program("outer", &[], &outer).unwrap();
        let op = &prog.ops()[0];
        assert_matches!(&op.kind, OpKind::CountedLoop(node) => {
            assert_eq!(node.body_consts, 0);
            assert_eq!(node.body.inputs().len(), 2);
            assert_eq!(node.body.output_types().len(), 1);
        });
        assert_eq!(
            op.operands[..3],
            [Literal::Int(0), Literal::Int(5), Literal::Int(1)].map(Atom::from)
        );
        assert_eq!(op.results.len(), 1);
    }

    #[test]
    fn traced_bounds_are_operands() {
        let outer = TracedFn::new("outer", 1, |ctx, args| {
            for_loop(0, &args[0], 2, accumulate()).call(ctx, &[Value::from(0)])
        });
        let prog =
            trace_program("outer", &[ShapedType::scalar(DType::I64)], &outer).unwrap();
        assert_eq!(prog.ops()[0].operands[1], prog.inputs()[0].clone().into());
    }

    #[test]
    fn body_arity_must_match() {
        let outer = TracedFn::nullary("outer", |ctx| {
            for_loop(0, 5, 1, accumulate()).call(ctx, &[Value::from(0), Value::from(1)])
        });
        assert_matches!(
            trace_program("outer", &[], &outer),
            Err(TraceError::Usage { .. })
        );
    }

    #[test]
    fn body_returning_the_index_is_rejected() {
        let body = TracedFn::new("body", 2, |_, args| Ok(Tree::leaves(args.to_vec())));
        let outer = TracedFn::nullary("outer", |ctx| {
            for_loop(0, 5, 1, body.clone()).call(ctx, &[Value::from(0.0)])
        });
        assert_matches!(
            trace_program("outer", &[], &outer),
            Err(TraceError::TypeMismatch { .. })
        );
    }
}
