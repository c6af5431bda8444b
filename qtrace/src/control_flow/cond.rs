use itertools::Itertools;

use super::{emit_node, with_common_consts};
use crate::error::{TraceError, TraceResult};
use crate::ir::{Atom, CondNode, OpKind};
use crate::trace::{Captured, TraceContext, TracedFn, Value, LOG_TARGET};
use crate::tree::Tree;
use crate::types::ShapedType;

/// A two-way conditional, built with [`cond`] and [`Cond::otherwise`].
///
/// Both branches are traced; which one runs is decided by the predicate at
/// runtime. If the true branch returns anything, the false branch must be
/// given and return values of the same types.
#[derive(Clone, Debug)]
pub struct Cond<'f> {
    pred: Value,
    true_fn: TracedFn<'f>,
    false_fn: Option<TracedFn<'f>>,
}

/// Start a conditional on `pred` that runs `true_fn` when it holds.
///
/// Branch functions may not take arguments; they read the values they need
/// from the enclosing scope.
pub fn cond<'f>(pred: impl Into<Value>, true_fn: TracedFn<'f>) -> TraceResult<Cond<'f>> {
    check_no_arguments("True", &true_fn)?;
    Ok(Cond {
        pred: pred.into(),
        true_fn,
        false_fn: None,
    })
}

fn check_no_arguments(branch: &str, f: &TracedFn<'_>) -> TraceResult<()> {
    if f.arity() != 0 {
        return Err(TraceError::usage(format!(
            "conditional '{branch}' function is not allowed to have any arguments"
        )));
    }
    Ok(())
}

impl<'f> Cond<'f> {
    /// Run `false_fn` when the predicate does not hold.
    pub fn otherwise(mut self, false_fn: TracedFn<'f>) -> TraceResult<Self> {
        check_no_arguments("False", &false_fn)?;
        self.false_fn = Some(false_fn);
        Ok(self)
    }

    /// Trace the conditional, returning its outputs.
    pub fn call(&self, ctx: &mut TraceContext) -> TraceResult<Tree<Value>> {
        let mode = ctx.resolve_mode("cond")?;
        let pred_ty = self.pred.aval();
        if pred_ty != ShapedType::bool_scalar() {
            return Err(TraceError::type_mismatch(format!(
                "The predicate of a conditional must be a boolean scalar, got {pred_ty}."
            )));
        }

        let no_op = TracedFn::nullary("otherwise", |_| Ok(Tree::None));
        let false_fn = self.false_fn.as_ref().unwrap_or(&no_op);
        let true_branch = ctx.capture(&self.true_fn, &[], &mode)?;
        let false_branch = ctx.capture(false_fn, &[], &mode)?;
        self.check_branch_types(&true_branch, &false_branch)?;

        let out_types = true_branch.user_output_types();
        let out_tree = true_branch.out_tree.clone();
        let (programs, consts) = with_common_consts(vec![true_branch, false_branch]);
        let [true_branch, false_branch]: [_; 2] = programs
            .try_into()
            .map_err(|_| TraceError::internal("A conditional has exactly two branches."))?;
        tracing::debug!(
            target: LOG_TARGET,
            quantum = mode.is_quantum(),
            consts = consts.len(),
            "cond"
        );

        let operands = std::iter::once(self.pred.to_atom())
            .chain(consts)
            .collect::<Vec<Atom>>();
        let kind = OpKind::Conditional(CondNode {
            true_branch,
            false_branch,
            out_tree: out_tree.clone(),
        });
        emit_node(ctx, &mode, kind, operands, &out_types, &out_tree)
    }

    fn check_branch_types(&self, true_branch: &Captured, false_branch: &Captured) -> TraceResult<()> {
        let true_types = true_branch.user_output_types();
        let false_types = false_branch.user_output_types();
        if true_branch.out_tree == false_branch.out_tree && true_types == false_types {
            return Ok(());
        }
        let mut message = format!(
            "Conditional branches require the same return type, got:\n - True branch: {} [{}]\n - False branch: {} [{}]",
            true_branch.out_tree,
            true_types.iter().join(", "),
            false_branch.out_tree,
            false_types.iter().join(", "),
        );
        if self.false_fn.is_none() {
            message.push_str("\nPlease specify an else branch if none was specified.");
        }
        Err(TraceError::type_mismatch(message))
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::ir::Program;
    use crate::trace::trace_program;
    use crate::types::{DType, ValueType};

    fn constant<'f>(name: &'static str, value: i64) -> TracedFn<'f> {
        TracedFn::nullary(name, move |_| Ok(Value::from(value).into()))
    }

    fn traced(f: impl Fn(&mut TraceContext, &[Value]) -> TraceResult<Tree<Value>>) -> TraceResult<Program> {
        let outer = TracedFn::new("outer", 1, f);
        trace_program("outer", &[ShapedType::bool_scalar()], &outer)
    }

    #[test]
    fn branches_with_arguments_are_rejected() {
        let one_arg = TracedFn::new("f", 1, |_, args| Ok(args[0].clone().into()));
        assert_matches!(
            cond(true, one_arg.clone()),
            Err(TraceError::Usage { message }) => assert!(message.contains("'True'"))
        );
        assert_matches!(
            cond(true, constant("t", 1)).unwrap().otherwise(one_arg),
            Err(TraceError::Usage { message }) => assert!(message.contains("'False'"))
        );
    }

    #[test]
    fn outside_tracing_fails() {
        let c = cond(true, constant("t", 1)).unwrap();
        assert_matches!(
            c.call(&mut TraceContext::new()),
            Err(TraceError::Usage { message }) => assert!(message.contains("'cond'"))
        );
    }

    #[test]
    fn branches_share_constants() {
        let prog = traced(|ctx, args| {
            let x = ctx.convert(&args[0], DType::F64)?;
            let y = ctx.mul(&x, 3.0)?;
            let x2 = x.clone();
            let t = TracedFn::nullary("t", move |ctx| Ok(ctx.add(&x, 1.0)?.into()));
            let f = TracedFn::nullary("f", move |ctx| Ok(ctx.sub(&y, &x2)?.into()));
            cond(&args[0], t)?.otherwise(f)?.call(ctx)
        })
        .unwrap();
        assert_matches!(&prog.ops()[2].kind, OpKind::Conditional(node) => {
            assert_eq!(node.true_branch.consts(), node.false_branch.consts());
            assert_eq!(node.true_branch.consts().len(), 2);
        });
        assert_eq!(prog.ops()[2].operands.len(), 3);
    }

    #[rstest]
    #[case::dtype_differs(Value::from(1i64).into(), Value::from(2.0).into())]
    #[case::none_vs_value(Value::from(1i64).into(), Tree::None)]
    #[case::nesting_differs(Value::from(1i64).into(), Tree::leaves([Value::from(1i64)]))]
    fn mismatched_branches(#[case] t: Tree<Value>, #[case] f: Tree<Value>) {
        let err = traced(|ctx, args| {
            let (t, f) = (t.clone(), f.clone());
            cond(&args[0], TracedFn::nullary("t", move |_| Ok(t.clone())))?
                .otherwise(TracedFn::nullary("f", move |_| Ok(f.clone())))?
                .call(ctx)
        });
        assert_matches!(err, Err(TraceError::TypeMismatch { message }) => {
            assert!(message.contains("True branch"));
            assert!(!message.contains("else branch"));
        });
    }

    #[test]
    fn missing_false_branch_is_reported() {
        let err = traced(|ctx, args| cond(&args[0], constant("t", 1))?.call(ctx));
        assert_matches!(err, Err(TraceError::TypeMismatch { message }) => {
            assert!(message.contains("None"));
            assert!(message.contains("else branch"));
        });
    }

    #[test]
    fn no_outputs_needs_no_false_branch() {
        let prog = traced(|ctx, args| {
            let out = cond(&args[0], TracedFn::nullary("t", |_| Ok(Tree::None)))?.call(ctx)?;
            assert_eq!(out, Tree::None);
            Ok(Tree::None)
        })
        .unwrap();
        assert_eq!(prog.ops().len(), 1);
    }

    #[test]
    fn predicate_must_be_boolean() {
        let err = traced(|ctx, _| {
            cond(1i64, constant("t", 1))?
                .otherwise(constant("f", 2))?
                .call(ctx)
        });
        assert_matches!(err, Err(TraceError::TypeMismatch { .. }));
    }

    #[test]
    fn nested_output_structure_is_rebuilt() {
        let pair = |name: &'static str| {
            TracedFn::nullary(name, |_| {
                Ok(Tree::Tuple(vec![Value::from(1i64).into(), Tree::leaves([Value::from(0.5)])]))
            })
        };
        let prog = traced(|ctx, args| {
            let out = cond(&args[0], pair("t"))?.otherwise(pair("f"))?.call(ctx)?;
            let (leaves, def) = out.clone().flatten();
            assert_eq!(def.to_string(), "(*, (*))");
            assert_eq!(leaves.len(), 2);
            Ok(out)
        })
        .unwrap();
        assert_eq!(
            prog.output_types(),
            vec![
                ValueType::from(ShapedType::scalar(DType::I64)),
                ShapedType::scalar(DType::F64).into()
            ]
        );
    }
}
