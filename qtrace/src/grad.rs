//! Differentiation requests.
//!
//! A [`Grad`] wraps a quantum function or an arbitrary traced function, and
//! emits a single [`OpKind::Gradient`] node when called. Plain functions are
//! first wrapped in a [`Function`], so that the differentiated program is always
//! one function call.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::{format_smolstr, SmolStr};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{TraceError, TraceResult};
use crate::ir::{CallNode, GradNode, OpKind, Program};
use crate::quantum::qfunc::{shaped_outputs, QFunc};
use crate::trace::{Threading, TraceContext, TraceMode, TracedFn, Value, LOG_TARGET};
use crate::tree::Tree;

/// Step size used by finite differences when none is given.
pub const DEFAULT_FD_STEP: f64 = 1e-7;

/// Differentiation methods.
#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Display,
    IntoStaticStr,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiffMethod {
    /// Finite differences.
    Fd,
    /// Parameter shift.
    Ps,
    /// Adjoint.
    Adj,
}

/// One argument index or several.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgNum {
    /// A single index.
    One(usize),
    /// A list of indices.
    Many(Vec<usize>),
}

impl ArgNum {
    /// The indices as a list.
    pub fn into_vec(self) -> Vec<usize> {
        match self {
            ArgNum::One(i) => vec![i],
            ArgNum::Many(is) => is,
        }
    }
}

impl From<usize> for ArgNum {
    fn from(i: usize) -> Self {
        ArgNum::One(i)
    }
}

impl From<Vec<usize>> for ArgNum {
    fn from(is: Vec<usize>) -> Self {
        ArgNum::Many(is)
    }
}

/// Unvalidated options of [`grad`].
///
/// Fields are loosely typed so that options read from untyped sources are
/// validated the same way as options built in code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradOptions {
    /// Differentiation method, one of `fd`, `ps` or `adj`. Defaults to `fd`.
    pub method: Option<String>,
    /// Finite-difference step size. Must be a number.
    pub h: Option<serde_json::Value>,
    /// Indices of the arguments to differentiate. Defaults to `[0]`.
    pub argnum: Option<ArgNum>,
}

impl GradOptions {
    /// Set the differentiation method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the step size.
    pub fn with_h(mut self, h: impl Into<serde_json::Value>) -> Self {
        self.h = Some(h.into());
        self
    }

    /// Set the argument indices.
    pub fn with_argnum(mut self, argnum: impl Into<ArgNum>) -> Self {
        self.argnum = Some(argnum.into());
        self
    }

    fn resolve(self) -> TraceResult<(DiffMethod, Option<f64>, Vec<usize>)> {
        let method = match self.method {
            None => DiffMethod::Fd,
            Some(m) => m.parse().map_err(|_| {
                TraceError::configuration(format!("invalid differentiation method '{m}'"))
            })?,
        };
        let h = match self.h {
            None if method == DiffMethod::Fd => Some(DEFAULT_FD_STEP),
            None => None,
            Some(h) => Some(
                h.as_f64()
                    .ok_or_else(|| TraceError::configuration(format!("invalid h value {h}")))?,
            ),
        };
        let argnum = self.argnum.map_or_else(|| vec![0], ArgNum::into_vec);
        Ok((method, h, argnum))
    }
}

/// A traced function that is called through a single function-call node.
#[derive(Clone, Debug)]
pub struct Function<'f> {
    name: SmolStr,
    func: TracedFn<'f>,
}

impl<'f> Function<'f> {
    /// Wrap `func`; the call is named `grad.<name>`.
    pub fn new(func: TracedFn<'f>) -> Self {
        Self {
            name: format_smolstr!("grad.{}", func.name()),
            func,
        }
    }

    /// Name of the call.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trace a call with the given arguments.
    pub fn call(&self, ctx: &mut TraceContext, args: &[Value]) -> TraceResult<Tree<Value>> {
        ctx.check_is_tracing("Function")?;
        let in_types = args.iter().map(Value::aval).collect_vec();
        let captured =
            ctx.capture_with(&self.func.renamed(self.name.clone()), &in_types, Threading::None)?;
        let out_types = shaped_outputs(&captured.program.output_types())?;
        let operands = captured
            .consts
            .into_iter()
            .chain(args.iter().map(Value::to_atom))
            .collect();
        let outs = ctx.emit(
            OpKind::FunctionCall(CallNode {
                callee: captured.program,
            }),
            operands,
            out_types,
        )?;
        captured.out_tree.unflatten(outs.into_iter().map(Value::Tracer))
    }

    fn to_traced_fn(&self) -> TracedFn<'f> {
        let this = self.clone();
        TracedFn::new(self.name.clone(), self.func.arity(), move |ctx, args| {
            this.call(ctx, args)
        })
    }
}

/// Something [`grad`] can differentiate.
#[derive(Clone, Debug)]
pub enum Differentiable<'f> {
    /// A quantum function; all methods are available.
    Quantum(QFunc<'f>),
    /// Any other function; only finite differences are available.
    Function(Function<'f>),
}

impl<'f> Differentiable<'f> {
    fn name(&self) -> &str {
        match self {
            Differentiable::Quantum(q) => q.name(),
            Differentiable::Function(f) => f.name(),
        }
    }

    fn to_traced_fn(&self) -> TracedFn<'f> {
        match self {
            Differentiable::Quantum(q) => q.to_traced_fn(),
            Differentiable::Function(f) => f.to_traced_fn(),
        }
    }
}

impl<'f> From<QFunc<'f>> for Differentiable<'f> {
    fn from(q: QFunc<'f>) -> Self {
        Differentiable::Quantum(q)
    }
}

impl<'f> From<TracedFn<'f>> for Differentiable<'f> {
    fn from(f: TracedFn<'f>) -> Self {
        Differentiable::Function(Function::new(f))
    }
}

impl<'f> From<Function<'f>> for Differentiable<'f> {
    fn from(f: Function<'f>) -> Self {
        Differentiable::Function(f)
    }
}

impl<'f> From<Grad<'f>> for Differentiable<'f> {
    fn from(g: Grad<'f>) -> Self {
        Differentiable::Function(Function::new(g.to_traced_fn()))
    }
}

/// A differentiation request, built with [`grad`].
#[derive(Clone, Debug)]
pub struct Grad<'f> {
    callee: Differentiable<'f>,
    method: DiffMethod,
    h: Option<f64>,
    argnum: Vec<usize>,
}

/// Differentiate `f` with the given options.
///
/// Fails if an option is invalid, or if a method other than finite
/// differences is requested for something that is not a quantum function.
pub fn grad<'f>(f: impl Into<Differentiable<'f>>, options: GradOptions) -> TraceResult<Grad<'f>> {
    let (method, h, argnum) = options.resolve()?;
    let callee = f.into();
    if method != DiffMethod::Fd && !matches!(callee, Differentiable::Quantum(_)) {
        return Err(TraceError::configuration(
            "Only finite difference can compute higher order derivatives.",
        ));
    }
    Ok(Grad {
        callee,
        method,
        h,
        argnum,
    })
}

impl<'f> Grad<'f> {
    /// Name of the differentiated function.
    pub fn name(&self) -> &str {
        self.callee.name()
    }

    /// Differentiation method.
    pub fn method(&self) -> DiffMethod {
        self.method
    }

    /// Step size, for finite differences.
    pub fn h(&self) -> Option<f64> {
        self.h
    }

    /// Indices of the differentiated arguments.
    pub fn argnum(&self) -> &[usize] {
        &self.argnum
    }

    /// Trace a call of the derivative with the given arguments.
    pub fn call(&self, ctx: &mut TraceContext, args: &[Value]) -> TraceResult<Tree<Value>> {
        ctx.check_is_tracing("grad")?;
        if let Some(i) = self.argnum.iter().find(|&&i| i >= args.len()) {
            return Err(TraceError::configuration(format!(
                "argnum {i} is out of range for {} called with {} arguments",
                self.name(),
                args.len()
            )));
        }
        let in_types = args.iter().map(Value::aval).collect_vec();
        let captured = ctx.capture(&self.callee.to_traced_fn(), &in_types, &TraceMode::Classical)?;
        check_single_call(&captured.program)?;
        tracing::debug!(
            target: LOG_TARGET,
            name = self.name(),
            method = %self.method,
            argnum = ?self.argnum,
            "grad"
        );

        let out_types = shaped_outputs(&captured.program.output_types())?;
        let operands = captured
            .consts
            .into_iter()
            .chain(args.iter().map(Value::to_atom))
            .collect();
        let outs = ctx.emit(
            OpKind::Gradient(GradNode {
                callee: captured.program,
                method: self.method,
                h: self.h,
                argnum: self.argnum.clone(),
            }),
            operands,
            out_types,
        )?;
        captured.out_tree.unflatten(outs.into_iter().map(Value::Tracer))
    }

    /// The derivative as a plain traced function.
    pub fn to_traced_fn(&self) -> TracedFn<'f> {
        let this = self.clone();
        TracedFn::new(self.name().to_string(), self.callee.to_traced_fn().arity(), move |ctx, args| {
            this.call(ctx, args)
        })
    }
}

/// A differentiated program must consist of a single function call.
pub(crate) fn check_single_call(program: &Program) -> TraceResult<()> {
    match program.ops() {
        [op] if op.kind.is_function_call() => Ok(()),
        [_] => Err(TraceError::internal(
            "Attempting to differentiate something other than a function",
        )),
        _ => Err(TraceError::internal("Grad is not well defined")),
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::ir::{Literal, Operation, Primitive, TypedVar, Var};
    use crate::quantum::gates::{GateKind, Observable, ObservableKind, QuantumOp};
    use crate::quantum::qfunc;
    use crate::trace::trace_program;
    use crate::types::{DType, ShapedType, ValueType};

    fn square<'f>() -> TracedFn<'f> {
        TracedFn::new("square", 1, |ctx, args| Ok(ctx.mul(&args[0], &args[0])?.into()))
    }

    fn circuit<'f>() -> QFunc<'f> {
        qfunc(
            1,
            None,
            TracedFn::new("circuit", 1, |ctx, args| {
                ctx.apply(QuantumOp::gate(GateKind::RY, [0], [&args[0]])?)?;
                Ok(ctx.expval(Observable::named(ObservableKind::PauliZ, 0))?.into())
            }),
        )
    }

    fn f64_scalar() -> ShapedType {
        ShapedType::scalar(DType::F64)
    }

    fn add_one() -> Operation {
        let x = TypedVar::new(Var(0), f64_scalar());
        let y = TypedVar::new(Var(1), f64_scalar());
        Operation::new(
            OpKind::Primitive(Primitive::Add),
            vec![x.into(), Literal::Float(1.0).into()],
            vec![y],
        )
    }

    #[test]
    fn traced_functions_are_single_calls() {
        let f = Function::new(square());
        let main = TracedFn::new("main", 1, move |ctx, args| f.call(ctx, args));
        let prog = trace_program("main", &[f64_scalar()], &main).unwrap();
        assert!(check_single_call(&prog).is_ok());
    }

    #[rstest]
    #[case::not_a_call(vec![add_one()], "other than a function")]
    #[case::empty(vec![], "not well defined")]
    #[case::two_ops(vec![add_one(), add_one()], "not well defined")]
    fn differentiated_program_shape(#[case] ops: Vec<Operation>, #[case] expected: &str) {
        let x = TypedVar::new(Var(0), f64_scalar());
        let prog = Program::new("f", vec![], vec![x.clone()], ops, vec![x.into()]);
        assert_matches!(
            check_single_call(&prog),
            Err(TraceError::InternalConsistency { message }) => assert!(message.contains(expected))
        );
    }

    #[test]
    fn defaults() {
        let g = grad(square(), GradOptions::default()).unwrap();
        assert_eq!(g.method(), DiffMethod::Fd);
        assert_eq!(g.h(), Some(DEFAULT_FD_STEP));
        assert_eq!(g.argnum(), [0]);
        assert_eq!(g.name(), "grad.square");
    }

    #[rstest]
    #[case::unknown_method(GradOptions::default().with_method("bp"))]
    #[case::string_h(GradOptions::default().with_h("x"))]
    #[case::ps_on_plain_function(GradOptions::default().with_method("ps"))]
    #[case::adj_on_plain_function(GradOptions::default().with_method("adj"))]
    fn invalid_options(#[case] options: GradOptions) {
        assert_matches!(
            grad(square(), options),
            Err(TraceError::Configuration { .. })
        );
    }

    #[test]
    fn quantum_functions_accept_every_method() {
        let g = grad(circuit(), GradOptions::default().with_method("ps")).unwrap();
        assert_eq!(g.method(), DiffMethod::Ps);
        assert_eq!(g.h(), None);
    }

    #[test]
    fn options_deserialize() {
        let options: GradOptions =
            serde_json::from_value(json!({"method": "fd", "h": 0.01, "argnum": 1})).unwrap();
        let g = grad(
            TracedFn::new("f", 2, |ctx, args| Ok(ctx.add(&args[0], &args[1])?.into())),
            options,
        )
        .unwrap();
        assert_eq!(g.h(), Some(0.01));
        assert_eq!(g.argnum(), [1]);
    }

    #[test]
    fn gradient_wraps_one_function_call() {
        let g = grad(square(), GradOptions::default()).unwrap();
        let outer = TracedFn::new("outer", 1, |ctx, args| g.call(ctx, args));
        let prog = trace_program("outer", &[f64_scalar()], &outer).unwrap();
        assert_matches!(prog.ops(), [op] => {
            assert_matches!(&op.kind, OpKind::Gradient(node) => {
                assert_matches!(node.callee.ops(), [call] => {
                    assert_matches!(&call.kind, OpKind::FunctionCall(CallNode { callee }) => {
                        assert_eq!(callee.name(), "grad.square");
                    });
                });
                assert_eq!(node.method, DiffMethod::Fd);
            });
        });
        assert_eq!(prog.output_types(), vec![ValueType::from(f64_scalar())]);
    }

    #[test]
    fn nested_gradients() {
        let inner = grad(square(), GradOptions::default()).unwrap();
        let outer_grad = grad(inner, GradOptions::default()).unwrap();
        assert_eq!(outer_grad.name(), "grad.grad.square");
        let outer = TracedFn::new("outer", 1, |ctx, args| outer_grad.call(ctx, args));
        let prog = trace_program("outer", &[f64_scalar()], &outer).unwrap();
        assert_eq!(prog.ops().len(), 1);
        assert!(prog.num_operations() >= 4);
    }

    #[test]
    fn argnum_out_of_range() {
        let g = grad(square(), GradOptions::default().with_argnum(vec![0, 1])).unwrap();
        let outer = TracedFn::new("outer", 1, |ctx, args| g.call(ctx, args));
        assert_matches!(
            trace_program("outer", &[f64_scalar()], &outer),
            Err(TraceError::Configuration { .. })
        );
    }

    #[test]
    fn grad_of_quantum_function() {
        let g = grad(circuit(), GradOptions::default().with_method("adj")).unwrap();
        let outer = TracedFn::new("outer", 1, |ctx, args| g.call(ctx, args));
        let prog = trace_program("outer", &[f64_scalar()], &outer).unwrap();
        assert_matches!(&prog.ops()[0].kind, OpKind::Gradient(GradNode { method: DiffMethod::Adj, h: None, .. }));
    }
}
