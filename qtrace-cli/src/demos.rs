//! Built-in programs traced by the command line tool.

use clap::ValueEnum;
use qtrace::control_flow::{cond, for_loop, while_loop};
use qtrace::grad::{grad, GradOptions};
use qtrace::quantum::{qfunc, GateKind, Observable, ObservableKind, QFunc, QuantumOp};
use qtrace::types::{DType, ShapedType};
use qtrace::{trace_program, Program, TraceResult, TracedFn, Tree, Value};

/// A built-in program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// A conditional on a literal predicate.
    Cond,
    /// A while loop counting to three.
    While,
    /// A counted loop summing its indices.
    For,
    /// A quantum function flipping a qubit depending on a measurement.
    Teleport,
    /// The parameter-shift gradient of a single-qubit circuit.
    Grad,
}

impl Demo {
    /// Trace the program.
    pub fn trace(self) -> TraceResult<Program> {
        let f64_scalar = ShapedType::scalar(DType::F64);
        match self {
            Demo::Cond => trace_program("cond", &[], &classical_cond()),
            Demo::While => trace_program("while", &[], &counter()),
            Demo::For => trace_program("for", &[], &summation()),
            Demo::Teleport => trace_program("teleport", &[f64_scalar], &teleport().to_traced_fn()),
            Demo::Grad => {
                let g = grad(rotation(), GradOptions::default().with_method("ps"))?;
                trace_program("grad", &[f64_scalar], &g.to_traced_fn())
            }
        }
    }
}

fn classical_cond() -> TracedFn<'static> {
    TracedFn::nullary("cond", |ctx| {
        cond(true, TracedFn::nullary("one", |_| Ok(Value::from(1).into())))?
            .otherwise(TracedFn::nullary("two", |_| Ok(Value::from(2).into())))?
            .call(ctx)
    })
}

fn counter() -> TracedFn<'static> {
    TracedFn::nullary("while", |ctx| {
        while_loop(
            TracedFn::new("cond", 1, |ctx, x| Ok(ctx.lt(&x[0], 3)?.into())),
            TracedFn::new("body", 1, |ctx, x| Ok(ctx.add(&x[0], 1)?.into())),
        )
        .call(ctx, &[Value::from(0)])
    })
}

fn summation() -> TracedFn<'static> {
    TracedFn::nullary("for", |ctx| {
        let body = TracedFn::new("body", 2, |ctx, args| Ok(ctx.add(&args[1], &args[0])?.into()));
        for_loop(0, 5, 1, body).call(ctx, &[Value::from(0)])
    })
}

fn teleport() -> QFunc<'static> {
    qfunc(
        2,
        None,
        TracedFn::new("teleport", 1, |ctx, args| {
            ctx.apply(QuantumOp::gate(GateKind::RX, [0], [&args[0]])?)?;
            ctx.apply(QuantumOp::gate(GateKind::CNOT, [0, 1], Vec::<f64>::new())?)?;
            let m = ctx.measure(0)?;
            let flip = TracedFn::nullary("flip", |ctx| {
                ctx.apply(QuantumOp::gate(GateKind::PauliX, [1], Vec::<f64>::new())?)?;
                Ok(Tree::None)
            });
            cond(m, flip)?.call(ctx)?;
            Ok(ctx
                .expval(Observable::named(ObservableKind::PauliZ, 1))?
                .into())
        }),
    )
}

fn rotation() -> QFunc<'static> {
    qfunc(
        1,
        None,
        TracedFn::new("rotation", 1, |ctx, args| {
            ctx.apply(QuantumOp::gate(GateKind::U2, [0], [&args[0], &Value::from(0.5)])?)?;
            Ok(ctx
                .expval(Observable::named(ObservableKind::PauliZ, 0))?
                .into())
        }),
    )
}
