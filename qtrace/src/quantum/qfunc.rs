//! Quantum functions: traced functions bound to a device.

use std::rc::Rc;

use itertools::Itertools;

use super::device::{DeviceOptions, QJitDevice, DEFAULT_BACKEND};
use crate::error::{TraceError, TraceResult};
use crate::ir::{CallNode, OpKind};
use crate::trace::{Threading, TraceContext, TracedFn, Value, LOG_TARGET};
use crate::tree::Tree;
use crate::types::{ShapedType, ValueType};

/// A function whose body runs in quantum mode on a fresh register.
///
/// Calling it inside a trace captures the body into a program that starts by
/// allocating the device's qubits, and emits a single function call.
#[derive(Clone, Debug)]
pub struct QFunc<'f> {
    func: TracedFn<'f>,
    device: Rc<QJitDevice>,
}

impl<'f> QFunc<'f> {
    /// Bind `func` to a device.
    pub fn new(func: TracedFn<'f>, device: QJitDevice) -> Self {
        Self {
            func,
            device: Rc::new(device),
        }
    }

    /// Bind `func` to a named backend.
    ///
    /// Only [`DEFAULT_BACKEND`] can be compiled for.
    pub fn for_device(
        backend: &str,
        options: DeviceOptions,
        func: TracedFn<'f>,
    ) -> TraceResult<Self> {
        if backend != DEFAULT_BACKEND {
            return Err(TraceError::configuration(format!(
                "Only the {DEFAULT_BACKEND} device is supported for compilation at the moment, got {backend}."
            )));
        }
        Ok(Self::new(func, QJitDevice::new(options)))
    }

    /// Name of the function.
    pub fn name(&self) -> &str {
        self.func.name()
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.func.arity()
    }

    /// The device the function is traced against.
    pub fn device(&self) -> &QJitDevice {
        &self.device
    }

    /// Trace a call with the given arguments.
    pub fn call(&self, ctx: &mut TraceContext, args: &[Value]) -> TraceResult<Tree<Value>> {
        ctx.check_is_tracing("qfunc")?;
        let in_types = args.iter().map(Value::aval).collect_vec();
        let captured =
            ctx.capture_with(&self.func, &in_types, Threading::Alloc(self.device.clone()))?;
        let out_types = shaped_outputs(&captured.program.output_types())?;
        tracing::debug!(
            target: LOG_TARGET,
            name = self.name(),
            wires = self.device.num_wires(),
            "quantum function call"
        );
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

    /// The call as a plain traced function.
    pub fn to_traced_fn(&self) -> TracedFn<'f> {
        let this = self.clone();
        TracedFn::new(self.func.name(), self.func.arity(), move |ctx, args| {
            this.call(ctx, args)
        })
    }
}

/// Bind `func` to a default device with `num_wires` qubits.
pub fn qfunc(num_wires: usize, shots: Option<usize>, func: TracedFn<'_>) -> QFunc<'_> {
    let defaults = DeviceOptions::default();
    QFunc::new(
        func,
        QJitDevice::new(DeviceOptions {
            wires: num_wires,
            shots: shots.unwrap_or(defaults.shots),
            ..defaults
        }),
    )
}

pub(crate) fn shaped_outputs(types: &[ValueType]) -> TraceResult<Vec<ShapedType>> {
    types
        .iter()
        .map(|ty| {
            ty.as_shaped().cloned().ok_or_else(|| {
                TraceError::internal("A register escaped from a function call.")
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::quantum::gates::{GateKind, Observable, ObservableKind, QuantumOp};
    use crate::trace::trace_program;
    use crate::types::DType;

    fn bell<'f>() -> TracedFn<'f> {
        TracedFn::new("bell", 1, |ctx, args| {
            ctx.apply(QuantumOp::gate(GateKind::RX, [0], [&args[0]])?)?;
            ctx.apply(QuantumOp::gate(GateKind::CNOT, [0, 1], Vec::<f64>::new())?)?;
            Ok(ctx.expval(Observable::named(ObservableKind::PauliZ, 1))?.into())
        })
    }

    #[test]
    fn call_emits_one_function_node() {
        let circuit = qfunc(2, None, bell());
        let outer = TracedFn::new("outer", 1, |ctx, args| circuit.call(ctx, args));
        let prog = trace_program("outer", &[ShapedType::scalar(DType::F64)], &outer).unwrap();
        assert_matches!(prog.ops(), [op] => {
            assert_matches!(&op.kind, OpKind::FunctionCall(CallNode { callee }) => {
                assert_matches!(&callee.ops()[0].kind, OpKind::Alloc { num_wires: 2 });
                assert_eq!(callee.ops().len(), 4);
                assert_eq!(callee.output_types(), vec![ValueType::from(ShapedType::scalar(DType::F64))]);
            });
        });
        assert_eq!(prog.output_types(), vec![ValueType::from(ShapedType::scalar(DType::F64))]);
    }

    #[test]
    fn only_lightning_is_accepted() {
        assert!(QFunc::for_device("lightning.qubit", DeviceOptions::default(), bell()).is_ok());
        assert_matches!(
            QFunc::for_device("default.qubit", DeviceOptions::default(), bell()),
            Err(TraceError::Configuration { .. })
        );
    }

    #[test]
    fn shots_default_to_a_thousand() {
        assert_eq!(qfunc(3, None, bell()).device().options().shots, 1000);
        assert_eq!(qfunc(3, Some(10), bell()).device().options().shots, 10);
    }

    #[test]
    fn gates_outside_a_quantum_function_fail() {
        let f = TracedFn::nullary("f", |ctx| {
            ctx.apply(QuantumOp::gate(GateKind::Hadamard, [0], Vec::<f64>::new())?)?;
            Ok(Tree::None)
        });
        assert_matches!(
            trace_program("f", &[], &f),
            Err(TraceError::Usage { .. })
        );
    }
}
