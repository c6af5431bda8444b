//! The quantum tape and register threading.
//!
//! User code queues operations on a tape imperatively. When the enclosing
//! function has been fully traced, [`QuantumTape::thread_register`] turns the
//! queue into a functional chain of operations, each consuming the current
//! register and producing the next.

use std::mem;
use std::rc::Rc;

use super::device::{QJitDevice, LOG_TARGET};
use super::gates::{GateOp, Observable, ParamOps, QuantumOp};
use crate::error::TraceResult;
use crate::ir::{Atom, Literal, OpKind, Operation, Primitive, TypedVar};
use crate::trace::VarGen;
use crate::types::ValueType;

/// An entry queued on a tape, in program order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TapeEntry {
    /// A classical operation; it does not touch the register.
    Classical(Operation),
    /// A gate-library operation, decomposed before threading.
    Quantum(QuantumOp),
    /// A mid-circuit measurement with its boolean result.
    MidMeasure {
        id: String,
        wire: usize,
        result: TypedVar,
    },
    /// An expectation value with its float result.
    Expval {
        observable: Observable,
        result: TypedVar,
    },
    /// A control-flow node whose register operand and result are still
    /// missing.
    Nested(Operation),
}

/// Operations queued while tracing a function in quantum mode.
#[derive(Clone, Debug)]
pub(crate) struct QuantumTape {
    device: Rc<QJitDevice>,
    entries: Vec<TapeEntry>,
}

impl QuantumTape {
    pub(crate) fn new(device: Rc<QJitDevice>) -> Self {
        Self {
            device,
            entries: Vec::new(),
        }
    }

    pub(crate) fn device(&self) -> &Rc<QJitDevice> {
        &self.device
    }

    pub(crate) fn push(&mut self, entry: TapeEntry) {
        self.entries.push(entry);
    }

    /// Translate the tape into operations threading `register`.
    ///
    /// Runs of consecutive gate-library operations are expanded by the device
    /// first. Returns the operations and the final register.
    pub(crate) fn thread_register(
        self,
        vars: &mut VarGen,
        register: TypedVar,
    ) -> TraceResult<(Vec<Operation>, TypedVar)> {
        let QuantumTape { device, entries } = self;
        let mut threader = Threader {
            device: &device,
            vars,
            ops: Vec::with_capacity(entries.len()),
            register,
        };
        let mut pending = Vec::new();
        for entry in entries {
            match entry {
                TapeEntry::Quantum(op) => pending.push(op),
                other => {
                    threader.flush(mem::take(&mut pending))?;
                    threader.push(other)?;
                }
            }
        }
        threader.flush(pending)?;
        tracing::debug!(
            target: LOG_TARGET,
            ops = threader.ops.len(),
            register = %threader.register.var,
            "threaded register"
        );
        Ok((threader.ops, threader.register))
    }
}

struct Threader<'a> {
    device: &'a QJitDevice,
    vars: &'a mut VarGen,
    ops: Vec<Operation>,
    register: TypedVar,
}

impl Threader<'_> {
    /// Consume the current register, returning it along with its successor.
    fn advance(&mut self) -> (TypedVar, TypedVar) {
        let next = self.vars.fresh(ValueType::Register);
        (mem::replace(&mut self.register, next.clone()), next)
    }

    fn flush(&mut self, pending: Vec<QuantumOp>) -> TraceResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let device = self.device;
        let gates = device.expand(pending, self)?;
        for gate in gates {
            self.push_gate(gate);
        }
        Ok(())
    }

    fn push_gate(&mut self, gate: GateOp) {
        let (kind, wires, params, matrix) = gate.into_parts();
        let (reg, next) = self.advance();
        let mut operands = params;
        operands.push(reg.into());
        self.ops.push(Operation::new(
            OpKind::Gate {
                gate: kind,
                wires,
                matrix,
            },
            operands,
            vec![next],
        ));
    }

    fn push(&mut self, entry: TapeEntry) -> TraceResult<()> {
        let op = match entry {
            TapeEntry::Classical(op) => op,
            TapeEntry::Quantum(op) => return self.flush(vec![op]),
            TapeEntry::MidMeasure { id, wire, result } => {
                self.device.check_wires(&[wire])?;
                let (reg, next) = self.advance();
                Operation::new(
                    OpKind::MidMeasure { id, wire },
                    vec![reg.into()],
                    vec![result, next],
                )
            }
            TapeEntry::Expval { observable, result } => {
                self.device.check_observable(&observable)?;
                let (reg, next) = self.advance();
                Operation::new(
                    OpKind::Expval { observable },
                    vec![reg.into()],
                    vec![result, next],
                )
            }
            TapeEntry::Nested(mut op) => {
                let (reg, next) = self.advance();
                op.operands.push(reg.into());
                op.results.push(next);
                op
            }
        };
        self.ops.push(op);
        Ok(())
    }
}

impl ParamOps for Threader<'_> {
    fn neg(&mut self, param: &Atom) -> TraceResult<Atom> {
        match param {
            Atom::Literal(l) => Ok(Literal::Float(-l.as_f64()).into()),
            Atom::Var(tv) => {
                let out = self.vars.fresh(tv.ty.clone());
                self.ops.push(Operation::new(
                    OpKind::Primitive(Primitive::Neg),
                    vec![param.clone()],
                    vec![out.clone()],
                ));
                Ok(out.into())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::quantum::gates::{GateKind, ObservableKind};
    use crate::trace::{Tracer, Value};
    use crate::types::{DType, ShapedType};

    fn tape() -> QuantumTape {
        QuantumTape::new(Rc::new(QJitDevice::with_wires(2)))
    }

    #[test]
    fn gates_are_chained_in_order() {
        let mut tape = tape();
        tape.push(TapeEntry::Quantum(
            QuantumOp::gate(GateKind::Hadamard, [0], Vec::<f64>::new()).unwrap(),
        ));
        tape.push(TapeEntry::Quantum(
            QuantumOp::gate(GateKind::CNOT, [0, 1], Vec::<f64>::new()).unwrap(),
        ));
        let mut vars = VarGen::default();
        let reg = vars.fresh(ValueType::Register);
        let (ops, last) = tape.thread_register(&mut vars, reg.clone()).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].register_operand(), Some(&reg));
        assert_eq!(ops[1].register_operand(), ops[0].register_result());
        assert_eq!(ops[1].register_result(), Some(&last));
    }

    #[test]
    fn measurement_results_precede_the_register() {
        let mut tape = tape();
        let mut vars = VarGen::default();
        let bit = vars.fresh(ShapedType::bool_scalar());
        let ev = vars.fresh(ShapedType::scalar(DType::F64));
        tape.push(TapeEntry::MidMeasure {
            id: "abcd1234".into(),
            wire: 1,
            result: bit.clone(),
        });
        tape.push(TapeEntry::Expval {
            observable: Observable::named(ObservableKind::PauliZ, 0),
            result: ev.clone(),
        });
        let reg = vars.fresh(ValueType::Register);
        let (ops, last) = tape.thread_register(&mut vars, reg).unwrap();
        assert_matches!(ops.as_slice(), [measure, expval] => {
            assert_eq!(measure.results[0], bit);
            assert_eq!(expval.results[0], ev);
            assert_eq!(expval.results[1], last);
        });
    }

    #[test]
    fn traced_parameters_are_negated_in_ir() {
        let mut tape = tape();
        let mut vars = VarGen::default();
        let phi = vars.fresh(ShapedType::scalar(DType::F64));
        let phi = Value::from(Tracer::new(phi.var, ShapedType::scalar(DType::F64)));
        tape.push(TapeEntry::Quantum(
            QuantumOp::gate(GateKind::U2, [0], [Value::from(0.5), phi.clone()]).unwrap(),
        ));
        let reg = vars.fresh(ValueType::Register);
        let (ops, _) = tape.thread_register(&mut vars, reg.clone()).unwrap();
        // neg, then U2 -> Rot PhaseShift PhaseShift -> RZ RY RZ PhaseShift PhaseShift
        assert_eq!(ops.len(), 6);
        assert_matches!(&ops[0].kind, OpKind::Primitive(Primitive::Neg));
        assert_eq!(ops[0].operands, vec![phi.to_atom()]);
        assert_matches!(&ops[1].kind, OpKind::Gate { gate: GateKind::RZ, .. });
        assert_eq!(ops[1].register_operand(), Some(&reg));
        assert_eq!(ops[3].operands[0], ops[0].results[0].clone().into());
    }

    #[test]
    fn nested_nodes_receive_the_register() {
        let mut tape = tape();
        let mut vars = VarGen::default();
        let pred = vars.fresh(ShapedType::bool_scalar());
        let node = Operation::new(
            OpKind::Primitive(Primitive::Not),
            vec![pred.clone().into()],
            vec![],
        );
        tape.push(TapeEntry::Nested(node));
        let reg = vars.fresh(ValueType::Register);
        let (ops, last) = tape.thread_register(&mut vars, reg.clone()).unwrap();
        assert_eq!(ops[0].operands, vec![Atom::from(pred), Atom::from(reg)]);
        assert_eq!(ops[0].results, vec![last]);
    }
}
