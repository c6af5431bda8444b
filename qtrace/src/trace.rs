//! The tracing context: frames, capture of functions into programs, and
//! emission of operations.
//!
//! A [`TraceContext`] is passed explicitly to every traced function and every
//! builder. It owns a stack of frames, one per function currently being
//! captured. Operations recorded by user code land in the innermost frame;
//! when the function returns, the frame is popped and becomes a [`Program`].
//!
//! In quantum mode the innermost frame also owns a quantum tape. Gates and
//! control-flow nodes are queued on that tape, and the register is threaded
//! through them only when the frame is closed.

mod primitives;
mod value;

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{TraceError, TraceResult};
use crate::ir::{Atom, OpKind, Operation, Program, TypedVar, Var};
use crate::quantum::device::QJitDevice;
use crate::quantum::tape::{QuantumTape, TapeEntry};
use crate::tree::{Tree, TreeDef};
use crate::types::{ShapedType, ValueType};

pub use value::{TracedFn, Tracer, Value};

/// Log target for tracing events.
pub(crate) const LOG_TARGET: &str = "qtrace::trace";

/// How control-flow builders lower themselves, resolved once per call.
#[derive(Clone, Debug)]
pub enum TraceMode {
    /// No quantum tape is active: sub-programs are purely classical.
    Classical,
    /// A quantum tape for the given device is active: sub-programs thread the
    /// register.
    Quantum(Rc<QJitDevice>),
}

impl TraceMode {
    /// Whether a quantum tape is active.
    pub fn is_quantum(&self) -> bool {
        matches!(self, TraceMode::Quantum(_))
    }
}

/// How a captured function handles quantum state.
#[derive(Clone, Debug)]
pub(crate) enum Threading {
    /// No register.
    None,
    /// The register is appended to the inputs and to the outputs.
    Register(Rc<QJitDevice>),
    /// A fresh register is allocated by the program itself and not returned.
    Alloc(Rc<QJitDevice>),
}

impl From<&TraceMode> for Threading {
    fn from(mode: &TraceMode) -> Self {
        match mode {
            TraceMode::Classical => Threading::None,
            TraceMode::Quantum(device) => Threading::Register(device.clone()),
        }
    }
}

/// Result of capturing a function.
#[derive(Clone, Debug, PartialEq)]
pub struct Captured {
    /// The captured program.
    pub program: Program,
    /// Values from enclosing frames the program reads, in the order of
    /// [`Program::consts`]. Callers pass these as operands.
    pub consts: Vec<Atom>,
    /// Shape of the value the function returned.
    pub out_tree: TreeDef,
}

impl Captured {
    /// Types of the outputs visible to user code.
    pub fn user_output_types(&self) -> Vec<ValueType> {
        self.program.user_output_types()
    }
}

/// Generator of fresh variables.
#[derive(Debug, Default)]
pub(crate) struct VarGen {
    next: u32,
}

impl VarGen {
    pub(crate) fn fresh(&mut self, ty: impl Into<ValueType>) -> TypedVar {
        let var = Var(self.next);
        self.next += 1;
        TypedVar::new(var, ty)
    }
}

#[derive(Debug, Default)]
struct Frame {
    defined: HashSet<Var>,
    consts: IndexMap<Var, ValueType>,
    ops: Vec<Operation>,
    tape: Option<QuantumTape>,
}

impl Frame {
    fn knows(&self, var: Var) -> bool {
        self.defined.contains(&var) || self.consts.contains_key(&var)
    }
}

/// Explicit tracing state, scoped to one top-level trace.
#[derive(Debug, Default)]
pub struct TraceContext {
    frames: Vec<Frame>,
    vars: VarGen,
}

impl TraceContext {
    /// A context with no active trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a function is currently being captured.
    pub fn is_tracing(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Number of nested captures in progress.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The current mode, or `None` outside of any trace.
    pub fn mode(&self) -> Option<TraceMode> {
        self.frames.last().map(|frame| match &frame.tape {
            Some(tape) => TraceMode::Quantum(tape.device().clone()),
            None => TraceMode::Classical,
        })
    }

    /// Fail with a usage error unless a function is being captured.
    pub fn check_is_tracing(&self, construct: &str) -> TraceResult<()> {
        match self.is_tracing() {
            true => Ok(()),
            false => Err(TraceError::usage(format!(
                "Must use '{construct}' inside tracing context."
            ))),
        }
    }

    /// The current mode, failing with a usage error outside of any trace.
    pub(crate) fn resolve_mode(&self, construct: &str) -> TraceResult<TraceMode> {
        self.mode().ok_or_else(|| {
            TraceError::usage(format!("Must use '{construct}' inside tracing context."))
        })
    }

    /// Capture `f` over fresh inputs of the given types.
    ///
    /// In quantum mode the register is threaded through the captured program:
    /// it is appended to its inputs and its final value to its outputs.
    pub fn capture(
        &mut self,
        f: &TracedFn<'_>,
        in_types: &[ShapedType],
        mode: &TraceMode,
    ) -> TraceResult<Captured> {
        self.capture_with(f, in_types, mode.into())
    }

    #[tracing::instrument(target = "qtrace::trace", level = "debug", skip_all, fields(name = f.name()))]
    pub(crate) fn capture_with(
        &mut self,
        f: &TracedFn<'_>,
        in_types: &[ShapedType],
        threading: Threading,
    ) -> TraceResult<Captured> {
        if in_types.len() != f.arity() {
            return Err(TraceError::usage(format!(
                "{} takes {} arguments, but {} were given.",
                f.name(),
                f.arity(),
                in_types.len()
            )));
        }

        let mut frame = Frame::default();
        let mut inputs = Vec::with_capacity(in_types.len() + 1);
        let mut args = Vec::with_capacity(in_types.len());
        for ty in in_types {
            let tv = self.vars.fresh(ty.clone());
            frame.defined.insert(tv.var);
            args.push(Value::Tracer(Tracer::new(tv.var, ty.clone())));
            inputs.push(tv);
        }
        let register = match &threading {
            Threading::None => None,
            Threading::Register(device) => {
                frame.tape = Some(QuantumTape::new(device.clone()));
                Some(self.vars.fresh(ValueType::Register))
            }
            Threading::Alloc(device) => {
                let reg = self.vars.fresh(ValueType::Register);
                frame.ops.push(Operation::new(
                    OpKind::Alloc {
                        num_wires: device.num_wires(),
                    },
                    vec![],
                    vec![reg.clone()],
                ));
                frame.tape = Some(QuantumTape::new(device.clone()));
                Some(reg)
            }
        };

        self.frames.push(frame);
        let outcome = f
            .invoke(self, &args)
            .and_then(|tree| self.close_outputs(tree));
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| TraceError::internal("Tracing frame stack underflow."))?;
        let (mut outputs, out_tree) = outcome?;

        let Frame {
            consts,
            mut ops,
            tape,
            ..
        } = frame;
        if let (Some(tape), Some(reg)) = (tape, register) {
            let (threaded, final_reg) = tape.thread_register(&mut self.vars, reg.clone())?;
            ops.extend(threaded);
            if let Threading::Register(_) = threading {
                inputs.push(reg);
                outputs.push(final_reg.into());
            }
        }

        let consts = consts
            .into_iter()
            .map(|(var, ty)| TypedVar { var, ty })
            .collect_vec();
        tracing::debug!(
            target: LOG_TARGET,
            name = f.name(),
            consts = consts.len(),
            ops = ops.len(),
            "captured sub-program"
        );
        let program = Program::new(f.name(), consts.clone(), inputs, ops, outputs);
        Ok(Captured {
            program,
            consts: consts.into_iter().map(Atom::Var).collect(),
            out_tree,
        })
    }

    fn close_outputs(&mut self, tree: Tree<Value>) -> TraceResult<(Vec<Atom>, TreeDef)> {
        let (leaves, out_tree) = tree.flatten();
        let outputs = leaves.iter().map(Value::to_atom).collect_vec();
        for atom in &outputs {
            self.use_atom(atom)?;
        }
        Ok((outputs, out_tree))
    }

    /// Record that the innermost frame reads `atom`.
    ///
    /// Variables of enclosing frames become captured constants; variables of
    /// frames that are no longer on the stack are escaped tracers.
    pub(crate) fn use_atom(&mut self, atom: &Atom) -> TraceResult<()> {
        let Atom::Var(tv) = atom else {
            return Ok(());
        };
        let (current, outer) = self.frames.split_last_mut().ok_or_else(|| {
            TraceError::usage(format!(
                "Tracer {} used outside of any tracing context.",
                tv.var
            ))
        })?;
        if current.knows(tv.var) {
            return Ok(());
        }
        if outer.iter().any(|frame| frame.knows(tv.var)) {
            current.consts.insert(tv.var, tv.ty.clone());
            return Ok(());
        }
        Err(TraceError::usage(format!(
            "Encountered an escaped tracer {tv}: it belongs to a function that has already been captured."
        )))
    }

    fn current_frame(&mut self) -> TraceResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| TraceError::usage("No active tracing context."))
    }

    /// A fresh tracer defined in the innermost frame.
    pub(crate) fn fresh_tracer(&mut self, ty: ShapedType) -> TraceResult<Tracer> {
        let tv = self.vars.fresh(ty.clone());
        self.current_frame()?.defined.insert(tv.var);
        Ok(Tracer::new(tv.var, ty))
    }

    fn prepare(
        &mut self,
        operands: &[Atom],
        out_types: Vec<ShapedType>,
    ) -> TraceResult<(Vec<Tracer>, Vec<TypedVar>)> {
        for atom in operands {
            self.use_atom(atom)?;
        }
        let tracers = out_types
            .into_iter()
            .map(|ty| self.fresh_tracer(ty))
            .collect::<TraceResult<Vec<_>>>()?;
        let results = tracers.iter().map(Tracer::typed_var).collect();
        Ok((tracers, results))
    }

    /// Record an operation that does not touch the register.
    pub(crate) fn emit(
        &mut self,
        kind: OpKind,
        operands: Vec<Atom>,
        out_types: Vec<ShapedType>,
    ) -> TraceResult<Vec<Tracer>> {
        let (tracers, results) = self.prepare(&operands, out_types)?;
        tracing::trace!(target: LOG_TARGET, op = %kind, "emit");
        let op = Operation::new(kind, operands, results);
        let frame = self.current_frame()?;
        match &mut frame.tape {
            Some(tape) => tape.push(TapeEntry::Classical(op)),
            None => frame.ops.push(op),
        }
        Ok(tracers)
    }

    /// Queue an operation that will receive the register as its last operand
    /// and produce the next register as its last result.
    pub(crate) fn emit_threaded(
        &mut self,
        kind: OpKind,
        operands: Vec<Atom>,
        out_types: Vec<ShapedType>,
    ) -> TraceResult<Vec<Tracer>> {
        let (tracers, results) = self.prepare(&operands, out_types)?;
        tracing::trace!(target: LOG_TARGET, op = %kind, "queue");
        let op = Operation::new(kind, operands, results);
        self.tape(op.kind.name())?.push(TapeEntry::Nested(op));
        Ok(tracers)
    }

    /// The active quantum tape.
    pub(crate) fn tape(&mut self, construct: &str) -> TraceResult<&mut QuantumTape> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.tape.as_mut())
            .ok_or_else(|| {
                TraceError::usage(format!(
                    "'{construct}' can only be used in traced/jitted mode, inside a quantum function."
                ))
            })
    }
}

/// Trace `f` into a complete classical program.
pub fn trace_program(
    name: &str,
    in_types: &[ShapedType],
    f: &TracedFn<'_>,
) -> TraceResult<Program> {
    let mut ctx = TraceContext::new();
    let captured = ctx.capture(&f.renamed(name), in_types, &TraceMode::Classical)?;
    tracing::info!(
        target: LOG_TARGET,
        name,
        ops = captured.program.num_operations(),
        "traced program"
    );
    Ok(captured.program)
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};
    use std::cell::RefCell;

    use super::*;
    use crate::ir::Primitive;
    use crate::types::DType;

    #[fixture]
    fn f64_scalar() -> ShapedType {
        ShapedType::scalar(DType::F64)
    }

    #[rstest]
    fn capture_records_inputs_and_outputs(f64_scalar: ShapedType) {
        let double = TracedFn::new("double", 1, |ctx, args| {
            Ok(ctx.add(&args[0], &args[0])?.into())
        });
        let prog = trace_program("double", &[f64_scalar.clone()], &double).unwrap();
        assert_eq!(prog.name(), "double");
        assert_eq!(prog.input_types(), vec![ValueType::from(f64_scalar.clone())]);
        assert_eq!(prog.output_types(), vec![ValueType::from(f64_scalar)]);
        assert_matches!(
            prog.ops(),
            [Operation { kind: OpKind::Primitive(Primitive::Add), .. }]
        );
    }

    #[rstest]
    fn outer_values_become_consts(f64_scalar: ShapedType) {
        let outer = TracedFn::new("outer", 1, |ctx, args| {
            let x = args[0].clone();
            let inner = TracedFn::nullary("inner", move |ctx| Ok(ctx.mul(&x, 2.0)?.into()));
            let captured = ctx.capture(&inner, &[], &TraceMode::Classical)?;
            assert_eq!(captured.program.consts().len(), 1);
            assert_eq!(captured.consts, vec![args[0].to_atom()]);
            Ok(Tree::None)
        });
        trace_program("outer", &[f64_scalar], &outer).unwrap();
    }

    #[rstest]
    fn escaped_tracer_is_rejected(f64_scalar: ShapedType) {
        let leaked = RefCell::new(None);
        let outer = TracedFn::new("outer", 1, |ctx, args| {
            let inner = TracedFn::new("inner", 1, |ctx, args| {
                let y = ctx.neg(&args[0])?;
                *leaked.borrow_mut() = Some(y.clone());
                Ok(y.into())
            });
            ctx.capture(&inner, &[f64_scalar.clone()], &TraceMode::Classical)?;
            let stale = leaked.borrow().clone().unwrap();
            Ok(ctx.add(&args[0], stale)?.into())
        });
        assert_matches!(
            trace_program("outer", &[f64_scalar.clone()], &outer),
            Err(TraceError::Usage { message }) => assert!(message.contains("escaped tracer"))
        );
    }

    #[test]
    fn arity_is_checked() {
        let f = TracedFn::new("f", 2, |_, _| Ok(Tree::None));
        assert_matches!(
            trace_program("f", &[ShapedType::scalar(DType::I64)], &f),
            Err(TraceError::Usage { .. })
        );
    }

    #[test]
    fn frames_are_popped_on_error() {
        let mut ctx = TraceContext::new();
        let failing = TracedFn::nullary("failing", |_| Err(TraceError::usage("boom")));
        assert!(ctx
            .capture(&failing, &[], &TraceMode::Classical)
            .is_err());
        assert!(!ctx.is_tracing());
        assert_matches!(ctx.check_is_tracing("cond"), Err(TraceError::Usage { .. }));
    }
}
