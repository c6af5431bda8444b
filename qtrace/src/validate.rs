//! Register linearity checks for traced programs.
//!
//! A register is a linear value: every operation that consumes one must
//! consume the single live register, and produce its successor. A program
//! that threads a register returns the last one it produced.

use std::fmt;

use crate::error::{TraceError, TraceResult};
use crate::ir::{Atom, OpKind, Operation, Program, Var};

/// Number of register-producing and register-consuming operations of a
/// program, including the register it receives as input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterCounts {
    /// Registers produced, counting the initial one.
    pub produced: usize,
    /// Registers consumed.
    pub consumed: usize,
}

impl RegisterCounts {
    /// Whether the program touches no register at all.
    pub fn is_classical(&self) -> bool {
        self.produced == 0 && self.consumed == 0
    }

    /// Whether the register was threaded without being duplicated or dropped.
    pub fn is_linear(&self) -> bool {
        self.is_classical() || self.produced == self.consumed + 1
    }
}

impl fmt::Display for RegisterCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} produced, {} consumed", self.produced, self.consumed)
    }
}

/// Check that `program` and all its nested programs use registers linearly.
///
/// Returns the counts of `program` itself.
pub fn register_counts(program: &Program) -> TraceResult<RegisterCounts> {
    let mut counts = RegisterCounts::default();
    let mut live = None;
    if program.threads_register() {
        live = program.inputs().last().map(|tv| tv.var);
        counts.produced += 1;
    }

    for op in program.ops() {
        check_nested(program, op)?;
        let consumed = op
            .operands
            .iter()
            .filter_map(Atom::as_var)
            .filter(|tv| tv.ty.is_register())
            .collect::<Vec<_>>();
        match consumed.as_slice() {
            [] => {}
            [reg] if live == Some(reg.var) => {
                counts.consumed += 1;
                live = None;
            }
            [reg] => {
                return Err(violation(
                    program,
                    op,
                    format!("consumes {} while {} is live", reg.var, live_name(live)),
                ))
            }
            _ => return Err(violation(program, op, "consumes more than one register")),
        }
        match op.results.iter().filter(|tv| tv.ty.is_register()).count() {
            0 if !consumed.is_empty() => {
                return Err(violation(program, op, "drops the register it consumed"))
            }
            0 => {}
            1 if live.is_some() => {
                return Err(violation(
                    program,
                    op,
                    format!("produces a register while {} is live", live_name(live)),
                ))
            }
            1 => {
                live = op.register_result().map(|tv| tv.var);
                counts.produced += 1;
            }
            _ => return Err(violation(program, op, "produces more than one register")),
        }
    }

    check_outputs(program, live)?;
    tracing::trace!(target: "qtrace::validate", name = program.name(), %counts, "register counts");
    Ok(counts)
}

/// Check that `program` and all its nested programs use registers linearly.
pub fn verify_registers(program: &Program) -> TraceResult<()> {
    register_counts(program).map(|_| ())
}

fn check_outputs(program: &Program, live: Option<Var>) -> TraceResult<()> {
    let returned = program
        .outputs()
        .iter()
        .filter_map(Atom::as_var)
        .filter(|tv| tv.ty.is_register())
        .collect::<Vec<_>>();
    let last_is_register = program.outputs().last().is_some_and(Atom::is_register);
    match (program.threads_register(), returned.as_slice()) {
        (true, [reg]) if last_is_register && live == Some(reg.var) => Ok(()),
        (true, _) => Err(TraceError::internal(format!(
            "{} takes a register but does not return its last register {} as its last output.",
            program.name(),
            live_name(live)
        ))),
        (false, []) => Ok(()),
        (false, _) => Err(TraceError::internal(format!(
            "{} returns a register it was not given.",
            program.name()
        ))),
    }
}

/// Nested programs must thread the register exactly when their operation
/// consumes one. While-loop predicates never do.
fn check_nested(program: &Program, op: &Operation) -> TraceResult<()> {
    let threaded = op.register_operand().is_some();
    for (label, sub) in op.kind.labelled_subprograms() {
        let expected = threaded && !matches!((&op.kind, label), (OpKind::WhileLoop(_), "cond"));
        if sub.threads_register() != expected {
            return Err(violation(
                program,
                op,
                format!(
                    "has a {label} program that {} the register",
                    if expected { "does not thread" } else { "threads" }
                ),
            ));
        }
        verify_registers(sub)?;
    }
    Ok(())
}

fn live_name(live: Option<Var>) -> String {
    live.map_or_else(|| "no register".to_string(), |v| v.to_string())
}

fn violation(program: &Program, op: &Operation, message: impl fmt::Display) -> TraceError {
    TraceError::internal(format!(
        "Register linearity violated in {}: {} {message}.",
        program.name(),
        op.kind
    ))
}
