//! Structured control flow: conditionals and loops.
//!
//! Every builder resolves the [`TraceMode`] once when called. In classical mode
//! its bodies are captured as plain programs. In quantum mode they thread the
//! register, and the emitted node is queued on the enclosing tape so that it
//! receives the register in program order.

mod cond;
mod for_loop;
mod while_loop;

use itertools::Itertools;

use crate::error::{TraceError, TraceResult};
use crate::ir::{Atom, OpKind, Program};
use crate::quantum::qfunc::shaped_outputs;
use crate::trace::{Captured, TraceContext, TraceMode, Value};
use crate::tree::{Tree, TreeDef};
use crate::types::ValueType;

pub use cond::{cond, Cond};
pub use for_loop::{for_loop, ForLoop};
pub use while_loop::{while_loop, WhileLoop};

/// Emit a control-flow node and rebuild its outputs into `out_tree`.
fn emit_node(
    ctx: &mut TraceContext,
    mode: &TraceMode,
    kind: OpKind,
    operands: Vec<Atom>,
    out_types: &[ValueType],
    out_tree: &TreeDef,
) -> TraceResult<Tree<Value>> {
    let out_types = shaped_outputs(out_types)?;
    let outs = match mode {
        TraceMode::Classical => ctx.emit(kind, operands, out_types)?,
        TraceMode::Quantum(_) => ctx.emit_threaded(kind, operands, out_types)?,
    };
    out_tree.unflatten(outs.into_iter().map(Value::Tracer))
}

/// Give every captured program the union of all their constants.
///
/// Returns the programs and the operands for the shared constants.
fn with_common_consts(captured: Vec<Captured>) -> (Vec<Program>, Vec<Atom>) {
    let consts = captured
        .iter()
        .flat_map(|c| c.program.consts().iter().cloned())
        .unique_by(|tv| tv.var)
        .collect_vec();
    let programs = captured
        .into_iter()
        .map(|c| c.program.with_consts(consts.clone()))
        .collect();
    (programs, consts.into_iter().map(Atom::Var).collect())
}

/// Fail unless a loop body returns values of the carried types.
fn check_carried_types(
    construct: &str,
    carried: &[ValueType],
    body: &Captured,
) -> TraceResult<()> {
    let returned = body.user_output_types();
    if returned != carried {
        return Err(TraceError::type_mismatch(format!(
            "The body of a {construct} must return values of the loop-carried types, got:\n - carried: [{}]\n - returned: [{}]",
            carried.iter().join(", "),
            returned.iter().join(", ")
        )));
    }
    Ok(())
}
