//! qtrace: a tracing front-end for hybrid quantum/classical programs.
//!
//! Traced functions are run once against placeholder values, and their
//! classical operations, structured control flow and quantum gates are
//! recorded into a small functional IR. Quantum state is represented by an
//! opaque register value that is threaded through every quantum operation in
//! program order, so that later compiler stages see quantum effects as plain
//! data dependencies.
//!
//! The main entry points are [`trace_program`] for classical programs,
//! [`quantum::qfunc`] for functions running on a device, the
//! [`control_flow`] builders, and [`grad::grad`] for differentiation
//! requests.
//!
//! # Example
//!
//! ```
//! use qtrace::control_flow::cond;
//! use qtrace::quantum::{qfunc, GateKind, Observable, ObservableKind, QuantumOp};
//! use qtrace::types::{DType, ShapedType};
//! use qtrace::{trace_program, TracedFn, Tree};
//!
//! // Measure the first qubit and flip the second one if it was set.
//! let circuit = qfunc(2, None, TracedFn::new("circuit", 1, |ctx, args| {
//!     ctx.apply(QuantumOp::gate(GateKind::RX, [0], [&args[0]])?)?;
//!     let m = ctx.measure(0)?;
//!     let flip = TracedFn::nullary("flip", |ctx| {
//!         ctx.apply(QuantumOp::gate(GateKind::PauliX, [1], Vec::<f64>::new())?)?;
//!         Ok(Tree::None)
//!     });
//!     cond(m, flip)?.call(ctx)?;
//!     Ok(ctx.expval(Observable::named(ObservableKind::PauliZ, 1))?.into())
//! }));
//!
//! let program = trace_program(
//!     "main",
//!     &[ShapedType::scalar(DType::F64)],
//!     &circuit.to_traced_fn(),
//! )?;
//! qtrace::validate::verify_registers(&program)?;
//! println!("{program}");
//! # Ok::<(), qtrace::TraceError>(())
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod control_flow;
pub mod error;
pub mod grad;
pub mod ir;
pub mod quantum;
pub mod serialize;
pub mod trace;
pub mod tree;
pub mod types;
pub mod validate;

pub use error::{TraceError, TraceResult};
pub use ir::Program;
pub use trace::{trace_program, Captured, TraceContext, TraceMode, TracedFn, Tracer, Value};
pub use tree::{Tree, TreeDef};
