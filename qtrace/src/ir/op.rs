//! Operation kinds of the IR.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use super::Program;
use crate::grad::DiffMethod;
use crate::quantum::gates::{GateKind, Matrix, Observable};
use crate::tree::TreeDef;
use crate::types::DType;

/// Classical element-wise primitives.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Primitive {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Negation
    Neg,
    /// Less than
    Lt,
    /// Less or equal
    Le,
    /// Greater than
    Gt,
    /// Greater or equal
    Ge,
    /// Equality
    Eq,
    /// Logical not
    Not,
    /// Dtype conversion
    Convert(DType),
}

impl Primitive {
    /// Number of operands taken by the primitive.
    pub fn arity(&self) -> usize {
        use Primitive::*;
        match self {
            Neg | Not | Convert(_) => 1,
            Add | Sub | Mul | Lt | Le | Gt | Ge | Eq => 2,
        }
    }

    /// Whether the primitive returns a boolean.
    pub fn is_comparison(&self) -> bool {
        use Primitive::*;
        matches!(self, Lt | Le | Gt | Ge | Eq)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Convert(dtype) => write!(f, "convert[{dtype}]"),
            other => f.write_str(other.into()),
        }
    }
}

/// Two-way conditional.
///
/// Operands are `[pred, consts.., (register)]`. Both branches take the same
/// constants, the union of what either branch captured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CondNode {
    /// Branch executed when the predicate holds.
    pub true_branch: Program,
    /// Branch executed otherwise.
    pub false_branch: Program,
    /// Shape of the user-visible outputs.
    pub out_tree: TreeDef,
}

/// While loop.
///
/// Operands are `[cond consts.., body consts.., init.., (register)]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhileNode {
    /// Loop predicate over the carried values. Never takes the register.
    pub cond: Program,
    /// Loop body mapping carried values to the next iteration's values.
    pub body: Program,
    /// Number of constants captured by the predicate.
    pub cond_consts: usize,
    /// Number of constants captured by the body.
    pub body_consts: usize,
    /// Shape of the user-visible outputs.
    pub out_tree: TreeDef,
}

/// Counted loop over `range(lower, upper, step)`.
///
/// Operands are `[lower, upper, step, body consts.., init.., (register)]`;
/// the body takes the iteration index before the carried values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForNode {
    /// Loop body.
    pub body: Program,
    /// Number of constants captured by the body.
    pub body_consts: usize,
    /// Shape of the user-visible outputs.
    pub out_tree: TreeDef,
}

/// Call of a captured function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallNode {
    /// The called function. Operands are its constants followed by its inputs.
    pub callee: Program,
}

/// Differentiation request attached to a function call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradNode {
    /// A program consisting of exactly one [`OpKind::FunctionCall`].
    pub callee: Program,
    /// Differentiation method.
    pub method: DiffMethod,
    /// Finite-difference step size.
    pub h: Option<f64>,
    /// Indices of the arguments to differentiate with respect to.
    pub argnum: Vec<usize>,
}

/// The kind of an [`Operation`](super::Operation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    /// Classical primitive.
    Primitive(Primitive),
    /// Allocate a fresh register of `num_wires` qubits.
    Alloc {
        /// Number of qubits.
        num_wires: usize,
    },
    /// A device-supported gate: `[params.., register] -> [register]`.
    Gate {
        /// The gate.
        gate: GateKind,
        /// Wires acted upon.
        wires: Vec<usize>,
        /// Explicit unitary, for `QubitUnitary` gates.
        matrix: Option<Matrix>,
    },
    /// Expectation value of an observable: `[register] -> [f64, register]`.
    Expval {
        /// The measured observable.
        observable: Observable,
    },
    /// Mid-circuit measurement: `[register] -> [bool, register]`.
    MidMeasure {
        /// Unique measurement identifier.
        id: String,
        /// Measured wire.
        wire: usize,
    },
    /// See [`CondNode`].
    Conditional(CondNode),
    /// See [`WhileNode`].
    WhileLoop(WhileNode),
    /// See [`ForNode`].
    CountedLoop(ForNode),
    /// See [`CallNode`].
    FunctionCall(CallNode),
    /// See [`GradNode`].
    Gradient(GradNode),
}

impl OpKind {
    /// Short name of the operation kind.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Primitive(_) => "primitive",
            OpKind::Alloc { .. } => "alloc",
            OpKind::Gate { .. } => "gate",
            OpKind::Expval { .. } => "expval",
            OpKind::MidMeasure { .. } => "mid_measure",
            OpKind::Conditional(_) => "cond",
            OpKind::WhileLoop(_) => "while_loop",
            OpKind::CountedLoop(_) => "for_loop",
            OpKind::FunctionCall(_) => "func",
            OpKind::Gradient(_) => "grad",
        }
    }

    /// Whether this is a call of a captured function.
    pub fn is_function_call(&self) -> bool {
        matches!(self, OpKind::FunctionCall(_))
    }

    /// Nested programs held by this operation.
    pub fn subprograms(&self) -> Vec<&Program> {
        self.labelled_subprograms()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    pub(crate) fn labelled_subprograms(&self) -> Vec<(&'static str, &Program)> {
        match self {
            OpKind::Conditional(node) => {
                vec![("true", &node.true_branch), ("false", &node.false_branch)]
            }
            OpKind::WhileLoop(node) => vec![("cond", &node.cond), ("body", &node.body)],
            OpKind::CountedLoop(node) => vec![("body", &node.body)],
            OpKind::FunctionCall(node) => vec![("callee", &node.callee)],
            OpKind::Gradient(node) => vec![("callee", &node.callee)],
            _ => vec![],
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Primitive(p) => p.fmt(f),
            OpKind::Alloc { num_wires } => write!(f, "alloc[{num_wires}]"),
            OpKind::Gate { gate, wires, .. } => {
                write!(f, "{gate}[{}]", wires.iter().join(","))
            }
            OpKind::Expval { observable } => write!(f, "expval[{observable}]"),
            OpKind::MidMeasure { id, wire } => write!(f, "measure[{wire}, id={id}]"),
            OpKind::Conditional(node) => write!(f, "cond[out={}]", node.out_tree),
            OpKind::WhileLoop(node) => write!(
                f,
                "while_loop[cond_consts={}, body_consts={}]",
                node.cond_consts, node.body_consts
            ),
            OpKind::CountedLoop(node) => write!(f, "for_loop[body_consts={}]", node.body_consts),
            OpKind::FunctionCall(node) => write!(f, "func[{}]", node.callee.name()),
            OpKind::Gradient(node) => {
                write!(f, "grad[{}, method={}", node.callee.name(), node.method)?;
                if let Some(h) = node.h {
                    write!(f, ", h={h:e}")?;
                }
                write!(f, ", argnum=[{}]]", node.argnum.iter().join(","))
            }
        }
    }
}
