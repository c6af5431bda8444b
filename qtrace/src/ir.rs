//! The register-threaded functional IR produced by tracing.
//!
//! A [`Program`] is an ordered list of [`Operation`]s over typed input
//! variables. Control-flow operations hold their bodies as nested programs.
//! Quantum state is an explicit [`ValueType::Register`] variable that each
//! quantum operation consumes and replaces.

pub mod op;

use std::fmt::{self, Write};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::types::{DType, ShapedType, ValueType};

pub use op::{CallNode, CondNode, ForNode, GradNode, OpKind, Primitive, WhileNode};

/// An IR variable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Var(pub u32);

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A variable together with its type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedVar {
    /// The variable.
    pub var: Var,
    /// Its type.
    pub ty: ValueType,
}

impl TypedVar {
    /// Attach a type to a variable.
    pub fn new(var: Var, ty: impl Into<ValueType>) -> Self {
        Self { var, ty: ty.into() }
    }
}

impl fmt::Display for TypedVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.var, self.ty)
    }
}

/// A constant scalar embedded directly in the IR.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(i64),
    /// Float constant. Non-finite values are stored as strings in JSON.
    Float(#[serde(with = "float_repr")] f64),
}

mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(x: &f64, s: S) -> Result<S::Ok, S::Error> {
        if x.is_finite() {
            s.serialize_f64(*x)
        } else {
            s.serialize_str(&x.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Num(x) => Ok(x),
            Repr::Text(t) => t
                .parse::<f64>()
                .ok()
                .filter(|x| !x.is_finite())
                .ok_or_else(|| D::Error::custom(format!("invalid float literal {t:?}"))),
        }
    }
}

impl Literal {
    /// Dtype of the literal.
    pub fn dtype(&self) -> DType {
        match self {
            Literal::Bool(_) => DType::Bool,
            Literal::Int(_) => DType::I64,
            Literal::Float(_) => DType::F64,
        }
    }

    /// Abstract type of the literal; literals are always scalars.
    pub fn ty(&self) -> ShapedType {
        ShapedType::scalar(self.dtype())
    }

    /// Numeric value as a float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Literal::Bool(b) => b as u8 as f64,
            Literal::Int(i) => i as f64,
            Literal::Float(x) => x,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
        }
    }
}

/// An operand: either a variable or a literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Atom {
    /// A variable defined earlier in the program, or one of its inputs.
    Var(TypedVar),
    /// An inline constant.
    Literal(Literal),
}

impl Atom {
    /// The type of the operand.
    pub fn ty(&self) -> ValueType {
        match self {
            Atom::Var(v) => v.ty.clone(),
            Atom::Literal(l) => l.ty().into(),
        }
    }

    /// The variable, if this is not a literal.
    pub fn as_var(&self) -> Option<&TypedVar> {
        match self {
            Atom::Var(v) => Some(v),
            Atom::Literal(_) => None,
        }
    }

    /// Whether this operand is a register variable.
    pub fn is_register(&self) -> bool {
        self.ty().is_register()
    }
}

impl From<TypedVar> for Atom {
    fn from(v: TypedVar) -> Self {
        Atom::Var(v)
    }
}

impl From<Literal> for Atom {
    fn from(l: Literal) -> Self {
        Atom::Literal(l)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Var(v) => v.var.fmt(f),
            Atom::Literal(l) => l.fmt(f),
        }
    }
}

/// A single operation in a program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// What the operation does.
    pub kind: OpKind,
    /// Values consumed by the operation.
    pub operands: Vec<Atom>,
    /// Variables defined by the operation.
    pub results: Vec<TypedVar>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(kind: OpKind, operands: Vec<Atom>, results: Vec<TypedVar>) -> Self {
        Self {
            kind,
            operands,
            results,
        }
    }

    /// The register operand, if the operation consumes one.
    pub fn register_operand(&self) -> Option<&TypedVar> {
        self.operands
            .iter()
            .filter_map(Atom::as_var)
            .find(|v| v.ty.is_register())
    }

    /// The register result, if the operation produces one.
    pub fn register_result(&self) -> Option<&TypedVar> {
        self.results.iter().find(|v| v.ty.is_register())
    }

    /// Nested programs held by this operation.
    pub fn subprograms(&self) -> Vec<&Program> {
        self.kind.subprograms()
    }
}

/// A captured function: typed inputs, captured constants, operations and
/// outputs.
///
/// Programs are immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    name: SmolStr,
    consts: Vec<TypedVar>,
    inputs: Vec<TypedVar>,
    ops: Vec<Operation>,
    outputs: Vec<Atom>,
}

impl Program {
    pub(crate) fn new(
        name: impl Into<SmolStr>,
        consts: Vec<TypedVar>,
        inputs: Vec<TypedVar>,
        ops: Vec<Operation>,
        outputs: Vec<Atom>,
    ) -> Self {
        Self {
            name: name.into(),
            consts,
            inputs,
            ops,
            outputs,
        }
    }

    /// The same program, taking `consts` as its constants instead.
    ///
    /// `consts` must include every constant the program reads.
    pub(crate) fn with_consts(self, consts: Vec<TypedVar>) -> Self {
        Self { consts, ..self }
    }

    /// Name of the traced function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Captured constants, passed before the regular inputs.
    pub fn consts(&self) -> &[TypedVar] {
        &self.consts
    }

    /// Regular inputs.
    pub fn inputs(&self) -> &[TypedVar] {
        &self.inputs
    }

    /// Operations, in emission order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Output operands.
    pub fn outputs(&self) -> &[Atom] {
        &self.outputs
    }

    /// Types of the regular inputs.
    pub fn input_types(&self) -> Vec<ValueType> {
        self.inputs.iter().map(|v| v.ty.clone()).collect()
    }

    /// Types of all outputs, including a trailing register if there is one.
    pub fn output_types(&self) -> Vec<ValueType> {
        self.outputs.iter().map(Atom::ty).collect()
    }

    /// Types of the outputs visible to user code, i.e. without registers.
    pub fn user_output_types(&self) -> Vec<ValueType> {
        self.output_types()
            .into_iter()
            .filter(|t| !t.is_register())
            .collect()
    }

    /// Whether the program takes a register as its last input.
    pub fn threads_register(&self) -> bool {
        self.inputs.last().is_some_and(|v| v.ty.is_register())
    }

    /// Total number of operations, counting nested programs.
    pub fn num_operations(&self) -> usize {
        self.ops
            .iter()
            .map(|op| {
                1 + op
                    .subprograms()
                    .into_iter()
                    .map(Program::num_operations)
                    .sum::<usize>()
            })
            .sum()
    }

    fn write_indented(&self, f: &mut impl Write, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        writeln!(
            f,
            "{{ lambda {} ; {} . let",
            self.consts.iter().join(" "),
            self.inputs.iter().join(" ")
        )?;
        for op in &self.ops {
            write!(f, "{pad}    ")?;
            if !op.results.is_empty() {
                write!(f, "{} = ", op.results.iter().join(" "))?;
            }
            write!(f, "{}", op.kind)?;
            if !op.operands.is_empty() {
                write!(f, " {}", op.operands.iter().join(" "))?;
            }
            writeln!(f)?;
            for (label, sub) in op.kind.labelled_subprograms() {
                write!(f, "{pad}      {label}=")?;
                sub.write_indented(f, indent + 6)?;
            }
        }
        writeln!(f, "{pad}  in ({}) }}", self.outputs.iter().join(", "))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        self.write_indented(&mut s, 0)?;
        f.write_str(&s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DType;

    #[test]
    fn program_display() {
        let a = TypedVar::new(Var(0), ShapedType::scalar(DType::I64));
        let b = TypedVar::new(Var(1), ShapedType::scalar(DType::I64));
        let prog = Program::new(
            "inc",
            vec![],
            vec![a.clone()],
            vec![Operation::new(
                OpKind::Primitive(Primitive::Add),
                vec![a.into(), Literal::Int(1).into()],
                vec![b.clone()],
            )],
            vec![b.into()],
        );
        let text = prog.to_string();
        assert!(text.contains("%1:i64[] = add %0 1"));
        assert!(text.ends_with("in (%1) }\n"));
        assert_eq!(prog.num_operations(), 1);
        assert!(!prog.threads_register());
    }

    #[test]
    fn non_finite_floats_are_stored_as_strings() {
        let json = serde_json::to_string(&Literal::Float(f64::NEG_INFINITY)).unwrap();
        assert_eq!(json, r#"{"Float":"-inf"}"#);
        assert_eq!(
            serde_json::from_str::<Literal>(&json).unwrap(),
            Literal::Float(f64::NEG_INFINITY)
        );
        let nan: Literal = serde_json::from_str(r#"{"Float":"NaN"}"#).unwrap();
        assert!(nan.as_f64().is_nan());
        assert_eq!(
            serde_json::to_string(&Literal::Float(0.5)).unwrap(),
            r#"{"Float":0.5}"#
        );
        assert!(serde_json::from_str::<Literal>(r#"{"Float":"1.5"}"#).is_err());
    }
}
