//! User-level values and traced functions.

use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use super::TraceContext;
use crate::error::TraceResult;
use crate::ir::{Atom, Literal, TypedVar, Var};
use crate::tree::Tree;
use crate::types::ShapedType;

/// Placeholder for a value that is only known once the program runs.
#[derive(Clone, Debug, PartialEq)]
pub struct Tracer {
    var: Var,
    ty: ShapedType,
}

impl Tracer {
    pub(crate) fn new(var: Var, ty: ShapedType) -> Self {
        Self { var, ty }
    }

    /// The IR variable standing for this value.
    pub fn var(&self) -> Var {
        self.var
    }

    /// Abstract type of the value.
    pub fn ty(&self) -> &ShapedType {
        &self.ty
    }

    pub(crate) fn typed_var(&self) -> TypedVar {
        TypedVar::new(self.var, self.ty.clone())
    }
}

/// A value seen by user code while tracing: a constant or a tracer.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A concrete constant.
    Literal(Literal),
    /// An abstract placeholder.
    Tracer(Tracer),
}

impl Value {
    /// Abstract type of the value.
    pub fn aval(&self) -> ShapedType {
        match self {
            Value::Literal(l) => l.ty(),
            Value::Tracer(t) => t.ty.clone(),
        }
    }

    /// The tracer, if the value is not a constant.
    pub fn as_tracer(&self) -> Option<&Tracer> {
        match self {
            Value::Tracer(t) => Some(t),
            Value::Literal(_) => None,
        }
    }

    /// The constant, if the value is one.
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Literal(l) => Some(*l),
            Value::Tracer(_) => None,
        }
    }

    /// The value as an IR operand.
    pub fn to_atom(&self) -> Atom {
        match self {
            Value::Literal(l) => Atom::Literal(*l),
            Value::Tracer(t) => Atom::Var(t.typed_var()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(l) => l.fmt(f),
            Value::Tracer(t) => write!(f, "Tracer<{}>({})", t.ty, t.var),
        }
    }
}

impl From<Value> for Atom {
    fn from(v: Value) -> Self {
        v.to_atom()
    }
}

impl From<Tracer> for Value {
    fn from(t: Tracer) -> Self {
        Value::Tracer(t)
    }
}

impl From<Literal> for Value {
    fn from(l: Literal) -> Self {
        Value::Literal(l)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Literal(Literal::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Literal(Literal::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Literal(Literal::Int(i.into()))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Literal(Literal::Float(x))
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

type TracedBody<'f> = dyn Fn(&mut TraceContext, &[Value]) -> TraceResult<Tree<Value>> + 'f;

/// A function that can be traced: a declared number of arguments and a body.
///
/// The body is run once per capture, with tracers standing in for its
/// arguments, and returns its outputs as a [`Tree`].
#[derive(Clone)]
pub struct TracedFn<'f> {
    name: SmolStr,
    arity: usize,
    body: Rc<TracedBody<'f>>,
}

impl<'f> TracedFn<'f> {
    /// A function taking `arity` arguments.
    pub fn new(
        name: impl Into<SmolStr>,
        arity: usize,
        body: impl Fn(&mut TraceContext, &[Value]) -> TraceResult<Tree<Value>> + 'f,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            body: Rc::new(body),
        }
    }

    /// A function taking no arguments.
    pub fn nullary(
        name: impl Into<SmolStr>,
        body: impl Fn(&mut TraceContext) -> TraceResult<Tree<Value>> + 'f,
    ) -> Self {
        Self::new(name, 0, move |ctx, _| body(ctx))
    }

    /// Name of the function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared number of arguments.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// The same function under a different name.
    pub fn renamed(&self, name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Run the body directly, without capturing it.
    pub(crate) fn invoke(&self, ctx: &mut TraceContext, args: &[Value]) -> TraceResult<Tree<Value>> {
        (self.body)(ctx, args)
    }
}

impl fmt::Debug for TracedFn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}
