//! Classical primitives, with type promotion and constant folding.

use super::{TraceContext, Value};
use crate::error::{TraceError, TraceResult};
use crate::ir::{Literal, OpKind, Primitive};
use crate::types::{DType, ShapedType};

impl TraceContext {
    /// Apply a primitive to its operands.
    ///
    /// When every operand is a literal the result is computed right away and
    /// nothing is recorded.
    pub fn bind(&mut self, prim: Primitive, args: &[Value]) -> TraceResult<Value> {
        if args.len() != prim.arity() {
            return Err(TraceError::usage(format!(
                "{prim} takes {} operands, but {} were given.",
                prim.arity(),
                args.len()
            )));
        }
        let avals: Vec<ShapedType> = args.iter().map(Value::aval).collect();
        let out_ty = result_type(prim, &avals)?;
        let literals: Option<Vec<Literal>> = args.iter().map(Value::as_literal).collect();
        if let Some(folded) = literals.and_then(|lits| fold(prim, &lits)) {
            return Ok(Value::Literal(folded));
        }
        let operands = args.iter().map(Value::to_atom).collect();
        let mut outs = self.emit(OpKind::Primitive(prim), operands, vec![out_ty])?;
        outs.pop()
            .map(Value::Tracer)
            .ok_or_else(|| TraceError::internal(format!("{prim} produced no result.")))
    }

    /// `a + b`
    pub fn add(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Add, &[a.into(), b.into()])
    }

    /// `a - b`
    pub fn sub(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Sub, &[a.into(), b.into()])
    }

    /// `a * b`
    pub fn mul(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Mul, &[a.into(), b.into()])
    }

    /// `-a`
    pub fn neg(&mut self, a: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Neg, &[a.into()])
    }

    /// `a < b`
    pub fn lt(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Lt, &[a.into(), b.into()])
    }

    /// `a <= b`
    pub fn le(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Le, &[a.into(), b.into()])
    }

    /// `a > b`
    pub fn gt(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Gt, &[a.into(), b.into()])
    }

    /// `a >= b`
    pub fn ge(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Ge, &[a.into(), b.into()])
    }

    /// `a == b`
    pub fn eq(&mut self, a: impl Into<Value>, b: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Eq, &[a.into(), b.into()])
    }

    /// Logical negation of a boolean.
    pub fn not(&mut self, a: impl Into<Value>) -> TraceResult<Value> {
        self.bind(Primitive::Not, &[a.into()])
    }

    /// Convert to another dtype, keeping the shape.
    pub fn convert(&mut self, a: impl Into<Value>, dtype: DType) -> TraceResult<Value> {
        self.bind(Primitive::Convert(dtype), &[a.into()])
    }
}

fn broadcast(prim: Primitive, a: &ShapedType, b: &ShapedType) -> TraceResult<Vec<usize>> {
    if a.shape == b.shape || b.is_scalar() {
        Ok(a.shape.clone())
    } else if a.is_scalar() {
        Ok(b.shape.clone())
    } else {
        Err(TraceError::type_mismatch(format!(
            "Incompatible shapes for {prim}: {a} and {b}."
        )))
    }
}

/// Abstract type of the result of `prim`.
pub(crate) fn result_type(prim: Primitive, avals: &[ShapedType]) -> TraceResult<ShapedType> {
    use Primitive::*;
    match (prim, avals) {
        (Add | Sub | Mul, [a, b]) => {
            let shape = broadcast(prim, a, b)?;
            let dtype = a.dtype.promote(b.dtype).promote(DType::I64);
            Ok(ShapedType::new(dtype, shape))
        }
        (Lt | Le | Gt | Ge, [a, b]) if a.dtype == DType::C128 || b.dtype == DType::C128 => {
            Err(TraceError::type_mismatch(format!(
                "{prim} is not defined for complex operands ({a}, {b})."
            )))
        }
        (Lt | Le | Gt | Ge | Eq, [a, b]) => {
            Ok(ShapedType::new(DType::Bool, broadcast(prim, a, b)?))
        }
        (Neg, [a]) => Ok(a.with_dtype(a.dtype.promote(DType::I64))),
        (Not, [a]) if a.dtype == DType::Bool => Ok(a.clone()),
        (Not, [a]) => Err(TraceError::type_mismatch(format!(
            "not expects a boolean operand, got {a}."
        ))),
        (Convert(dtype), [a]) => Ok(a.with_dtype(dtype)),
        _ => Err(TraceError::internal(format!(
            "{prim} applied to {} operands.",
            avals.len()
        ))),
    }
}

/// Evaluate `prim` on literals, if the result is itself a literal.
fn fold(prim: Primitive, args: &[Literal]) -> Option<Literal> {
    use Primitive::*;
    let any_float = args.iter().any(|l| matches!(l, Literal::Float(_)));
    let int = |l: &Literal| match *l {
        Literal::Bool(b) => i64::from(b),
        Literal::Int(i) => i,
        Literal::Float(x) => x as i64,
    };
    Some(match (prim, args) {
        (Add | Sub | Mul, [a, b]) if any_float => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Literal::Float(match prim {
                Add => x + y,
                Sub => x - y,
                _ => x * y,
            })
        }
        (Add | Sub | Mul, [a, b]) => {
            let (x, y) = (int(a), int(b));
            Literal::Int(match prim {
                Add => x.wrapping_add(y),
                Sub => x.wrapping_sub(y),
                _ => x.wrapping_mul(y),
            })
        }
        (Neg, [Literal::Float(x)]) => Literal::Float(-x),
        (Neg, [a]) => Literal::Int(int(a).wrapping_neg()),
        (Lt | Le | Gt | Ge | Eq, [a, b]) => {
            let ord = if any_float {
                a.as_f64().partial_cmp(&b.as_f64())
            } else {
                Some(int(a).cmp(&int(b)))
            };
            Literal::Bool(ord.is_some_and(|o| match prim {
                Lt => o.is_lt(),
                Le => o.is_le(),
                Gt => o.is_gt(),
                Ge => o.is_ge(),
                _ => o.is_eq(),
            }))
        }
        (Not, [Literal::Bool(b)]) => Literal::Bool(!b),
        (Convert(DType::Bool), [a]) => Literal::Bool(a.as_f64() != 0.0),
        (Convert(DType::I64), [a]) => Literal::Int(int(a)),
        (Convert(DType::F64), [a]) => Literal::Float(a.as_f64()),
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::trace::{trace_program, TracedFn};
    use crate::types::ValueType;

    #[rstest]
    #[case(Primitive::Add, Literal::Int(2), Literal::Int(3), Literal::Int(5))]
    #[case(Primitive::Sub, Literal::Int(2), Literal::Float(0.5), Literal::Float(1.5))]
    #[case(Primitive::Mul, Literal::Bool(true), Literal::Int(7), Literal::Int(7))]
    #[case(Primitive::Lt, Literal::Int(2), Literal::Int(3), Literal::Bool(true))]
    #[case(Primitive::Ge, Literal::Float(2.0), Literal::Int(3), Literal::Bool(false))]
    #[case(Primitive::Eq, Literal::Int(4), Literal::Float(4.0), Literal::Bool(true))]
    fn literals_are_folded(
        #[case] prim: Primitive,
        #[case] a: Literal,
        #[case] b: Literal,
        #[case] expected: Literal,
    ) {
        let mut ctx = TraceContext::new();
        let out = ctx.bind(prim, &[a.into(), b.into()]).unwrap();
        assert_eq!(out, Value::Literal(expected));
    }

    #[rstest]
    #[case(DType::Bool, DType::Bool, DType::I64)]
    #[case(DType::I64, DType::F64, DType::F64)]
    #[case(DType::C128, DType::I64, DType::C128)]
    fn arithmetic_promotion(#[case] a: DType, #[case] b: DType, #[case] expected: DType) {
        let ty = result_type(
            Primitive::Add,
            &[ShapedType::scalar(a), ShapedType::scalar(b)],
        )
        .unwrap();
        assert_eq!(ty, ShapedType::scalar(expected));
    }

    #[test]
    fn scalars_broadcast_against_arrays() {
        let arr = ShapedType::new(DType::F64, [3]);
        let ty = result_type(Primitive::Lt, &[arr.clone(), ShapedType::scalar(DType::I64)]).unwrap();
        assert_eq!(ty, ShapedType::new(DType::Bool, [3]));
        assert_matches!(
            result_type(Primitive::Mul, &[arr, ShapedType::new(DType::F64, [2])]),
            Err(TraceError::TypeMismatch { .. })
        );
    }

    #[test]
    fn not_requires_bool() {
        assert_matches!(
            result_type(Primitive::Not, &[ShapedType::scalar(DType::I64)]),
            Err(TraceError::TypeMismatch { .. })
        );
    }

    #[test]
    fn tracers_are_recorded() {
        let f = TracedFn::new("f", 1, |ctx, args| {
            let y = ctx.mul(&args[0], 2)?;
            Ok(ctx.lt(y, 10)?.into())
        });
        let prog = trace_program("f", &[ShapedType::scalar(DType::I64)], &f).unwrap();
        assert_eq!(prog.ops().len(), 2);
        assert_eq!(prog.output_types(), vec![ValueType::from(ShapedType::bool_scalar())]);
    }

    #[test]
    fn folding_needs_no_context() {
        let mut ctx = TraceContext::new();
        assert_eq!(ctx.neg(3).unwrap(), Value::from(-3i64));
        assert_matches!(
            ctx.convert(Value::from(true), DType::C128),
            Err(TraceError::Usage { .. })
        );
    }
}
