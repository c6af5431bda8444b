//! Abstract types attached to traced values.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

/// Element type of a traced value.
///
/// Variants are ordered by promotion rank: combining two dtypes yields the
/// larger one.
#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    I64,
    /// 64-bit float
    F64,
    /// Complex number with two 64-bit float components
    C128,
}

impl DType {
    /// Dtype resulting from combining two operands in an arithmetic operation.
    pub fn promote(self, other: DType) -> DType {
        self.max(other)
    }

    /// Whether values of this dtype are numbers that can carry a gradient.
    pub fn is_inexact(self) -> bool {
        matches!(self, DType::F64 | DType::C128)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}

/// Abstract value: a dtype and a static shape.
///
/// Scalars have an empty shape.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub struct ShapedType {
    /// Element type.
    pub dtype: DType,
    /// Static dimensions.
    pub shape: Vec<usize>,
}

impl ShapedType {
    /// A type with the given dtype and shape.
    pub fn new(dtype: DType, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            dtype,
            shape: shape.into(),
        }
    }

    /// A scalar of the given dtype.
    pub fn scalar(dtype: DType) -> Self {
        Self::new(dtype, vec![])
    }

    /// The boolean scalar type, required by loop predicates.
    pub fn bool_scalar() -> Self {
        Self::scalar(DType::Bool)
    }

    /// Whether this is a scalar.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Same shape, different dtype.
    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self::new(dtype, self.shape.clone())
    }
}

impl fmt::Display for ShapedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.dtype, self.shape.iter().join(","))
    }
}

/// The type of an IR variable.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum ValueType {
    /// A classical array or scalar.
    Shaped(ShapedType),
    /// The opaque quantum register.
    Register,
}

impl ValueType {
    /// Whether this is the register type.
    pub fn is_register(&self) -> bool {
        matches!(self, ValueType::Register)
    }

    /// The classical type, if any.
    pub fn as_shaped(&self) -> Option<&ShapedType> {
        match self {
            ValueType::Shaped(t) => Some(t),
            ValueType::Register => None,
        }
    }
}

impl From<ShapedType> for ValueType {
    fn from(t: ShapedType) -> Self {
        ValueType::Shaped(t)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Shaped(t) => t.fmt(f),
            ValueType::Register => f.write_str("!qreg"),
        }
    }
}
