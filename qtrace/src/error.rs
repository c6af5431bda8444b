//! Errors raised while tracing a program.

use derive_more::{Display, Error, From};
use smol_str::SmolStr;

/// Errors that can occur while tracing a program into the IR.
///
/// None of these are recoverable: they abort the trace that raised them and
/// are returned to the caller of the tracing entry point.
#[derive(Display, Debug, Error, From)]
#[non_exhaustive]
pub enum TraceError {
    /// A construct was used outside of the context it requires, or with a
    /// malformed callable.
    #[display("{message}")]
    Usage {
        /// Description of the misuse.
        message: String,
    },
    /// Two abstract types that are required to agree do not.
    #[display("{message}")]
    TypeMismatch {
        /// Description of the mismatch, including both offending types.
        message: String,
    },
    /// A compiler-internal invariant does not hold.
    #[display("{message}")]
    InternalConsistency {
        /// Description of the violated invariant.
        message: String,
    },
    /// Invalid construction parameters, detected before any tracing work.
    #[display("{message}")]
    Configuration {
        /// Description of the invalid parameter.
        message: String,
    },
    /// An operation or observable outside the device vocabulary survived
    /// decomposition.
    #[display("{name} is not supported by the device, even after decomposition.")]
    UnsupportedOperation {
        /// Name of the offending operation or observable.
        name: SmolStr,
    },
    /// An operation could not be decomposed.
    #[display("Could not decompose {name}: {message}")]
    Decomposition {
        /// Name of the operation.
        name: SmolStr,
        /// Reason for the failure.
        message: String,
    },
    /// Error while (de)serialising a program.
    #[display("Serialization error: {_0}")]
    #[from]
    Serialization(serde_json::Error),
    /// Error while reading or writing a serialised program.
    #[display("IO error: {_0}")]
    #[from]
    Io(std::io::Error),
}

impl TraceError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type TraceResult<T> = Result<T, TraceError>;
