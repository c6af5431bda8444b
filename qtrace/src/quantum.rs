//! Quantum programs: gate library, tapes, device and quantum functions.

pub mod device;
pub mod gates;
mod measure;
pub mod qfunc;
pub(crate) mod tape;

pub use device::{DeviceOptions, QJitDevice};
pub use gates::{GateKind, GateOp, Matrix, Observable, ObservableKind, QuantumOp};
pub use qfunc::{qfunc, QFunc};
