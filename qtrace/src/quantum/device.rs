//! The device adapter: supported vocabulary and decomposition policy.

use std::collections::HashSet;

use itertools::Itertools;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::gates::{GateOp, Observable, ParamOps, QuantumOp};
use crate::error::{TraceError, TraceResult};

/// Log target for device events.
pub(crate) const LOG_TARGET: &str = "qtrace::device";

/// The only backend quantum functions can currently target.
pub const DEFAULT_BACKEND: &str = "lightning.qubit";

lazy_static! {
    /// Operations the device accepts without further decomposition.
    ///
    /// Besides gates this includes the names of the control-flow and
    /// measurement constructs, which are always lowered by this crate.
    pub static ref OPERATIONS: HashSet<&'static str> = [
        "MidCircuitMeasure",
        "Cond",
        "WhileLoop",
        "ForLoop",
        "PauliX",
        "PauliY",
        "PauliZ",
        "Hadamard",
        "Identity",
        "S",
        "T",
        "PhaseShift",
        "RX",
        "RY",
        "RZ",
        "CNOT",
        "CY",
        "CZ",
        "SWAP",
        "IsingXX",
        "IsingYY",
        "IsingXY",
        "IsingZZ",
        "ControlledPhaseShift",
        "CRX",
        "CRY",
        "CRZ",
        "CRot",
        "CSWAP",
        "MultiRZ",
        "QubitUnitary",
    ]
    .into_iter()
    .collect();

    /// Observables the device can measure.
    pub static ref OBSERVABLES: HashSet<&'static str> = [
        "Identity",
        "PauliX",
        "PauliY",
        "PauliZ",
        "Hadamard",
        "Hermitian",
        "Hamiltonian",
    ]
    .into_iter()
    .collect();
}

/// Configuration of a [`QJitDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// Number of shots used to estimate measurement statistics.
    pub shots: usize,
    /// Number of qubits.
    pub wires: usize,
    /// Maximum number of expansion rounds when decomposing gates.
    pub max_expansion: usize,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            shots: 1000,
            wires: 1,
            max_expansion: 10,
        }
    }
}

/// The device all quantum functions are traced against.
///
/// It declares which gates and observables may appear in the IR and rewrites
/// queued operations until only those remain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QJitDevice {
    options: DeviceOptions,
}

impl QJitDevice {
    /// A device with the given options.
    pub fn new(options: DeviceOptions) -> Self {
        Self { options }
    }

    /// A device with default options on `wires` qubits.
    pub fn with_wires(wires: usize) -> Self {
        Self::new(DeviceOptions {
            wires,
            ..Default::default()
        })
    }

    /// The device options.
    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// Number of qubits.
    pub fn num_wires(&self) -> usize {
        self.options.wires
    }

    /// Whether the device accepts the named operation as-is.
    pub fn supports_operation(&self, name: &str) -> bool {
        OPERATIONS.contains(name)
    }

    /// Whether the device can measure the named observable.
    pub fn supports_observable(&self, name: &str) -> bool {
        OBSERVABLES.contains(name)
    }

    /// Fail unless every wire exists on the device.
    pub fn check_wires(&self, wires: &[usize]) -> TraceResult<()> {
        match wires.iter().find(|&&w| w >= self.num_wires()) {
            None => Ok(()),
            Some(w) => Err(TraceError::usage(format!(
                "Wire {w} does not exist on a device with {} wires.",
                self.num_wires()
            ))),
        }
    }

    /// Fail unless the observable, and each factor of a composite observable,
    /// is supported and acts on existing wires.
    pub fn check_observable(&self, observable: &Observable) -> TraceResult<()> {
        match observable {
            Observable::Tensor(factors) => factors
                .iter()
                .try_for_each(|obs| self.check_observable(obs)),
            Observable::Hamiltonian { coeffs, terms } => {
                if coeffs.len() != terms.len() {
                    return Err(TraceError::usage(format!(
                        "A Hamiltonian with {} coefficients cannot have {} terms.",
                        coeffs.len(),
                        terms.len()
                    )));
                }
                terms.iter().try_for_each(|obs| self.check_observable(obs))
            }
            obs if self.supports_observable(&obs.name()) => self.check_wires(&obs.wires()),
            obs => Err(TraceError::UnsupportedOperation { name: obs.name() }),
        }
    }

    /// Rewrite queued operations into gates the device supports.
    ///
    /// Applied in order:
    /// 1. the gate library's own measurement is rejected,
    /// 2. controlled operations become a single explicit unitary on all of
    ///    their wires,
    /// 3. remaining unsupported gates are decomposed, for at most
    ///    `max_expansion` rounds,
    /// 4. anything still unsupported is an error.
    #[tracing::instrument(target = "qtrace::device", level = "debug", skip_all, fields(ops = ops.len()))]
    pub fn expand(
        &self,
        ops: Vec<QuantumOp>,
        params: &mut impl ParamOps,
    ) -> TraceResult<Vec<GateOp>> {
        if ops
            .iter()
            .any(|op| matches!(op, QuantumOp::LibraryMeasure { .. }))
        {
            return Err(TraceError::usage(
                "Must use 'measure' from qtrace instead of the gate library's measurement.",
            ));
        }

        let mut ops = ops;
        for round in 0..self.options.max_expansion {
            if ops.iter().all(|op| self.supports_operation(&op.name())) {
                break;
            }
            let mut changed = false;
            let mut next = Vec::with_capacity(ops.len());
            for op in ops {
                if self.supports_operation(&op.name()) {
                    next.push(op);
                    continue;
                }
                match self.decompose(&op, params)? {
                    Some(replacement) => {
                        tracing::trace!(
                            target: LOG_TARGET,
                            round,
                            op = %op.name(),
                            into = %replacement.iter().map(QuantumOp::name).join(", "),
                            "decomposed"
                        );
                        changed = true;
                        next.extend(replacement);
                    }
                    None => next.push(op),
                }
            }
            ops = next;
            if !changed {
                break;
            }
        }

        ops.into_iter()
            .map(|op| match op {
                QuantumOp::Gate(gate) if self.supports_operation(gate.kind().into()) => {
                    self.check_wires(gate.wires())?;
                    Ok(gate)
                }
                other => Err(TraceError::UnsupportedOperation { name: other.name() }),
            })
            .collect()
    }

    fn decompose(
        &self,
        op: &QuantumOp,
        params: &mut impl ParamOps,
    ) -> TraceResult<Option<Vec<QuantumOp>>> {
        match op {
            QuantumOp::Gate(gate) => gate.decomposition(params),
            QuantumOp::Controlled {
                base,
                control_wires,
            } => {
                let matrix = base.matrix().ok_or_else(|| TraceError::Decomposition {
                    name: SmolStr::new_static(base.kind().into()),
                    message: "controlled gates need concrete parameters to build their unitary."
                        .to_string(),
                })?;
                let unitary = GateOp::unitary(matrix.controlled(control_wires.len()), op.wires())?;
                Ok(Some(vec![unitary.into()]))
            }
            QuantumOp::ControlledQubitUnitary {
                matrix,
                control_wires,
                ..
            } => {
                let unitary = GateOp::unitary(matrix.controlled(control_wires.len()), op.wires())?;
                Ok(Some(vec![unitary.into()]))
            }
            QuantumOp::LibraryMeasure { .. } => Ok(None),
        }
    }
}

impl Default for QJitDevice {
    fn default() -> Self {
        Self::new(DeviceOptions::default())
    }
}
