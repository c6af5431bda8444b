//! Gate library: named gates, their matrices and their decompositions.
//!
//! This is the vocabulary user code queues onto a quantum tape. Which of these
//! a device accepts as-is is decided by the device, see
//! [`QJitDevice`](super::device::QJitDevice).

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4};
use std::fmt;

use itertools::Itertools;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{TraceError, TraceResult};
use crate::ir::{Atom, Literal};
use crate::trace::Value;

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
    Display,
    IntoStaticStr,
    EnumString,
)]
#[non_exhaustive]
/// Named gates known to the gate library.
//
// When adding new gates, make sure to also edit `GateKind::num_wires`,
// `GateKind::num_params`, and the decomposition rules in this file.
pub enum GateKind {
    /// Identity
    Identity,
    /// Pauli X
    PauliX,
    /// Pauli Y
    PauliY,
    /// Pauli Z
    PauliZ,
    /// Hadamard gate
    Hadamard,
    /// S gate
    S,
    /// T gate
    T,
    /// Phase shift by an angle in radians
    PhaseShift,
    /// X rotation
    RX,
    /// Y rotation
    RY,
    /// Z rotation
    RZ,
    /// General rotation
    ///
    /// Rot(φ, θ, ω) = RZ(ω) RY(θ) RZ(φ)
    Rot,
    /// Controlled X
    CNOT,
    /// Controlled Y
    CY,
    /// Controlled Z
    CZ,
    /// Controlled Hadamard
    CH,
    /// Swap two qubits
    SWAP,
    /// Ising XX coupling
    IsingXX,
    /// Ising YY coupling
    IsingYY,
    /// Ising XY coupling
    IsingXY,
    /// Ising ZZ coupling
    IsingZZ,
    /// Controlled phase shift
    ControlledPhaseShift,
    /// Controlled X rotation
    CRX,
    /// Controlled Y rotation
    CRY,
    /// Controlled Z rotation
    CRZ,
    /// Controlled general rotation
    CRot,
    /// Controlled swap
    CSWAP,
    /// Toffoli gate, or double-controlled X
    Toffoli,
    /// Z rotation on the parity of any number of qubits
    MultiRZ,
    /// U1 gate
    ///
    /// U1(φ) = PhaseShift(φ)
    U1,
    /// U2 gate
    U2,
    /// U3 gate, parametric on three Euler angles
    U3,
    /// Arbitrary unitary given as an explicit matrix
    QubitUnitary,
}

impl GateKind {
    /// Number of wires the gate acts on, or `None` if it accepts any number.
    pub fn num_wires(&self) -> Option<usize> {
        use GateKind::*;
        match self {
            Identity | PauliX | PauliY | PauliZ | Hadamard | S | T | PhaseShift | RX | RY | RZ
            | Rot | U1 | U2 | U3 => Some(1),
            CNOT | CY | CZ | CH | SWAP | IsingXX | IsingYY | IsingXY | IsingZZ
            | ControlledPhaseShift | CRX | CRY | CRZ | CRot => Some(2),
            CSWAP | Toffoli => Some(3),
            MultiRZ | QubitUnitary => None,
        }
    }

    /// Number of angle parameters the gate takes.
    pub fn num_params(&self) -> usize {
        use GateKind::*;
        match self {
            PhaseShift | RX | RY | RZ | IsingXX | IsingYY | IsingXY | IsingZZ
            | ControlledPhaseShift | CRX | CRY | CRZ | MultiRZ | U1 => 1,
            U2 => 2,
            Rot | CRot | U3 => 3,
            _ => 0,
        }
    }

    /// Unitary matrix of the gate for concrete parameters, if the library
    /// knows it.
    pub fn matrix(&self, params: &[f64]) -> Option<Matrix> {
        use GateKind::*;
        let c = |re: f64| Complex64::new(re, 0.0);
        let phase = |angle: f64| Complex64::from_polar(1.0, angle);
        let one = c(1.0);
        let zero = c(0.0);
        let i = Complex64::i();
        let p = |k: usize| params.get(k).copied();
        Some(match self {
            Identity => Matrix::identity(2),
            PauliX => Matrix::from_rows(vec![vec![zero, one], vec![one, zero]]),
            PauliY => Matrix::from_rows(vec![vec![zero, -i], vec![i, zero]]),
            PauliZ => Matrix::from_rows(vec![vec![one, zero], vec![zero, -one]]),
            Hadamard => Matrix::from_rows(vec![
                vec![c(FRAC_1_SQRT_2), c(FRAC_1_SQRT_2)],
                vec![c(FRAC_1_SQRT_2), c(-FRAC_1_SQRT_2)],
            ]),
            S => Matrix::diagonal(vec![one, i]),
            T => Matrix::diagonal(vec![one, phase(FRAC_PI_4)]),
            PhaseShift | U1 => Matrix::diagonal(vec![one, phase(p(0)?)]),
            RX => {
                let (s, co) = (p(0)? / 2.0).sin_cos();
                Matrix::from_rows(vec![vec![c(co), -i * s], vec![-i * s, c(co)]])
            }
            RY => {
                let (s, co) = (p(0)? / 2.0).sin_cos();
                Matrix::from_rows(vec![vec![c(co), c(-s)], vec![c(s), c(co)]])
            }
            RZ => {
                let half = p(0)? / 2.0;
                Matrix::diagonal(vec![phase(-half), phase(half)])
            }
            Rot => {
                let (phi, theta, omega) = (p(0)?, p(1)?, p(2)?);
                let (s, co) = (theta / 2.0).sin_cos();
                Matrix::from_rows(vec![
                    vec![phase(-(phi + omega) / 2.0) * co, -phase((phi - omega) / 2.0) * s],
                    vec![phase(-(phi - omega) / 2.0) * s, phase((phi + omega) / 2.0) * co],
                ])
            }
            CNOT => PauliX.matrix(&[])?.controlled(1),
            CY => PauliY.matrix(&[])?.controlled(1),
            CZ => PauliZ.matrix(&[])?.controlled(1),
            CH => Hadamard.matrix(&[])?.controlled(1),
            ControlledPhaseShift => PhaseShift.matrix(params)?.controlled(1),
            CRX => RX.matrix(params)?.controlled(1),
            CRY => RY.matrix(params)?.controlled(1),
            CRZ => RZ.matrix(params)?.controlled(1),
            CRot => Rot.matrix(params)?.controlled(1),
            Toffoli => PauliX.matrix(&[])?.controlled(2),
            SWAP => Matrix::permutation(&[0, 2, 1, 3]),
            CSWAP => Matrix::permutation(&[0, 1, 2, 3, 4, 6, 5, 7]),
            _ => return None,
        })
    }
}

/// A dense, row-major complex matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    dim: usize,
    data: Vec<Complex64>,
}

impl Matrix {
    /// Identity of the given dimension.
    pub fn identity(dim: usize) -> Self {
        Self::diagonal(vec![Complex64::new(1.0, 0.0); dim])
    }

    /// Diagonal matrix with the given entries.
    pub fn diagonal(entries: Vec<Complex64>) -> Self {
        let dim = entries.len();
        let mut data = vec![Complex64::new(0.0, 0.0); dim * dim];
        for (k, e) in entries.into_iter().enumerate() {
            data[k * dim + k] = e;
        }
        Self { dim, data }
    }

    /// Permutation matrix mapping basis state `k` to `perm[k]`.
    pub fn permutation(perm: &[usize]) -> Self {
        let dim = perm.len();
        let mut data = vec![Complex64::new(0.0, 0.0); dim * dim];
        for (k, &target) in perm.iter().enumerate() {
            data[target * dim + k] = Complex64::new(1.0, 0.0);
        }
        Self { dim, data }
    }

    /// Build a matrix from its rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not form a square matrix.
    pub fn from_rows(rows: Vec<Vec<Complex64>>) -> Self {
        let dim = rows.len();
        assert!(
            rows.iter().all(|r| r.len() == dim),
            "matrix rows must form a square matrix"
        );
        Self {
            dim,
            data: rows.into_iter().flatten().collect(),
        }
    }

    /// Number of rows.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of qubits the matrix acts on, if its dimension is a power of two.
    pub fn num_wires(&self) -> Option<usize> {
        self.dim
            .is_power_of_two()
            .then(|| self.dim.trailing_zeros() as usize)
    }

    /// Entry at the given row and column.
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.dim + col]
    }

    /// The matrix controlled on `num_controls` leading qubits.
    ///
    /// The result is the identity, except for the block where all controls are
    /// set, which holds `self`.
    pub fn controlled(&self, num_controls: usize) -> Self {
        let dim = self.dim << num_controls;
        let offset = dim - self.dim;
        let mut out = Self::identity(dim);
        for row in 0..self.dim {
            for col in 0..self.dim {
                out.data[(offset + row) * dim + offset + col] = self.get(row, col);
            }
        }
        out
    }
}

/// A named gate applied to wires, with its parameters as IR operands.
#[derive(Clone, Debug, PartialEq)]
pub struct GateOp {
    kind: GateKind,
    wires: Vec<usize>,
    params: Vec<Atom>,
    matrix: Option<Matrix>,
}

impl GateOp {
    /// Create a gate, checking its wire and parameter counts.
    pub fn new<P: Into<Value>>(
        kind: GateKind,
        wires: impl Into<Vec<usize>>,
        params: impl IntoIterator<Item = P>,
    ) -> TraceResult<Self> {
        let wires = wires.into();
        let params = params.into_iter().map(|p| p.into().into()).collect_vec();
        if kind == GateKind::QubitUnitary {
            return Err(TraceError::usage(
                "QubitUnitary gates must be created with `GateOp::unitary`.",
            ));
        }
        if let Some(n) = kind.num_wires() {
            if n != wires.len() {
                return Err(TraceError::usage(format!(
                    "{kind} acts on {n} wires, but {} were given.",
                    wires.len()
                )));
            }
        }
        if kind.num_params() != params.len() {
            return Err(TraceError::usage(format!(
                "{kind} takes {} parameters, but {} were given.",
                kind.num_params(),
                params.len()
            )));
        }
        Self::from_parts(kind, wires, params, None)
    }

    /// An explicit unitary acting on the given wires.
    pub fn unitary(matrix: Matrix, wires: impl Into<Vec<usize>>) -> TraceResult<Self> {
        let wires = wires.into();
        if matrix.num_wires() != Some(wires.len()) {
            return Err(TraceError::usage(format!(
                "A {0}x{0} matrix cannot act on {1} wires.",
                matrix.dim(),
                wires.len()
            )));
        }
        Self::from_parts(GateKind::QubitUnitary, wires, vec![], Some(matrix))
    }

    fn from_parts(
        kind: GateKind,
        wires: Vec<usize>,
        params: Vec<Atom>,
        matrix: Option<Matrix>,
    ) -> TraceResult<Self> {
        if !wires.iter().all_unique() {
            return Err(TraceError::usage(format!(
                "{kind} applied to repeated wires [{}].",
                wires.iter().join(", ")
            )));
        }
        Ok(Self {
            kind,
            wires,
            params,
            matrix,
        })
    }

    /// The gate kind.
    pub fn kind(&self) -> GateKind {
        self.kind
    }

    /// Wires acted upon.
    pub fn wires(&self) -> &[usize] {
        &self.wires
    }

    /// Parameter operands.
    pub fn params(&self) -> &[Atom] {
        &self.params
    }

    /// Explicit matrix of a `QubitUnitary`.
    pub fn explicit_matrix(&self) -> Option<&Matrix> {
        self.matrix.as_ref()
    }

    pub(crate) fn into_parts(self) -> (GateKind, Vec<usize>, Vec<Atom>, Option<Matrix>) {
        (self.kind, self.wires, self.params, self.matrix)
    }

    /// Parameters as floats, if none of them is traced.
    pub fn concrete_params(&self) -> Option<Vec<f64>> {
        self.params
            .iter()
            .map(|p| match p {
                Atom::Literal(l) => Some(l.as_f64()),
                Atom::Var(_) => None,
            })
            .collect()
    }

    /// Unitary matrix of the gate, if its parameters are concrete.
    pub fn matrix(&self) -> Option<Matrix> {
        match &self.matrix {
            Some(m) => Some(m.clone()),
            None => self.kind.matrix(&self.concrete_params()?),
        }
    }

    /// Decomposition into other gates, if the library has one.
    ///
    /// Parameter arithmetic is delegated to `params`, as parameters may be
    /// traced values.
    pub fn decomposition(&self, params: &mut impl ParamOps) -> TraceResult<Option<Vec<QuantumOp>>> {
        use GateKind::*;
        let w = self.wires.clone();
        let p = &self.params;
        let gate = |kind, wires: Vec<usize>, params: Vec<Atom>| {
            QuantumOp::Gate(GateOp {
                kind,
                wires,
                params,
                matrix: None,
            })
        };
        let float = |x: f64| Atom::Literal(Literal::Float(x));
        Ok(Some(match self.kind {
            Rot => vec![
                gate(RZ, w.clone(), vec![p[0].clone()]),
                gate(RY, w.clone(), vec![p[1].clone()]),
                gate(RZ, w, vec![p[2].clone()]),
            ],
            U1 => vec![gate(PhaseShift, w, vec![p[0].clone()])],
            U2 => {
                let neg_delta = params.neg(&p[1])?;
                vec![
                    gate(Rot, w.clone(), vec![p[1].clone(), float(FRAC_PI_2), neg_delta]),
                    gate(PhaseShift, w.clone(), vec![p[1].clone()]),
                    gate(PhaseShift, w, vec![p[0].clone()]),
                ]
            }
            U3 => {
                let neg_delta = params.neg(&p[2])?;
                vec![
                    gate(Rot, w.clone(), vec![p[2].clone(), p[0].clone(), neg_delta]),
                    gate(PhaseShift, w.clone(), vec![p[2].clone()]),
                    gate(PhaseShift, w, vec![p[1].clone()]),
                ]
            }
            CH => vec![QuantumOp::Controlled {
                base: GateOp {
                    kind: Hadamard,
                    wires: vec![w[1]],
                    params: vec![],
                    matrix: None,
                },
                control_wires: vec![w[0]],
            }],
            Toffoli => {
                let (a, b, c) = (w[0], w[1], w[2]);
                let tdg = |q| gate(PhaseShift, vec![q], vec![float(-FRAC_PI_4)]);
                vec![
                    gate(Hadamard, vec![c], vec![]),
                    gate(CNOT, vec![b, c], vec![]),
                    tdg(c),
                    gate(CNOT, vec![a, c], vec![]),
                    gate(T, vec![c], vec![]),
                    gate(CNOT, vec![b, c], vec![]),
                    tdg(c),
                    gate(CNOT, vec![a, c], vec![]),
                    gate(T, vec![b], vec![]),
                    gate(T, vec![c], vec![]),
                    gate(Hadamard, vec![c], vec![]),
                    gate(CNOT, vec![a, b], vec![]),
                    gate(T, vec![a], vec![]),
                    tdg(b),
                    gate(CNOT, vec![a, b], vec![]),
                ]
            }
            _ => return Ok(None),
        }))
    }
}

/// Arithmetic on gate parameters needed by decompositions.
pub trait ParamOps {
    /// Negate a parameter.
    fn neg(&mut self, param: &Atom) -> TraceResult<Atom>;
}

/// An operation queued by user code on a quantum tape.
#[derive(Clone, Debug, PartialEq)]
pub enum QuantumOp {
    /// A named gate.
    Gate(GateOp),
    /// A gate controlled on additional wires.
    Controlled {
        /// The controlled gate.
        base: GateOp,
        /// Control wires, all of which must be set.
        control_wires: Vec<usize>,
    },
    /// An explicit unitary controlled on additional wires.
    ControlledQubitUnitary {
        /// The target unitary.
        matrix: Matrix,
        /// Control wires.
        control_wires: Vec<usize>,
        /// Target wires.
        wires: Vec<usize>,
    },
    /// The gate library's own mid-circuit measurement primitive.
    ///
    /// Programs must use [`TraceContext::measure`](crate::TraceContext::measure)
    /// instead; devices reject this operation.
    LibraryMeasure {
        /// Measured wire.
        wire: usize,
    },
}

impl QuantumOp {
    /// A named gate, see [`GateOp::new`].
    pub fn gate<P: Into<Value>>(
        kind: GateKind,
        wires: impl Into<Vec<usize>>,
        params: impl IntoIterator<Item = P>,
    ) -> TraceResult<Self> {
        Ok(QuantumOp::Gate(GateOp::new(kind, wires, params)?))
    }

    /// A gate controlled on additional wires.
    pub fn controlled(base: GateOp, control_wires: impl Into<Vec<usize>>) -> TraceResult<Self> {
        let control_wires = control_wires.into();
        if control_wires.iter().any(|c| base.wires.contains(c)) {
            return Err(TraceError::usage(format!(
                "Control wires of a controlled {} overlap its target wires.",
                base.kind
            )));
        }
        Ok(QuantumOp::Controlled {
            base,
            control_wires,
        })
    }

    /// Name of the operation, as checked against a device vocabulary.
    pub fn name(&self) -> SmolStr {
        match self {
            QuantumOp::Gate(g) => SmolStr::new_static(g.kind.into()),
            QuantumOp::Controlled { .. } => SmolStr::new_static("Controlled"),
            QuantumOp::ControlledQubitUnitary { .. } => {
                SmolStr::new_static("ControlledQubitUnitary")
            }
            QuantumOp::LibraryMeasure { .. } => SmolStr::new_static("MidMeasureMP"),
        }
    }

    /// All wires the operation acts on.
    pub fn wires(&self) -> Vec<usize> {
        match self {
            QuantumOp::Gate(g) => g.wires.clone(),
            QuantumOp::Controlled {
                base,
                control_wires,
            } => control_wires.iter().chain(&base.wires).copied().collect(),
            QuantumOp::ControlledQubitUnitary {
                control_wires,
                wires,
                ..
            } => control_wires.iter().chain(wires).copied().collect(),
            QuantumOp::LibraryMeasure { wire } => vec![*wire],
        }
    }
}

impl From<GateOp> for QuantumOp {
    fn from(g: GateOp) -> Self {
        QuantumOp::Gate(g)
    }
}

/// Named single-qubit observables.
#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Display,
    IntoStaticStr,
    EnumString,
)]
#[allow(missing_docs)]
pub enum ObservableKind {
    Identity,
    PauliX,
    PauliY,
    PauliZ,
    Hadamard,
}

/// An observable measured by an expectation value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Observable {
    /// A named single-qubit observable.
    Named {
        /// Which observable.
        kind: ObservableKind,
        /// Wire it acts on.
        wire: usize,
    },
    /// An explicit Hermitian matrix.
    Hermitian {
        /// The matrix.
        matrix: Matrix,
        /// Wires it acts on.
        wires: Vec<usize>,
    },
    /// Projector onto a computational basis state.
    Projector {
        /// The basis state, one bit per wire.
        basis_state: Vec<u8>,
        /// Wires it acts on.
        wires: Vec<usize>,
    },
    /// Tensor product of observables on disjoint wires.
    Tensor(Vec<Observable>),
    /// Linear combination of observables.
    Hamiltonian {
        /// Coefficients, one per term.
        coeffs: Vec<f64>,
        /// Terms.
        terms: Vec<Observable>,
    },
}

impl Observable {
    /// A named observable on one wire.
    pub fn named(kind: ObservableKind, wire: usize) -> Self {
        Observable::Named { kind, wire }
    }

    /// Name of the observable, as checked against a device vocabulary.
    pub fn name(&self) -> SmolStr {
        match self {
            Observable::Named { kind, .. } => SmolStr::new_static(kind.into()),
            Observable::Hermitian { .. } => SmolStr::new_static("Hermitian"),
            Observable::Projector { .. } => SmolStr::new_static("Projector"),
            Observable::Tensor(_) => SmolStr::new_static("Tensor"),
            Observable::Hamiltonian { .. } => SmolStr::new_static("Hamiltonian"),
        }
    }

    /// Wires the observable acts on, without repetitions.
    pub fn wires(&self) -> Vec<usize> {
        match self {
            Observable::Named { wire, .. } => vec![*wire],
            Observable::Hermitian { wires, .. } | Observable::Projector { wires, .. } => {
                wires.clone()
            }
            Observable::Tensor(factors) => factors.iter().flat_map(|o| o.wires()).unique().collect(),
            Observable::Hamiltonian { terms, .. } => {
                terms.iter().flat_map(|o| o.wires()).unique().collect()
            }
        }
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observable::Named { kind, wire } => write!(f, "{kind}({wire})"),
            Observable::Tensor(factors) => write!(f, "{}", factors.iter().join(" @ ")),
            Observable::Hamiltonian { coeffs, terms } => write!(
                f,
                "{}",
                coeffs
                    .iter()
                    .zip(terms)
                    .map(|(c, t)| format!("{c}*{t}"))
                    .join(" + ")
            ),
            other => write!(f, "{}[{}]", other.name(), other.wires().iter().join(",")),
        }
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    struct LiteralOnly;

    impl ParamOps for LiteralOnly {
        fn neg(&mut self, param: &Atom) -> TraceResult<Atom> {
            match param {
                Atom::Literal(l) => Ok(Literal::Float(-l.as_f64()).into()),
                Atom::Var(_) => unreachable!("only literal parameters in these tests"),
            }
        }
    }

    fn is_unitary(m: &Matrix) -> bool {
        (0..m.dim()).all(|r| {
            (0..m.dim()).all(|c| {
                let dot: Complex64 = (0..m.dim()).map(|k| m.get(k, r).conj() * m.get(k, c)).sum();
                let expected = if r == c { 1.0 } else { 0.0 };
                (dot - Complex64::new(expected, 0.0)).norm() < 1e-12
            })
        })
    }

    #[test]
    fn known_matrices_are_unitary() {
        for kind in GateKind::iter() {
            let params = vec![0.3; kind.num_params()];
            if let Some(m) = kind.matrix(&params) {
                assert!(is_unitary(&m), "{kind} matrix is not unitary");
                if let Some(n) = kind.num_wires() {
                    assert_eq!(m.num_wires(), Some(n), "{kind} matrix has the wrong size");
                }
            }
        }
    }

    #[test]
    fn controlled_matrix() {
        let cx = GateKind::PauliX.matrix(&[]).unwrap().controlled(1);
        assert_eq!(cx, GateKind::CNOT.matrix(&[]).unwrap());
        assert_eq!(cx.get(0, 0), Complex64::new(1.0, 0.0));
        assert_eq!(cx.get(2, 3), Complex64::new(1.0, 0.0));
        assert_eq!(cx.get(3, 3), Complex64::new(0.0, 0.0));
    }

    #[rstest]
    #[case(GateKind::RX, vec![0], vec![], "takes 1 parameters")]
    #[case(GateKind::CNOT, vec![0], vec![], "acts on 2 wires")]
    #[case(GateKind::CNOT, vec![1, 1], vec![], "repeated wires")]
    fn invalid_gates(
        #[case] kind: GateKind,
        #[case] wires: Vec<usize>,
        #[case] params: Vec<f64>,
        #[case] msg: &str,
    ) {
        assert_matches!(
            GateOp::new(kind, wires, params),
            Err(TraceError::Usage { message }) => assert!(message.contains(msg), "{message}")
        );
    }

    #[test]
    fn rot_decomposition() {
        let rot = GateOp::new(GateKind::Rot, [2], [0.1, 0.2, 0.3]).unwrap();
        let ops = rot.decomposition(&mut LiteralOnly).unwrap().unwrap();
        let names = ops.iter().map(|op| op.name()).collect_vec();
        assert_eq!(names, ["RZ", "RY", "RZ"]);
        assert!(ops.iter().all(|op| op.wires() == [2]));
    }

    #[test]
    fn u2_negates_parameter() {
        let u2 = GateOp::new(GateKind::U2, [0], [0.5, 0.25]).unwrap();
        let ops = u2.decomposition(&mut LiteralOnly).unwrap().unwrap();
        assert_matches!(&ops[0], QuantumOp::Gate(rot) => {
            assert_eq!(rot.kind(), GateKind::Rot);
            assert_eq!(rot.concrete_params(), Some(vec![0.25, FRAC_PI_2, -0.25]));
        });
    }

    #[test]
    fn toffoli_decomposition_stays_on_its_wires() {
        let ccx = GateOp::new(GateKind::Toffoli, [0, 1, 2], Vec::<f64>::new()).unwrap();
        let ops = ccx.decomposition(&mut LiteralOnly).unwrap().unwrap();
        assert_eq!(ops.len(), 15);
        assert!(ops.iter().flat_map(|op| op.wires()).all(|w| w < 3));
    }

    #[test]
    fn native_gates_have_no_decomposition() {
        let h = GateOp::new(GateKind::Hadamard, [0], Vec::<f64>::new()).unwrap();
        assert_eq!(h.decomposition(&mut LiteralOnly).unwrap(), None);
    }

    #[test]
    fn observable_names() {
        let obs = Observable::Tensor(vec![
            Observable::named(ObservableKind::PauliZ, 0),
            Observable::named(ObservableKind::PauliX, 1),
        ]);
        assert_eq!(obs.name(), "Tensor");
        assert_eq!(obs.wires(), vec![0, 1]);
        assert_eq!(obs.to_string(), "PauliZ(0) @ PauliX(1)");
    }
}
