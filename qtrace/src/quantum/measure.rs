//! Mid-circuit measurement and expectation values.

use uuid::Uuid;

use super::gates::{Observable, QuantumOp};
use super::tape::TapeEntry;
use crate::error::TraceResult;
use crate::trace::{TraceContext, Value, LOG_TARGET};
use crate::types::{DType, ShapedType};

/// Length of measurement identifiers.
const MEASURE_ID_LEN: usize = 8;

/// A fresh measurement identifier.
fn measure_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(MEASURE_ID_LEN);
    id
}

impl TraceContext {
    /// Queue a gate-library operation on the active quantum tape.
    pub fn apply(&mut self, op: impl Into<QuantumOp>) -> TraceResult<()> {
        let op = op.into();
        let name = op.name();
        let params = match &op {
            QuantumOp::Gate(gate) | QuantumOp::Controlled { base: gate, .. } => {
                gate.params().to_vec()
            }
            _ => vec![],
        };
        self.tape(&name)?;
        for param in &params {
            self.use_atom(param)?;
        }
        tracing::trace!(target: LOG_TARGET, op = %name, wires = ?op.wires(), "apply");
        self.tape(&name)?.push(TapeEntry::Quantum(op));
        Ok(())
    }

    /// Measure a single wire in the computational basis.
    ///
    /// Returns a boolean tracer for the outcome. Only available inside a
    /// quantum function.
    pub fn measure(&mut self, wire: usize) -> TraceResult<Value> {
        self.tape("measure")?;
        let result = self.fresh_tracer(ShapedType::bool_scalar())?;
        let id = measure_id();
        tracing::debug!(target: LOG_TARGET, wire, id = %id, "mid-circuit measurement");
        self.tape("measure")?.push(TapeEntry::MidMeasure {
            id,
            wire,
            result: result.typed_var(),
        });
        Ok(result.into())
    }

    /// Expectation value of an observable on the current quantum state.
    pub fn expval(&mut self, observable: Observable) -> TraceResult<Value> {
        self.tape("expval")?;
        let result = self.fresh_tracer(ShapedType::scalar(DType::F64))?;
        self.tape("expval")?.push(TapeEntry::Expval {
            observable,
            result: result.typed_var(),
        });
        Ok(result.into())
    }
}
