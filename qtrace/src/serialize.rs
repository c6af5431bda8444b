//! JSON (de)serialisation of traced programs.
//!
//! Programs are wrapped in a small envelope recording the format version.
//! Loaded programs are checked for register linearity before being returned.

use std::path::Path;
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::ir::Program;
use crate::validate::verify_registers;

/// Version of the serialised format written by this crate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SerialProgram<P> {
    version: u32,
    program: P,
}

/// Load a program from a JSON file.
pub fn load_program_file(path: impl AsRef<Path>) -> TraceResult<Program> {
    let file = fs::File::open(path)?;
    load_program_reader(io::BufReader::new(file))
}

/// Load a program from a JSON reader.
pub fn load_program_reader(json: impl io::Read) -> TraceResult<Program> {
    let ser: SerialProgram<Program> = serde_json::from_reader(json)?;
    if ser.version != FORMAT_VERSION {
        return Err(TraceError::configuration(format!(
            "Unsupported program format version {}, expected {FORMAT_VERSION}.",
            ser.version
        )));
    }
    verify_registers(&ser.program)?;
    Ok(ser.program)
}

/// Load a program from a JSON string.
pub fn load_program_str(json: &str) -> TraceResult<Program> {
    load_program_reader(json.as_bytes())
}

/// Save a program to a JSON file.
pub fn save_program_file(program: &Program, path: impl AsRef<Path>) -> TraceResult<()> {
    let file = fs::File::create(path)?;
    save_program_writer(program, io::BufWriter::new(file))
}

/// Save a program as JSON to a writer.
pub fn save_program_writer(program: &Program, w: impl io::Write) -> TraceResult<()> {
    let ser = SerialProgram {
        version: FORMAT_VERSION,
        program,
    };
    serde_json::to_writer(w, &ser)?;
    Ok(())
}

/// Save a program as a JSON string.
pub fn save_program_str(program: &Program) -> TraceResult<String> {
    let ser = SerialProgram {
        version: FORMAT_VERSION,
        program,
    };
    Ok(serde_json::to_string(&ser)?)
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::trace::{trace_program, TracedFn};
    use crate::types::{DType, ShapedType};

    fn sample() -> Program {
        let f = TracedFn::new("f", 1, |ctx, args| {
            let y = ctx.mul(&args[0], 2.0)?;
            Ok(ctx.lt(y, 1.0)?.into())
        });
        trace_program("f", &[ShapedType::scalar(DType::F64)], &f).unwrap()
    }

    #[test]
    fn string_roundtrip() {
        let prog = sample();
        let json = save_program_str(&prog).unwrap();
        assert_eq!(load_program_str(&json).unwrap(), prog);
    }

    #[test]
    fn infinite_literals_roundtrip() {
        let f = TracedFn::new("f", 1, |ctx, args| {
            let y = ctx.mul(&args[0], f64::INFINITY)?;
            Ok(ctx.add(y, f64::NEG_INFINITY)?.into())
        });
        let prog = trace_program("f", &[ShapedType::scalar(DType::F64)], &f).unwrap();
        let json = save_program_str(&prog).unwrap();
        assert!(!json.contains("null"));
        assert_eq!(load_program_str(&json).unwrap(), prog);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut value = serde_json::to_value(SerialProgram {
            version: FORMAT_VERSION,
            program: sample(),
        })
        .unwrap();
        value["version"] = json!(FORMAT_VERSION + 1);
        assert_matches!(
            load_program_str(&value.to_string()),
            Err(TraceError::Configuration { .. })
        );
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert_matches!(
            load_program_str("{\"version\": 1}"),
            Err(TraceError::Serialization(_))
        );
    }
}
