mod demos;
mod tracing;

use crate::demos::Demo;
use crate::tracing::Tracer;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use qtrace::ir::OpKind;
use qtrace::serialize::{save_program_file, save_program_str};
use qtrace::validate::register_counts;
use qtrace::Program;

/// Output format of the traced program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human readable listing.
    Text,
    /// Serialised program.
    Json,
}

/// Trace built-in hybrid quantum/classical programs and print their IR.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Trace built-in hybrid quantum/classical programs and print their IR.")]
struct CmdLineArgs {
    /// Program to trace.
    #[arg(value_enum, help = "The built-in program to trace.")]
    demo: Demo,
    /// Output format.
    #[arg(
        short,
        long,
        value_enum,
        default_value = "text",
        help = "Output format of the traced program."
    )]
    format: Format,
    /// Output file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Output file. Prints to stdout if not given."
    )]
    output: Option<PathBuf>,
    /// Log output file
    #[arg(
        short,
        long,
        value_name = "LOGFILE",
        help = "Logfile with every tracing and decomposition event."
    )]
    logfile: Option<PathBuf>,
    /// Show debug events on stderr.
    #[arg(short, long, help = "Show debug events on stderr.")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let opts = CmdLineArgs::parse();

    // We need to keep the object around to keep the logging active.
    let _tracer = Tracer::setup_tracing(opts.logfile, opts.verbose)?;

    let program = opts.demo.trace()?;
    report_registers(&program)?;

    match (opts.format, opts.output) {
        (Format::Text, None) => println!("{program}"),
        (Format::Text, Some(path)) => std::fs::write(path, program.to_string())?,
        (Format::Json, None) => println!("{}", save_program_str(&program)?),
        (Format::Json, Some(path)) => save_program_file(&program, path)?,
    }
    Ok(())
}

/// Log the register counts of every quantum function called by `program`.
fn report_registers(program: &Program) -> anyhow::Result<()> {
    for op in program.ops() {
        for sub in op.subprograms() {
            if matches!(sub.ops().first(), Some(first) if matches!(first.kind, OpKind::Alloc { .. }))
            {
                let counts = register_counts(sub)?;
                ::tracing::info!(
                    target: "qtrace::cli",
                    name = sub.name(),
                    produced = counts.produced,
                    consumed = counts.consumed,
                    "quantum function"
                );
            }
            report_registers(sub)?;
        }
    }
    Ok(())
}
