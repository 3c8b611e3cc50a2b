use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use stencilc::diag::{line_col, Diagnostic};
use stencilc::format::{CodegenOptions, FormatRegistry};
use stencilc::output::{FileOutput, NullOutput, Output, StdoutOutput, StringOutput};
use stencilc::pipeline::{compute_provenance, emit, run_frontend_with, CompileOptions};
use stencilc::StencilError;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Formatted solution (see --format)
    Code,
    /// Provenance JSON (source hash, solution fingerprint, version)
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "stencilc",
    version,
    about = "Stencil compiler: turns .stencil definitions into dataflow graphs and C++ kernels"
)]
struct Cli {
    /// Input .stencil source file
    #[arg(required_unless_present = "list_formats")]
    source: Option<PathBuf>,

    /// Output format id (see --list-formats)
    #[arg(short, long, default_value = "cpp")]
    format: String,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Element width in bytes: 4 (float) or 8 (double); overrides the source
    #[arg(long)]
    element_bytes: Option<u32>,

    /// Disable common-subexpression elimination in generated kernels
    #[arg(long)]
    no_cse: bool,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Code)]
    emit: EmitStage,

    /// Write solution progress messages to this file
    #[arg(long)]
    debug_output: Option<PathBuf>,

    /// List available output formats and exit
    #[arg(long)]
    list_formats: bool,

    /// Log compiler phases (same as RUST_LOG=debug)
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_diagnostic(path: &Path, source: &str, diag: &Diagnostic) {
    let (line, col) = line_col(source, diag.span.start);
    eprintln!("stencilc: {}:{}:{}: {}", path.display(), line, col, diag);
}

/// Exit code for a failure surfaced by the model or a formatter.
fn exit_code(err: &StencilError) -> i32 {
    match err {
        StencilError::Io { .. } | StencilError::UnsupportedTarget { .. } => 2,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = CompileOptions {
        element_bytes: cli.element_bytes,
        codegen: CodegenOptions { cse: !cli.no_cse },
    };

    if cli.list_formats {
        let registry = FormatRegistry::with_builtins(options.codegen.clone());
        for id in registry.ids() {
            if let Ok(f) = registry.lookup(id) {
                println!("{:<8} {}", id, f.description());
            }
        }
        return;
    }

    // ── Read source ──
    let Some(path) = cli.source.as_deref() else {
        eprintln!("stencilc: error: no source file given");
        process::exit(2);
    };
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("stencilc: error: {}: {}", path.display(), e);
            process::exit(2);
        }
    };

    // ── Debug sink ──
    let debug_sink: Box<dyn Output> = match &cli.debug_output {
        Some(p) => match FileOutput::create(p) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("stencilc: error: {}", e);
                process::exit(2);
            }
        },
        None => Box::new(NullOutput),
    };

    // ── Parse and resolve ──
    let frontend = run_frontend_with(&source, &options, debug_sink);
    for diag in &frontend.diagnostics {
        print_diagnostic(path, &source, diag);
    }
    let Some(solution) = frontend.solution else {
        process::exit(1);
    };

    // ── Emit ──
    // The artifact is rendered in full before `-o` is opened, so a failed
    // run leaves any existing output file untouched.
    let result = match cli.emit {
        EmitStage::BuildInfo => compute_provenance(&source, &solution).and_then(|p| p.to_json()),
        EmitStage::Code => {
            let mut buf = StringOutput::new();
            emit(&solution, &cli.format, &options, &mut buf).map(|()| buf.get_string())
        }
    }
    .and_then(|text| write_artifact(cli.output.as_deref(), &text));

    // Flushes the debug sink; `process::exit` runs no destructors.
    drop(solution);
    if let Err(e) = result {
        eprintln!("stencilc: error: {}", e);
        process::exit(exit_code(&e));
    }
}

fn write_artifact(output: Option<&Path>, text: &str) -> stencilc::Result<()> {
    let mut sink: Box<dyn Output> = match output {
        Some(p) => Box::new(FileOutput::create(p)?),
        None => Box::new(StdoutOutput),
    };
    sink.write_str(text)?;
    sink.flush()
}
