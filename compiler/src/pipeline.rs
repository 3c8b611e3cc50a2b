// pipeline.rs — Compile driver: stencil source to formatted output
//
// Runs parse → resolve → (element-width override) to obtain a Solution,
// then renders it through the format registry. Also computes provenance
// for reproducible builds.
//
// Preconditions: none.
// Postconditions: `run_frontend` returns a solution iff no error-level
//                 diagnostics were produced.
// Failure modes: syntax and resolution problems are diagnostics; formatting
//                failures are `StencilError`s.
// Side effects: writes to the provided output sinks; tracing events.

use chumsky::error::Rich;
use chumsky::span::SimpleSpan;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span};

use crate::diag::{codes, Diagnostic};
use crate::error::{Result, StencilError};
use crate::format::{CodegenOptions, FormatRegistry};
use crate::lexer::Token;
use crate::manifest::{fingerprint, sha256_hex};
use crate::output::{NullOutput, Output, StringOutput};
use crate::solution::Solution;

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Overrides `set element_bytes` from the source.
    pub element_bytes: Option<u32>,
    pub codegen: CodegenOptions,
}

// ── Front end ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FrontendResult {
    pub solution: Option<Solution>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FrontendResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Convert lex/parse errors to coded diagnostics.
pub fn parse_diagnostics(errors: &[Rich<'_, Token, SimpleSpan>]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|e| Diagnostic::error(*e.span(), e.to_string()).with_code(codes::E0001))
        .collect()
}

/// Parse and resolve `source`, with `debug_sink` as the solution's debug
/// output from the first declaration on.
pub fn run_frontend_with(
    source: &str,
    options: &CompileOptions,
    debug_sink: impl Output + 'static,
) -> FrontendResult {
    let _span = info_span!("frontend", bytes = source.len()).entered();

    let parsed = crate::parser::parse(source);
    if !parsed.errors.is_empty() {
        return FrontendResult {
            solution: None,
            diagnostics: parse_diagnostics(&parsed.errors),
        };
    }
    let Some(program) = parsed.program else {
        return FrontendResult {
            solution: None,
            diagnostics: vec![Diagnostic::error(
                (0..source.len()).into(),
                "parse failed with no output",
            )
            .with_code(codes::E0001)],
        };
    };
    debug!(statements = program.statements.len(), "parsed");

    let resolved = crate::resolve::resolve_with(&program, debug_sink);
    let mut diagnostics = resolved.diagnostics;
    let mut solution = resolved.solution;

    if let (Some(soln), Some(bytes)) = (solution.as_mut(), options.element_bytes) {
        if let Err(e) = soln.set_element_bytes(bytes) {
            diagnostics.push(
                Diagnostic::error(program.span, format!("--element-bytes: {e}"))
                    .with_code(codes::E0103),
            );
            solution = None;
        }
    }

    FrontendResult {
        solution,
        diagnostics,
    }
}

pub fn run_frontend(source: &str, options: &CompileOptions) -> FrontendResult {
    run_frontend_with(source, options, NullOutput)
}

// ── Back end ───────────────────────────────────────────────────────────────

/// Render `solution` as `format` into `sink`.
pub fn emit(
    solution: &Solution,
    format: &str,
    options: &CompileOptions,
    sink: &mut dyn Output,
) -> Result<()> {
    let registry = FormatRegistry::with_builtins(options.codegen.clone());
    solution.format_with(&registry, format, sink)
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} error(s) in stencil source", .0.len())]
    Source(Vec<Diagnostic>),

    #[error(transparent)]
    Stencil(#[from] StencilError),
}

/// Source text in, artifact text out.
pub fn compile(
    source: &str,
    format: &str,
    options: &CompileOptions,
) -> std::result::Result<String, CompileError> {
    let frontend = run_frontend(source, options);
    let Some(solution) = frontend.solution else {
        return Err(CompileError::Source(frontend.diagnostics));
    };
    let mut out = StringOutput::new();
    emit(&solution, format, options, &mut out)?;
    Ok(out.get_string())
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache keys.
///
/// `source_hash`: SHA-256 of the raw source text.
/// `fingerprint`: SHA-256 of the canonical solution manifest.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub source_hash: String,
    pub fingerprint: String,
    pub solution: String,
    pub element_bytes: u32,
    pub manifest_schema_version: u32,
    pub compiler_version: &'static str,
}

impl Provenance {
    /// JSON for `--emit build-info`.
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

pub fn compute_provenance(source: &str, solution: &Solution) -> Result<Provenance> {
    Ok(Provenance {
        source_hash: sha256_hex(source.as_bytes()),
        fingerprint: fingerprint(solution)?,
        solution: solution.name().to_string(),
        element_bytes: solution.element_bytes(),
        manifest_schema_version: 1,
        compiler_version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAT: &str = "solution heat;\n\
                        step t;\n\
                        domain x;\n\
                        grid u(t, x);\n\
                        u(t+1, x) = (u(t, x-1) + u(t, x+1)) * 0.5;\n";

    #[test]
    fn compile_to_pseudo() {
        let text = compile(HEAT, "pseudo", &CompileOptions::default()).unwrap();
        assert!(text.contains("Equation 0: u(t+1, x) EQUALS ((u(t, x-1) + u(t, x+1)) * 0.5)"));
    }

    #[test]
    fn syntax_errors_become_e0001() {
        let err = compile("solution heat", "cpp", &CompileOptions::default()).unwrap_err();
        let CompileError::Source(diags) = err else {
            panic!("expected source diagnostics")
        };
        assert_eq!(diags[0].code, Some(codes::E0001));
    }

    #[test]
    fn element_bytes_override() {
        let opts = CompileOptions {
            element_bytes: Some(8),
            ..Default::default()
        };
        let fe = run_frontend(HEAT, &opts);
        assert_eq!(fe.solution.unwrap().element_bytes(), 8);

        let bad = CompileOptions {
            element_bytes: Some(3),
            ..Default::default()
        };
        let fe = run_frontend(HEAT, &bad);
        assert!(fe.solution.is_none());
        assert_eq!(fe.diagnostics[0].code, Some(codes::E0103));
    }

    #[test]
    fn unknown_format_is_a_stencil_error() {
        let err = compile(HEAT, "sse", &CompileOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Stencil(StencilError::UnsupportedTarget { .. })
        ));
    }

    #[test]
    fn provenance_json() {
        let soln = run_frontend(HEAT, &CompileOptions::default())
            .solution
            .unwrap();
        let prov = compute_provenance(HEAT, &soln).unwrap();
        assert_eq!(prov.source_hash.len(), 64);
        let json: serde_json::Value = serde_json::from_str(&prov.to_json().unwrap()).unwrap();
        assert_eq!(json["solution"], "heat");
        assert_eq!(json["compiler_version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["fingerprint"], prov.fingerprint.as_str());
    }
}
