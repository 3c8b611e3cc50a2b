// CLI-level tests: repeated runs, provenance, exit codes, and output files.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn stencilc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_stencilc"))
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample(name: &str) -> PathBuf {
    project_root().join("stencils").join(name)
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stencilc_cli_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join(name)
}

fn run(args: &[&str]) -> Output {
    stencilc().args(args).output().expect("run stencilc")
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn repeated_runs_are_byte_identical() {
    let wave = sample("wave.stencil");
    let wave = wave.to_str().unwrap();
    for format in ["dot", "pseudo", "json", "cpp", "avx512"] {
        let first = run(&[wave, "-f", format]);
        let second = run(&[wave, "-f", format]);
        assert!(first.status.success(), "{format}: {}", stderr_of(&first));
        assert_eq!(first.stdout, second.stdout, "{format}");
        assert!(!first.stdout.is_empty(), "{format}");
    }
}

#[test]
fn fingerprint_ignores_formatting_but_source_hash_does_not() {
    let original = std::fs::read_to_string(sample("heat.stencil")).unwrap();
    let variant = format!("# reformatted copy\n\n{}\n\n", original.replace("    ", "  "));
    let variant_path = scratch("heat_variant.stencil");
    std::fs::write(&variant_path, variant).unwrap();

    let info = |path: &Path| -> serde_json::Value {
        let out = run(&[path.to_str().unwrap(), "--emit", "build-info"]);
        assert!(out.status.success(), "{}", stderr_of(&out));
        serde_json::from_slice(&out.stdout).expect("build-info is JSON")
    };
    let a = info(&sample("heat.stencil"));
    let b = info(&variant_path);

    assert_eq!(a["fingerprint"], b["fingerprint"]);
    assert_ne!(a["source_hash"], b["source_hash"]);
    assert_eq!(a["solution"], "heat");
    assert_eq!(a["element_bytes"], 8);
    assert_eq!(a["manifest_schema_version"], 1);
}

#[test]
fn list_formats_names_every_builtin() {
    let out = run(&["--list-formats"]);
    assert!(out.status.success());
    let text = stdout_of(&out);
    let ids: Vec<&str> = text
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    assert_eq!(
        ids,
        ["avx", "avx2", "avx512", "cpp", "dot", "json", "knl", "pseudo"]
    );
}

#[test]
fn unknown_format_exits_with_usage_code() {
    let out = run(&[sample("heat.stencil").to_str().unwrap(), "-f", "sse"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr_of(&out).contains("unsupported format 'sse'"));
    assert!(out.stdout.is_empty());
}

#[test]
fn causality_error_exits_with_source_code() {
    let path = scratch("acausal.stencil");
    std::fs::write(
        &path,
        "solution bad;\nstep t;\ndomain x;\ngrid u(t, x);\nu(t, x) = u(t, x+1);\n",
    )
    .unwrap();
    let out = run(&[path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr_of(&out);
    assert!(err.contains("error[E0140]"), "{err}");
    assert!(err.contains("acausal.stencil:5:1:"), "{err}");
}

#[test]
fn missing_source_exits_with_usage_code() {
    let out = run(&[scratch("does_not_exist.stencil").to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr_of(&out).starts_with("stencilc: error:"));
}

#[test]
fn output_and_debug_files_are_written() {
    let header = scratch("api_test.h");
    let log = scratch("api_test.log");
    let out = run(&[
        sample("api_test.stencil").to_str().unwrap(),
        "-f",
        "knl",
        "-o",
        header.to_str().unwrap(),
        "--debug-output",
        log.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", stderr_of(&out));
    assert!(out.stdout.is_empty());

    let code = std::fs::read_to_string(&header).unwrap();
    assert!(code.contains("#pragma once"));
    assert!(code.contains("namespace stencil_api_test {"));
    assert!(code.contains("_mm512_div_ps"));

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Grid g1(t, x, y, z) declared."));
    assert!(text.contains("Equation 0: g1(t+1, x, y, z) EQUALS"));
    assert!(text.contains("Formatting solution 'api_test' as 'knl'"));
}

#[test]
fn element_bytes_flag_changes_the_header() {
    let api = sample("api_test.stencil");
    let api = api.to_str().unwrap();
    let float = stdout_of(&run(&[api]));
    let double = stdout_of(&run(&[api, "--element-bytes", "8"]));
    assert!(float.contains("typedef float real_t;"));
    assert!(double.contains("typedef double real_t;"));

    let bad = run(&[api, "--element-bytes", "2"]);
    assert_eq!(bad.status.code(), Some(1));
    assert!(stderr_of(&bad).contains("E0103"));
}

#[test]
fn unknown_format_leaves_existing_output_untouched() {
    let header = scratch("keep.h");
    std::fs::write(&header, "// previous build\n").unwrap();
    let out = run(&[
        sample("heat.stencil").to_str().unwrap(),
        "-f",
        "sse",
        "-o",
        header.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(std::fs::read_to_string(&header).unwrap(), "// previous build\n");

    let fresh = scratch("never_created.h");
    let out = run(&[
        sample("heat.stencil").to_str().unwrap(),
        "-f",
        "sse",
        "-o",
        fresh.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(!fresh.exists());
}

#[test]
fn emit_failure_still_flushes_debug_log() {
    let path = scratch("div0.stencil");
    std::fs::write(
        &path,
        "solution div0;\nstep t;\ndomain x;\ngrid u(t, x);\nu(t+1, x) = u(t, x) / 0;\n",
    )
    .unwrap();
    let header = scratch("div0.h");
    let log = scratch("div0.log");
    let out = run(&[
        path.to_str().unwrap(),
        "-f",
        "cpp",
        "-o",
        header.to_str().unwrap(),
        "--debug-output",
        log.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("division by zero"), "{}", stderr_of(&out));
    assert!(!header.exists());

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Grid u(t, x) declared."), "{text}");
    assert!(text.contains("Equation 0: u(t+1, x) EQUALS"), "{text}");
}
