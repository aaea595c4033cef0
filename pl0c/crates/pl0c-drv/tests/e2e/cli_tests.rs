//! CLI interface E2E tests.
//!
//! These drive the `pl0` binary the way a user would: fixture programs
//! under `tests/e2e/fixtures/`, real stdin/stdout, real exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to the fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("e2e")
        .join("fixtures")
}

/// Get the path to the pl0 binary.
fn pl0_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pl0"))
}

fn pl0(fixture: &str) -> Command {
    let mut cmd = Command::new(pl0_bin());
    cmd.arg(fixtures_dir().join(fixture));
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::new(pl0_bin());
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage").or(predicate::str::contains("pl0")));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::new(pl0_bin());
    cmd.arg("-v");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pl0").or(predicate::str::contains("0.")));
}

#[test]
fn test_arithmetic_and_write() {
    pl0("arith.pl0")
        .assert()
        .success()
        .stdout("14\n");
}

#[test]
fn test_factorial_via_recursion() {
    pl0("fact.pl0")
        .write_stdin("5\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("120"));
}

#[test]
fn test_while_loop() {
    pl0("loop.pl0")
        .assert()
        .success()
        .stdout("55\n");
}

#[test]
fn test_constants_and_unary_minus() {
    pl0("consts.pl0")
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn test_undeclared_identifier_exits_one() {
    pl0("undeclared.pl0")
        .arg("--no-color")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "error: use of undeclared identifier 'b'",
        ));
}

#[test]
fn test_assignment_typo_has_fixit() {
    pl0("assign_typo.pl0")
        .arg("--no-color")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error: use ':=' for assignment"))
        .stderr(predicate::str::contains("try:  :="));
}

#[test]
fn test_diagnostic_shows_caret_under_source() {
    pl0("undeclared.pl0")
        .arg("--no-color")
        .assert()
        .failure()
        .stderr(predicate::str::contains("begin a := b + 1 end"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn test_empty_program() {
    pl0("empty.pl0")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_division_by_zero_at_runtime() {
    pl0("divzero.pl0")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Division by zero"));
}

#[test]
fn test_tokens_flag_prints_table() {
    pl0("arith.pl0")
        .args(["--tokens", "--no-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Program"))
        .stdout(predicate::str::contains("Ident"))
        .stdout(predicate::str::contains("Assign"));
}

#[test]
fn test_code_flag_prints_listing() {
    pl0("arith.pl0")
        .args(["--code", "--no-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("JMP"))
        .stdout(predicate::str::contains("INT"))
        .stdout(predicate::str::contains("WRT"));
}

#[test]
fn test_symbols_flag_prints_journal() {
    pl0("consts.pl0")
        .args(["--symbols", "--no-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("const"))
        .stdout(predicate::str::contains("-7"));
}

#[test]
fn test_ast_flag_prints_trace() {
    pl0("arith.pl0")
        .arg("--parse-only")
        .assert()
        .success()
        .stdout(predicate::str::contains("program"))
        .stdout(predicate::str::contains("expression"));
}

#[test]
fn test_source_flag_echoes_with_line_numbers() {
    pl0("arith.pl0")
        .args(["--source", "--no-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 | program p;"));
}

#[test]
fn test_all_flag_enables_every_dump() {
    pl0("arith.pl0")
        .args(["--all", "--no-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 | program p;"))
        .stdout(predicate::str::contains("Assign"))
        .stdout(predicate::str::contains("JMP"))
        .stdout(predicate::str::contains("var"));
}

#[test]
fn test_lexer_only_skips_semantic_errors() {
    // The fixture has an undeclared identifier; lexing alone is clean.
    pl0("undeclared.pl0")
        .arg("--lexer-only")
        .assert()
        .success();
}

#[test]
fn test_no_run_skips_execution() {
    pl0("arith.pl0")
        .arg("--no-run")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_debug_trace_does_not_disturb_stdout() {
    pl0("arith.pl0")
        .arg("-d")
        .assert()
        .success()
        .stdout("14\n");
}

#[test]
fn test_verbose_phase_banners() {
    pl0("arith.pl0")
        .args(["-V", "--no-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("phase").or(predicate::str::contains("compiling")));
}

#[test]
fn test_missing_file_exits_one() {
    let mut cmd = Command::new(pl0_bin());
    cmd.arg("no-such-program");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn test_extension_is_inferred() {
    let mut cmd = Command::new(pl0_bin());
    cmd.arg(fixtures_dir().join("arith"));
    cmd.assert().success().stdout("14\n");
}

#[test]
fn test_source_larger_than_one_buffer() {
    // A program well past the 4096-byte half size must compile and run
    // exactly like a small one.
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("big.pl0");

    let mut source = String::from("program big;\nvar x;\nbegin\n    x := 0;\n");
    for _ in 0..500 {
        source.push_str("    x := x + 1;\n");
    }
    source.push_str("    write(x)\nend\n");
    assert!(source.len() > 4096);
    std::fs::write(&path, source).expect("write fixture");

    let mut cmd = Command::new(pl0_bin());
    cmd.arg(&path);
    cmd.assert().success().stdout("500\n");
}

#[test]
fn test_color_escapes_respect_no_color() {
    pl0("undeclared.pl0")
        .arg("--no-color")
        .assert()
        .failure()
        .stderr(predicate::str::contains("\u{1b}[").not());
}

#[test]
fn test_colored_diagnostics_by_default() {
    pl0("undeclared.pl0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("\u{1b}[1;31m"));
}
