// CLI behavior: output on stdout, miette reports on stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn cli() -> Command {
    Command::cargo_bin("uast-transformer").unwrap()
}

#[test]
fn parse_prints_the_normalized_tree() {
    let out = cli()
        .args(["parse", &fixture("binop.json"), "--config", &fixture("python.yaml")])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let tree: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let expected: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("binop.uast.json")).unwrap()).unwrap();
    assert_eq!(tree, expected);
}

#[test]
fn parse_reads_stdin() {
    cli()
        .args(["parse", "--config", &fixture("strict.json")])
        .write_stdin(r#"{"kind": "Ident", "name": "y"}"#)
        .assert()
        .success()
        .stdout(contains(r#""@token": "y""#));
}

#[test]
fn diff_marks_added_lines() {
    cli()
        .args(["parse", &fixture("binop.json"), "--config", &fixture("python.yaml"), "--diff"])
        .assert()
        .success()
        .stdout(contains(r#"+  "@type": "File","#).and(contains(r#"-  "ast_type": "Module","#)));
}

#[test]
fn rule_errors_are_rendered_as_diagnostics() {
    cli()
        .args(["parse", "--config", &fixture("strict.json")])
        .write_stdin(r#"{"kind": "Ident", "name": "y", "extra": 1}"#)
        .assert()
        .failure()
        .stderr(contains("uast::unused_field").and(contains("help:")));
}

#[test]
fn invalid_json_fails() {
    cli()
        .arg("parse")
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(contains("uast::serialization"));
}

#[test]
fn response_mode_reports_status() {
    cli()
        .args(["parse", "--response", "--config", &fixture("strict.json")])
        .write_stdin(r#"{"kind": "Ident", "name": "y"}"#)
        .assert()
        .success()
        .stdout(contains(r#""status": "ok""#));
}

#[test]
fn version_prints_package_metadata() {
    cli()
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")).and(contains("uast-transformer")));
}
