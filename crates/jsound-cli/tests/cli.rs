use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

fn cli() -> Command {
    Command::cargo_bin("jsound").unwrap()
}

fn write_schema(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn compatible_schemas_exit_zero() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "integer"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "number"}"#);

    let output = cli().arg(&producer).arg(&consumer).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("compatible"));
    assert!(!stdout.contains("incompatible"));
}

#[test]
fn incompatible_schemas_exit_one_and_print_a_counterexample() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "number"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "integer"}"#);

    let output = cli().arg(&producer).arg(&consumer).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("incompatible"));
    assert!(stdout.contains("counterexample"));
}

#[test]
fn json_output_format_emits_a_parsable_document() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "integer"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "string"}"#);

    let output = cli()
        .arg(&producer)
        .arg(&consumer)
        .arg("--output-format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["compatible"], serde_json::json!(false));
    assert!(doc["counterexample"].is_object() || doc["counterexample"].is_null());
}

#[test]
fn minimal_output_format_prints_a_single_word() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "string"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "string"}"#);

    let output = cli()
        .arg(&producer)
        .arg(&consumer)
        .arg("--output-format")
        .arg("minimal")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "compatible");
}

#[test]
fn counterexample_file_receives_the_witness() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "number"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "integer"}"#);
    let counterexample_path = dir.path().join("witness.json");

    let output = cli()
        .arg(&producer)
        .arg(&consumer)
        .arg("--counterexample-file")
        .arg(&counterexample_path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&counterexample_path).unwrap()).unwrap();
    assert!(written.is_number());
}

#[test]
fn simulation_strategy_is_rejected_up_front() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", r#"{"type": "string"}"#);
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "string"}"#);

    let output = cli()
        .arg(&producer)
        .arg(&consumer)
        .arg("--ref-resolution-strategy")
        .arg("simulation")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not yet implemented"));
}

#[test]
fn malformed_schema_file_reports_an_error_exit_code() {
    let dir = tempdir().unwrap();
    let producer = write_schema(&dir, "producer.json", "not json");
    let consumer = write_schema(&dir, "consumer.json", r#"{"type": "string"}"#);

    let output = cli().arg(&producer).arg(&consumer).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}

#[test]
fn cyclic_schema_is_reported_as_an_error_not_a_panic() {
    let dir = tempdir().unwrap();
    let producer = write_schema(
        &dir,
        "producer.json",
        r#"{"$defs": {"Node": {"properties": {"next": {"$ref": "#/$defs/Node"}}}}, "$ref": "#/$defs/Node"}"#,
    );
    let consumer = write_schema(&dir, "consumer.json", "true");

    let output = cli().arg(&producer).arg(&consumer).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
