//! Integration tests for the `hivescan` binary.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hivescan"))
}

fn write_description(tmp: &TempDir, body: &str) -> Result<PathBuf, std::io::Error> {
    let path = tmp.path().join("scan.json");
    std::fs::write(&path, body)?;
    Ok(path)
}

const PARTITIONED_SCAN: &str = r#"{
    "table": {
        "serialization_lib": "org.apache.hadoop.hive.ql.io.orc.OrcSerde",
        "input_format": "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat",
        "properties": {"columns": "id,name", "columns.types": "int:string"},
        "partition_columns": ["ds"],
        "partitions": {
            "0": {},
            "1": {
                "serialization_lib": "org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe",
                "input_format": "org.apache.hadoop.mapred.TextInputFormat"
            }
        }
    },
    "splits": [
        {"key": "orc-split", "partition_id": 0,
         "input_split": {"kind": "file", "path": "/t/ds=1/000000_0", "start": 0, "length": 64}},
        {"key": "text-split", "partition_id": 1,
         "input_split": {"kind": "file", "path": "/t/ds=2/000000_0", "start": 0, "length": 64}}
    ],
    "columns": ["id", "ds"]
}"#;

#[test]
fn explain_prints_strategy_per_split() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_description(&tmp, PARTITIONED_SCAN)?;

    cli()
        .args(["explain", "--plan", path.to_string_lossy().as_ref()])
        .assert()
        .success()
        .stdout(contains("orc-split\t0\torc-vectorized"))
        .stdout(contains("text-split\t1\ttext\torc-vectorized\tpartition-resolved"));
    Ok(())
}

#[test]
fn explain_json_output_is_machine_readable() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_description(&tmp, PARTITIONED_SCAN)?;

    let output = cli()
        .args(["explain", "--plan", path.to_string_lossy().as_ref(), "--json"])
        .output()?;
    assert!(output.status.success());

    let plans: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(plans[0]["strategy"], "columnar_vectorized");
    assert_eq!(plans[1]["strategy"], "delimited_text");
    assert_eq!(plans[1]["partition_resolved"], true);
    Ok(())
}

#[test]
fn explain_reports_missing_native_library() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_description(
        &tmp,
        r#"{
            "table": {
                "serialization_lib": "org.apache.hadoop.hive.ql.io.orc.OrcSerde",
                "input_format": "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat",
                "properties": {"columns": "id", "columns.types": "int"}
            },
            "splits": [
                {"key": "s1",
                 "input_split": {"kind": "file", "path": "/t/000000_0", "start": 0, "length": 8}}
            ],
            "options": {"store.hive.orc.vectorize": false},
            "capabilities": {"snappy": false},
            "conf": {"orc.use.zerocopy": "true"}
        }"#,
    )?;

    cli()
        .args(["explain", "--plan", path.to_string_lossy().as_ref()])
        .assert()
        .failure()
        .stderr(contains("Failed to resolve split s1"))
        .stderr(contains("Snappy native library is required"));
    Ok(())
}

#[test]
fn explain_rejects_malformed_description() -> TestResult {
    let tmp = TempDir::new()?;
    let path = write_description(&tmp, "{\"splits\": []}")?;

    cli()
        .args(["explain", "--plan", path.to_string_lossy().as_ref()])
        .assert()
        .failure()
        .stderr(contains("Invalid scan description"));
    Ok(())
}

#[test]
fn explain_missing_file_fails() -> TestResult {
    let tmp = TempDir::new()?;
    let path = tmp.path().join("absent.json");

    cli()
        .args(["explain", "--plan", path.to_string_lossy().as_ref()])
        .assert()
        .failure()
        .stderr(contains("Scan description not found"));
    Ok(())
}

#[test]
fn formats_lists_registry() -> TestResult {
    cli()
        .arg("formats")
        .assert()
        .success()
        .stdout(contains(
            "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat\torc",
        ))
        .stdout(contains("org.apache.hadoop.mapred.TextInputFormat\ttext"));
    Ok(())
}
