#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_request(dir: &TempDir, name: &str, request: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_vec_pretty(request).expect("encode")).expect("write request");
    path
}

fn knows_request() -> Value {
    json!({
        "catalog": {
            "vertices": [{"id": 1, "name": "PERSON"}],
            "edges": [{"id": 10, "name": "KNOWS", "relations": [[1, 1]]}]
        },
        "sentences": [{
            "steps": [
                {
                    "step": "source",
                    "alias": "a",
                    "types": [1],
                    "filters": [{
                        "kind": "compare",
                        "op": "gt",
                        "left": {"kind": "property", "var": "a", "key": "age"},
                        "right": {"kind": "literal", "value": 18}
                    }]
                },
                {
                    "step": "expand",
                    "alias": "e",
                    "direction": "out",
                    "types": [{"edge_label": 10, "src_label": 1, "dst_label": 1}]
                },
                {"step": "get_vertex", "alias": "b", "types": [1]}
            ]
        }]
    })
}

fn empty_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, "").expect("write config");
    path
}

#[test]
fn pattern_emits_json() {
    let dir = TempDir::new().expect("tempdir");
    let request = write_request(&dir, "knows.json", &knows_request());
    let output = cargo_bin_cmd!("pattern-bridge")
        .arg("--config")
        .arg(empty_config(&dir))
        .args(["--format", "json", "pattern"])
        .arg(&request)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["vertices"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["edges"][0]["direction"], "OUT");
    let aliases: Vec<&str> = json["side_table"]
        .as_array()
        .expect("side table")
        .iter()
        .filter_map(|entry| entry["value"]["alias"].as_str())
        .collect();
    for alias in ["a", "b", "e"] {
        assert!(aliases.contains(&alias), "missing {alias}");
    }
}

#[test]
fn plan_prints_explain_tree() {
    let dir = TempDir::new().expect("tempdir");
    let request = write_request(&dir, "knows.json", &knows_request());
    let output = cargo_bin_cmd!("pattern-bridge")
        .arg("--config")
        .arg(empty_config(&dir))
        .arg("plan")
        .arg(&request)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.starts_with("plan_hash: "));
    assert!(text.contains("GetVertex ["));
    assert!(text.contains("Expand ["));
    assert!(text.contains("a.age > 18"));
}

#[test]
fn plan_redacts_literals_on_request() {
    let dir = TempDir::new().expect("tempdir");
    let request = write_request(&dir, "knows.json", &knows_request());
    let output = cargo_bin_cmd!("pattern-bridge")
        .arg("--config")
        .arg(empty_config(&dir))
        .args(["--format", "json", "plan", "--redact"])
        .arg(&request)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    let rendered = json.to_string();
    assert!(rendered.contains("<redacted>"));
    assert!(!rendered.contains("a.age > 18"));
    assert!(json["plan_hash"].is_string());
}

#[test]
fn structural_errors_exit_with_code() {
    let dir = TempDir::new().expect("tempdir");
    let mut request = knows_request();
    request["sentences"][0]["steps"]
        .as_array_mut()
        .expect("steps")
        .pop();
    let path = write_request(&dir, "dangling.json", &request);
    let output = cargo_bin_cmd!("pattern-bridge")
        .arg("--config")
        .arg(empty_config(&dir))
        .arg("pattern")
        .arg(&path)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[MissingEndpoint]"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let request = write_request(&dir, "knows.json", &knows_request());
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[canonical\n").expect("write config");
    let output = cargo_bin_cmd!("pattern-bridge")
        .arg("--config")
        .arg(&config)
        .arg("pattern")
        .arg(&request)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[Config]"));
    assert!(stderr.contains("broken.toml"));
}
