//! Binary-level tests: train a model from the wine fixture, then predict with it.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

fn sommelier() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sommelier"))
}

fn wine_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("crates/sommelier-io/tests/fixtures/winequality_sample.csv")
}

#[test]
fn train_then_predict_reference_wine() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("wine.model");

    let out = sommelier()
        .args(["--quiet", "train", "--n-trees", "5", "--seed", "1", "--oob"])
        .arg("--data")
        .arg(wine_fixture())
        .arg("--model")
        .arg(&model)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["n_train"], 105);
    assert_eq!(summary["n_test"], 45);
    assert_eq!(summary["n_trees"], 5);
    assert_eq!(summary["test_metrics"][0]["dimension"], "quality");
    assert!(summary["oob_metrics"].is_array());
    assert!(model.exists());

    let out = sommelier()
        .args(["--quiet", "predict", "--model"])
        .arg(&model)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let prediction: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let value = prediction["predictions"][0]["value"].as_f64().unwrap();
    assert!((0.0..=10.0).contains(&value), "quality = {value}");
}

#[test]
fn missing_feature_reports_kind_and_fails() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("wine.model");

    let status = sommelier()
        .args(["--quiet", "train", "--n-trees", "3"])
        .arg("--data")
        .arg(wine_fixture())
        .arg("--model")
        .arg(&model)
        .output()
        .unwrap()
        .status;
    assert!(status.success());

    let out = sommelier()
        .args(["--quiet", "predict", "--feature", "alcohol=9.4", "--model"])
        .arg(&model)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("MissingFeatureError"), "{stderr}");
}

#[test]
fn unreadable_data_is_io_error() {
    let out = sommelier()
        .args(["--quiet", "train", "--data", "/nonexistent/wine.csv"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("IOError"), "{stderr}");
}

#[test]
fn multi_byte_delimiter_is_a_usage_error() {
    let out = sommelier()
        .args(["train", "--delimiter", "::"])
        .arg("--data")
        .arg(wine_fixture())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--delimiter"));
}
