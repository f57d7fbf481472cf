//! End-to-end integration tests: CSV -> split -> train -> evaluate -> save/load -> predict.

use std::path::{Path, PathBuf};

use sommelier_io::{DatasetReader, IoError};
use sommelier_rf::{ErrorKind, Example, RandomForest, RandomForestConfig, train_test_split};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn reference_wine() -> Example {
    Example::new()
        .with_feature("fixed acidity", 7.4)
        .with_feature("volatile acidity", 0.7)
        .with_feature("citric acid", 0.47)
        .with_feature("residual sugar", 1.9)
        .with_feature("chlorides", 0.076)
        .with_feature("free sulfur dioxide", 11.0)
        .with_feature("total sulfur dioxide", 34.0)
        .with_feature("density", 0.9978)
        .with_feature("pH", 3.51)
        .with_feature("sulphates", 0.56)
        .with_feature("alcohol", 9.4)
}

#[test]
fn train_evaluate_round_trip() {
    // 1. Read CSV
    let dataset = DatasetReader::new(fixture_path("winequality_sample.csv"))
        .read()
        .expect("fixture should parse");
    assert_eq!(dataset.n_examples(), 150);
    assert_eq!(dataset.n_features(), 11);
    assert_eq!(dataset.target_names(), &["quality"]);

    // 2. Split and train
    let (train, test) = train_test_split(&dataset, 0.7, 1).unwrap();
    assert_eq!(train.n_examples(), 105);
    assert_eq!(test.n_examples(), 45);

    let forest = RandomForestConfig::new(10)
        .unwrap()
        .with_seed(1)
        .fit(&train)
        .unwrap()
        .into_forest();

    // 3. Evaluate on the held-out split
    let metrics = forest.evaluate(&test).unwrap();
    let quality = metrics.get("quality").unwrap();
    assert!(quality.mae >= 0.0);
    assert!(quality.rmse >= quality.mae);
    assert!(quality.r2 <= 1.0);

    // 4. Save, load, and compare predictions
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("wine.model");
    forest.save(&model_path).unwrap();
    let loaded = RandomForest::load(&model_path).unwrap();

    let original = forest.predict(&reference_wine()).unwrap();
    let restored = loaded.predict(&reference_wine()).unwrap();
    assert_eq!(original, restored);

    let value = restored.value("quality").unwrap();
    assert!(value.is_finite() && (0.0..=10.0).contains(&value), "quality = {value}");
}

#[test]
fn reader_fixture_files_match_expected_errors() {
    // empty.csv -> EmptyDataset
    let result = DatasetReader::new(fixture_path("empty.csv")).read();
    assert!(
        matches!(result, Err(IoError::EmptyDataset { .. })),
        "empty.csv should give EmptyDataset, got: {result:?}"
    );

    // jagged.csv -> InconsistentRowLength
    let result = DatasetReader::new(fixture_path("jagged.csv")).read();
    assert!(
        matches!(result, Err(IoError::InconsistentRowLength { .. })),
        "jagged.csv should give InconsistentRowLength, got: {result:?}"
    );

    // nan.csv -> NonFiniteValue
    let result = DatasetReader::new(fixture_path("nan.csv")).read();
    assert!(
        matches!(result, Err(IoError::NonFiniteValue { .. })),
        "nan.csv should give NonFiniteValue, got: {result:?}"
    );

    // no_quality.csv -> MissingTargetColumn
    let result = DatasetReader::new(fixture_path("no_quality.csv")).read();
    assert!(
        matches!(result, Err(IoError::MissingTargetColumn { .. })),
        "no_quality.csv should give MissingTargetColumn, got: {result:?}"
    );

    // ... which can be read with the right target name
    let dataset = DatasetReader::new(fixture_path("no_quality.csv"))
        .with_targets(["score"])
        .read()
        .unwrap();
    assert_eq!(dataset.feature_names(), &["alcohol", "pH"]);
}

#[test]
fn every_reader_error_is_io_kind() {
    for name in ["empty.csv", "jagged.csv", "nan.csv", "no_quality.csv", "absent.csv"] {
        let err = DatasetReader::new(fixture_path(name)).read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io, "{name}");
    }
}
