//! Integration tests for ChurnForge

use std::collections::HashMap;
use std::io::Write;

use churnforge::{
    load_artifacts, train, ArtifactPaths, ChurnError, MissingFeaturePolicy, TrainConfig,
};
use linfa::traits::Predict;
use ndarray::{Array1, Axis};
use tempfile::NamedTempFile;

const HEADER: &str = "customerID,gender,SeniorCitizen,tenure,Contract,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

/// Synthetic Telco-style export: churn follows short month-to-month
/// contracts, plus a handful of dirty rows at the end
struct Fixture {
    file: NamedTempFile,
    rows: usize,
    recognized_targets: usize,
}

fn create_test_csv() -> Fixture {
    let mut lines = Vec::new();

    for i in 0..120usize {
        let gender = if i % 2 == 0 { "Female" } else { "Male" };
        let senior = usize::from(i % 7 == 0);
        let tenure = (i * 13) % 72 + 1;
        let contract = ["Month-to-month", "One year", "Two year"][i % 3];
        let payment = ["Electronic check", "Mailed check", "Credit card (automatic)"][(i / 3) % 3];
        let monthly = 20.35 + ((i * 37) % 90) as f64;
        let total = monthly * tenure as f64;
        let churn = if contract == "Month-to-month" && tenure < 36 { "Yes" } else { "No" };
        lines.push(format!(
            "{i:04}-CUST,{gender},{senior},{tenure},{contract},{payment},{monthly:.2},{total:.2},{churn}"
        ));
    }

    // whitespace-padded label is kept and mapped to churn
    lines.push("9001-PADD,Male,0,3,Month-to-month,Electronic check,80.10,240.30,\"  Yes \"".to_string());
    // blank TotalCharges is coerced to missing and dropped
    lines.push("9002-BLNK,Female,0,0,Two year,Mailed check,52.55,\" \",No".to_string());
    // unrecognized labels are dropped
    lines.push("9003-NONE,Male,1,12,One year,Mailed check,45.00,540.00,".to_string());
    lines.push("9004-UNKN,Female,0,30,Two year,Electronic check,61.20,1836.00,Unknown".to_string());

    let recognized_targets = lines
        .iter()
        .filter(|line| {
            let label = line.rsplit(',').next().unwrap().trim_matches('"').trim();
            label == "Yes" || label == "No"
        })
        .count();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for line in &lines {
        writeln!(file, "{line}").unwrap();
    }

    Fixture {
        file,
        rows: lines.len(),
        recognized_targets,
    }
}

fn config(fixture: &Fixture) -> TrainConfig {
    TrainConfig {
        n_trees: 30,
        ..TrainConfig::new(fixture.file.path())
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let fixture = create_test_csv();
    let outcome = train(&config(&fixture)).unwrap();

    // Verify cleaning
    assert_eq!(outcome.cleaning.rows_loaded, fixture.rows);
    assert_eq!(outcome.cleaning.rows_retained, fixture.rows - 3);

    // Verify the feature list matches the design matrix
    assert_eq!(outcome.bundle.feature_names.len(), outcome.encoded.records.ncols());
    assert_eq!(outcome.bundle.feature_names, outcome.encoded.feature_names);
    assert_eq!(
        &outcome.bundle.feature_names[..4],
        &["SeniorCitizen", "tenure", "MonthlyCharges", "TotalCharges"]
    );
    assert!(outcome.bundle.feature_names.contains(&"Contract_Two year".to_string()));
    assert!(!outcome.bundle.feature_names.contains(&"Contract_Month-to-month".to_string()));
    assert!(!outcome.bundle.feature_names.iter().any(|name| name.starts_with("customerID")));

    // Verify the split and evaluation
    let split = &outcome.split;
    assert_eq!(split.train.len() + split.test.len(), outcome.cleaning.rows_retained);
    assert_eq!(outcome.report.macro_avg.support, split.test.len());
    assert!(outcome.report.accuracy >= 0.8, "accuracy {}", outcome.report.accuracy);

    // Persist and reload
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    outcome.bundle.save(&paths).unwrap();
    let bundle = load_artifacts(&paths).unwrap();
    assert_eq!(bundle, outcome.bundle);
}

#[test]
fn test_unrecognized_targets_are_excluded() {
    let fixture = create_test_csv();
    let outcome = train(&config(&fixture)).unwrap();

    assert_eq!(
        outcome.cleaning.rows_unrecognized_target,
        fixture.rows - fixture.recognized_targets
    );
    assert_eq!(outcome.cleaning.rows_unrecognized_target, 2);
    assert_eq!(outcome.cleaning.rows_with_missing_values, 1);
}

#[test]
fn test_padded_label_maps_to_churn() {
    let fixture = create_test_csv();
    let outcome = train(&config(&fixture)).unwrap();

    // the padded row is the first one after the 120 generated customers
    let padded = 120;
    assert_eq!(outcome.encoded.targets[padded], 1);
    assert_eq!(outcome.encoded.row_values(padded)["tenure"], 3.0);
}

#[test]
fn test_prediction_matches_training_encoding() {
    let fixture = create_test_csv();
    let outcome = train(&config(&fixture)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    outcome.bundle.save(&paths).unwrap();
    let bundle = load_artifacts(&paths).unwrap();

    for &row in outcome.split.test.iter().chain(outcome.split.train.iter().take(10)) {
        let prediction = bundle
            .predict(&outcome.encoded.row_values(row), MissingFeaturePolicy::Reject)
            .unwrap();

        let record = outcome.encoded.records.select(Axis(0), &[row]);
        let scaled = outcome.bundle.scaler.transform(&record).unwrap();
        let probability = outcome.bundle.model.predict_positive_proba(&scaled).unwrap()[0];
        let labels: Array1<usize> = outcome.bundle.model.predict(&scaled);

        assert_eq!(prediction.label, labels[0]);
        assert!((prediction.probability - probability).abs() < 1e-12);
    }
}

#[test]
fn test_prediction_is_idempotent() {
    let fixture = create_test_csv();
    let bundle = train(&config(&fixture)).unwrap().bundle;

    let input: HashMap<String, f64> = [("tenure", 5.0), ("MonthlyCharges", 90.0), ("TotalCharges", 450.0)]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    let first = bundle.predict(&input, MissingFeaturePolicy::Zero).unwrap();
    let second = bundle.predict(&input, MissingFeaturePolicy::Zero).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_input_returns_valid_prediction() {
    let fixture = create_test_csv();
    let bundle = train(&config(&fixture)).unwrap().bundle;

    let prediction = bundle.predict(&HashMap::new(), MissingFeaturePolicy::Zero).unwrap();
    assert!(prediction.label <= 1);
    assert!((0.0..=1.0).contains(&prediction.probability));

    let strict = bundle.predict(&HashMap::new(), MissingFeaturePolicy::Reject);
    assert!(matches!(strict, Err(ChurnError::MissingFeature(name)) if name == "SeniorCitizen"));
}

#[test]
fn test_same_seed_same_bundle() {
    let fixture = create_test_csv();
    let first = train(&config(&fixture)).unwrap();
    let second = train(&config(&fixture)).unwrap();

    assert_eq!(first.bundle, second.bundle);
    assert_eq!(first.split, second.split);
}

#[test]
fn test_retraining_overwrites_bundle() {
    let fixture = create_test_csv();
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());

    let small = TrainConfig {
        n_trees: 3,
        ..config(&fixture)
    };
    train(&small).unwrap().bundle.save(&paths).unwrap();
    train(&config(&fixture)).unwrap().bundle.save(&paths).unwrap();

    assert_eq!(load_artifacts(&paths).unwrap().model.n_trees(), 30);
}

#[test]
fn test_error_handling_missing_inputs() {
    let missing = TrainConfig::new("/nonexistent/churn.csv");
    assert!(train(&missing).is_err());

    let dir = tempfile::tempdir().unwrap();
    assert!(load_artifacts(&ArtifactPaths::in_dir(dir.path())).is_err());
}

#[test]
fn test_structurally_broken_model_is_rejected() {
    let fixture = create_test_csv();
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    train(&config(&fixture)).unwrap().bundle.save(&paths).unwrap();

    // point the root split of the first tree back at itself
    let mut model: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.model).unwrap()).unwrap();
    let root = &mut model["trees"][0]["nodes"][0];
    assert!(root.get("Split").is_some());
    root["Split"]["left"] = serde_json::json!(0);
    std::fs::write(&paths.model, model.to_string()).unwrap();

    let err = load_artifacts(&paths).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChurnError>(),
        Some(ChurnError::CorruptModel(_))
    ));
}
