//! Training pipeline: dataset file in, artifact bundle and evaluation out

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use tracing::info;

use crate::artifacts::ArtifactBundle;
use crate::config::TrainConfig;
use crate::data::{clean_dataset, encode_features, load_dataset, CleaningReport, EncodedDataset};
use crate::forest::RandomForestParams;
use crate::metrics::ClassificationReport;
use crate::scaler::StandardScaler;
use crate::split::{stratified_split, TrainTestSplit};

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub cleaning: CleaningReport,
    /// Held-out evaluation, informational only
    pub report: ClassificationReport,
    /// Unscaled design matrix the model was trained and evaluated on
    pub encoded: EncodedDataset,
    pub split: TrainTestSplit,
}

impl TrainingOutcome {
    /// The `n` most important features, most important first
    pub fn top_features(&self, n: usize) -> Vec<(&str, f64)> {
        let importances = self.bundle.model.feature_importances();
        let mut ranked: Vec<(&str, f64)> = self
            .bundle
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Run the full pipeline on `config.input` without writing artifacts
pub fn train(config: &TrainConfig) -> crate::Result<TrainingOutcome> {
    let df = load_dataset(&config.input, &config.dataset)?;
    let (df, cleaning) = clean_dataset(df, &config.dataset)?;
    let encoded = encode_features(&df, &config.dataset.target)?;
    fit_encoded(encoded, cleaning, config)
}

/// Split, scale, fit and evaluate an already encoded dataset
///
/// The scaler only sees the training partition; the test partition is
/// transformed with the same parameters.
pub fn fit_encoded(
    encoded: EncodedDataset,
    cleaning: CleaningReport,
    config: &TrainConfig,
) -> crate::Result<TrainingOutcome> {
    let split = stratified_split(&encoded.targets, config.test_ratio, config.seed)?;
    let train = encoded.select_rows(&split.train);
    let test = encoded.select_rows(&split.test);
    info!(train = split.train.len(), test = split.test.len(), "dataset split");

    let scaler = StandardScaler::fit(&train.records);
    let train_scaled = scaler.transform(&train.records)?;
    let test_scaled = scaler.transform(&test.records)?;

    let model = RandomForestParams::new()
        .n_trees(config.n_trees)
        .max_depth(config.max_depth)
        .min_samples_split(config.min_samples_split)
        .seed(config.seed)
        .fit(&Dataset::new(train_scaled, train.targets))?;
    info!(trees = model.n_trees(), "model fitted");

    let predicted = model.predict(&test_scaled);
    let report = ClassificationReport::new(&test.targets, &predicted)?;
    info!(accuracy = report.accuracy, "model evaluated");

    let bundle = ArtifactBundle::new(model, scaler, encoded.feature_names.clone())?;

    Ok(TrainingOutcome {
        bundle,
        cleaning,
        report,
        encoded,
        split,
    })
}
