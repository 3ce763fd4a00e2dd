//! Typed failures raised by the training and inference pipeline

use thiserror::Error;

/// Errors a caller may want to tell apart; everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("column `{0}` not found in dataset")]
    MissingColumn(String),

    #[error("no rows left after cleaning ({rows_loaded} loaded)")]
    EmptyDataset { rows_loaded: usize },

    #[error("target must contain both classes, found only class {0}")]
    SingleClass(usize),

    #[error("class {class} has {count} row(s); at least 2 are needed for a stratified split")]
    TooFewClassMembers { class: usize, count: usize },

    #[error("labels must be 0 or 1, found {0}")]
    NonBinaryLabel(usize),

    #[error("expected {expected} feature(s), got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("feature `{0}` missing from input")]
    MissingFeature(String),

    #[error("artifacts disagree on feature count: model {model}, scaler {scaler}, feature list {features}")]
    IncompatibleArtifacts {
        model: usize,
        scaler: usize,
        features: usize,
    },

    #[error("corrupt model: {0}")]
    CorruptModel(String),

    #[error("corrupt scaler: {0}")]
    CorruptScaler(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Linfa(#[from] linfa::Error),
}
