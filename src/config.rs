//! Pipeline configuration with the defaults used for the Telco churn dataset

use std::path::{Path, PathBuf};

pub const DEFAULT_TARGET: &str = "Churn";
pub const DEFAULT_POSITIVE_LABEL: &str = "Yes";
pub const DEFAULT_NEGATIVE_LABEL: &str = "No";
pub const DEFAULT_ID_COLUMN: &str = "customerID";
pub const DEFAULT_NUMERIC_COLUMN: &str = "TotalCharges";

pub const DEFAULT_TEST_RATIO: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TREES: usize = 100;

pub const MODEL_FILE: &str = "churn_model.json";
pub const SCALER_FILE: &str = "churn_scaler.json";
pub const FEATURES_FILE: &str = "churn_features.json";

/// Column roles in the raw dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Two-valued target column
    pub target: String,
    /// Target value mapped to 1
    pub positive_label: String,
    /// Target value mapped to 0
    pub negative_label: String,
    /// Identifier column dropped before encoding
    pub id_column: Option<String>,
    /// Text column coerced to a number, blanks becoming missing
    pub numeric_column: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            positive_label: DEFAULT_POSITIVE_LABEL.to_string(),
            negative_label: DEFAULT_NEGATIVE_LABEL.to_string(),
            id_column: Some(DEFAULT_ID_COLUMN.to_string()),
            numeric_column: Some(DEFAULT_NUMERIC_COLUMN.to_string()),
        }
    }
}

/// Everything one training run needs
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub input: PathBuf,
    pub dataset: DatasetConfig,
    /// Fraction of each class held out for evaluation
    pub test_ratio: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl TrainConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            dataset: DatasetConfig::default(),
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SEED,
            n_trees: DEFAULT_TREES,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Locations of the three artifacts making up one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub features: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            features: dir.join(FEATURES_FILE),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}
