//! ChurnForge: customer churn prediction with a random forest classifier
//!
//! The library covers the offline training pipeline (load, clean, encode,
//! split, scale, fit, evaluate, persist) and the inference side that loads
//! the persisted artifact bundle and scores a single customer record.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod predictor;
pub mod scaler;
pub mod split;
pub mod trainer;
pub mod tree;

// Re-export public items for easier access
pub use artifacts::{load_artifacts, ArtifactBundle};
pub use cli::Args;
pub use config::{ArtifactPaths, DatasetConfig, TrainConfig};
pub use data::{clean_dataset, encode_features, load_dataset, CleaningReport, EncodedDataset};
pub use error::ChurnError;
pub use forest::{RandomForest, RandomForestParams};
pub use metrics::ClassificationReport;
pub use predictor::{predict, MissingFeaturePolicy, Prediction};
pub use scaler::StandardScaler;
pub use trainer::{train, TrainingOutcome};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
