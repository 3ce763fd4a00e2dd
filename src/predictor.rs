//! Single-record churn scoring against a loaded artifact bundle

use std::collections::HashMap;

use linfa::traits::Predict;
use ndarray::{Array1, Array2, Axis};
use tracing::{debug, warn};

use crate::artifacts::ArtifactBundle;
use crate::error::ChurnError;
use crate::forest::RandomForest;
use crate::scaler::StandardScaler;

/// What to do when the input lacks a feature the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFeaturePolicy {
    /// Substitute 0.0 for the absent feature
    #[default]
    Zero,
    /// Fail with [`ChurnError::MissingFeature`]
    Reject,
}

/// Outcome of scoring one customer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// 1 for churn, 0 otherwise
    pub label: usize,
    /// Probability of churn, in [0, 1]
    pub probability: f64,
}

impl Prediction {
    pub fn is_churn(&self) -> bool {
        self.label == 1
    }
}

/// Build the single-row feature matrix in `feature_names` order.
/// Keys of `input` that are not feature names are ignored.
pub fn feature_vector(
    input: &HashMap<String, f64>,
    feature_names: &[String],
    policy: MissingFeaturePolicy,
) -> Result<Array2<f64>, ChurnError> {
    let mut values = Vec::with_capacity(feature_names.len());
    let mut defaulted = Vec::new();

    for name in feature_names {
        match input.get(name) {
            Some(&value) => values.push(value),
            None => match policy {
                MissingFeaturePolicy::Zero => {
                    defaulted.push(name.as_str());
                    values.push(0.0);
                }
                MissingFeaturePolicy::Reject => {
                    return Err(ChurnError::MissingFeature(name.clone()));
                }
            },
        }
    }

    if !defaulted.is_empty() {
        warn!(count = defaulted.len(), "features absent from input defaulted to 0");
        debug!(features = ?defaulted, "defaulted features");
    }

    Ok(Array1::from(values).insert_axis(Axis(0)))
}

/// Score one record
///
/// # Arguments
/// * `input` - Feature name to value, a subset or superset of `feature_names`
/// * `model` - Fitted forest
/// * `scaler` - Scaler fitted in the same training run
/// * `feature_names` - Persisted feature order
/// * `policy` - Handling of features absent from `input`
///
/// # Returns
/// * `Prediction` with the predicted label and churn probability
pub fn predict(
    input: &HashMap<String, f64>,
    model: &RandomForest,
    scaler: &StandardScaler,
    feature_names: &[String],
    policy: MissingFeaturePolicy,
) -> Result<Prediction, ChurnError> {
    let row = feature_vector(input, feature_names, policy)?;
    let scaled = scaler.transform(&row)?;

    let probability = model.predict_positive_proba(&scaled)?[0];
    let labels: Array1<usize> = model.predict(&scaled);

    Ok(Prediction {
        label: labels[0],
        probability,
    })
}

impl ArtifactBundle {
    /// Score one record with this bundle
    pub fn predict(
        &self,
        input: &HashMap<String, f64>,
        policy: MissingFeaturePolicy,
    ) -> Result<Prediction, ChurnError> {
        predict(input, &self.model, &self.scaler, &self.feature_names, policy)
    }

    /// Number of model features present in `input`; unknown keys are not counted
    pub fn provided_features(&self, input: &HashMap<String, f64>) -> usize {
        self.feature_names
            .iter()
            .filter(|name| input.contains_key(*name))
            .count()
    }
}
