//! Per-feature standardization fitted on the training partition

use ndarray::{Array2, ArrayBase, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};

use crate::error::ChurnError;

/// Fitted standardization parameters: `(x - mean) / scale` per column.
/// Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the rows of `records` using the population standard deviation.
    /// Columns with zero spread get a scale of 1 so they map to 0.
    pub fn fit<S: Data<Elem = f64>>(records: &ArrayBase<S, Ix2>) -> Self {
        if records.nrows() == 0 {
            return Self {
                mean: vec![0.0; records.ncols()],
                scale: vec![1.0; records.ncols()],
            };
        }

        let mean = records
            .mean_axis(Axis(0))
            .map(|mean| mean.to_vec())
            .unwrap_or_else(|| vec![0.0; records.ncols()]);
        let scale = records
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&std| if std > 0.0 && std.is_finite() { std } else { 1.0 })
            .collect();

        Self { mean, scale }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Checks for a deserialized scaler: one finite mean and one finite,
    /// positive scale per feature
    pub(crate) fn validate(&self) -> Result<(), ChurnError> {
        if self.scale.len() != self.mean.len() {
            return Err(ChurnError::CorruptScaler(format!(
                "{} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        for (index, (mean, scale)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !mean.is_finite() || !scale.is_finite() || *scale <= 0.0 {
                return Err(ChurnError::CorruptScaler(format!(
                    "feature {index} has mean {mean} and scale {scale}"
                )));
            }
        }
        Ok(())
    }

    /// Standardize `records`, which must have the fitted column count
    pub fn transform<S: Data<Elem = f64>>(
        &self,
        records: &ArrayBase<S, Ix2>,
    ) -> Result<Array2<f64>, ChurnError> {
        if records.ncols() != self.n_features() {
            return Err(ChurnError::FeatureCountMismatch {
                expected: self.n_features(),
                actual: records.ncols(),
            });
        }

        let mut scaled = records.to_owned();
        for (mut column, (mean, scale)) in scaled
            .axis_iter_mut(Axis(1))
            .zip(self.mean.iter().zip(&self.scale))
        {
            column.mapv_inplace(|value| (value - mean) / scale);
        }
        Ok(scaled)
    }
}
