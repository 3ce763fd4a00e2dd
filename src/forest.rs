//! Random forest classifier exposed through linfa's `Fit` / `Predict` traits

use linfa::traits::{Fit, PredictInplace};
use linfa::DatasetBase;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_SEED, DEFAULT_TREES};
use crate::error::ChurnError;
use crate::tree::{DecisionTree, Distribution, TreeParams};

/// Features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let count = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(count) => count.min(n_features),
        };
        count.max(1)
    }
}

/// Hyperparameters of the forest, in linfa's builder style
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestParams {
    n_trees: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

impl RandomForestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit each tree on a bootstrap sample (default) or on every row
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn check(&self) -> Result<(), ChurnError> {
        if self.n_trees == 0 {
            return Err(ChurnError::InvalidParameter("n_trees must be positive".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(ChurnError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

impl Fit<Array2<f64>, Array1<usize>, ChurnError> for RandomForestParams {
    type Object = RandomForest;

    fn fit(
        &self,
        dataset: &DatasetBase<Array2<f64>, Array1<usize>>,
    ) -> Result<Self::Object, ChurnError> {
        self.check()?;

        let records = dataset.records();
        let targets = dataset.targets();
        let n_samples = records.nrows();
        let n_features = records.ncols();

        if n_samples == 0 {
            return Err(ChurnError::InvalidParameter("cannot fit on zero rows".to_string()));
        }
        if targets.len() != n_samples {
            return Err(ChurnError::InvalidParameter(format!(
                "{} targets for {} rows",
                targets.len(),
                n_samples
            )));
        }
        if let Some(&label) = targets.iter().find(|&&label| label > 1) {
            return Err(ChurnError::NonBinaryLabel(label));
        }

        let tree_params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features.resolve(n_features),
        };

        let mut master = ChaCha8Rng::seed_from_u64(self.seed);
        let trees: Vec<DecisionTree> = (0..self.n_trees)
            .map(|_| {
                let mut rng = ChaCha8Rng::seed_from_u64(master.gen());
                let samples = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(records.view(), targets.view(), samples, tree_params, rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            features = n_features,
            max_features = tree_params.max_features,
            mean_depth = trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64,
            "random forest fitted"
        );

        Ok(RandomForest { trees, n_features })
    }
}

/// Fitted forest. Read-only after fitting; prediction never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn params() -> RandomForestParams {
        RandomForestParams::default()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class probabilities `(n_rows, 2)`: the mean of the leaf distributions
    /// reached in every tree
    pub fn predict_proba<S: Data<Elem = f64>>(
        &self,
        records: &ArrayBase<S, Ix2>,
    ) -> Result<Array2<f64>, ChurnError> {
        self.check_width(records.ncols())?;

        let mut probabilities = Array2::zeros((records.nrows(), 2));
        for (row, mut out) in records.outer_iter().zip(probabilities.outer_iter_mut()) {
            let distribution = self.distribution(row);
            out[0] = distribution[0];
            out[1] = distribution[1];
        }
        Ok(probabilities)
    }

    /// Probability of class 1 for each row
    pub fn predict_positive_proba<S: Data<Elem = f64>>(
        &self,
        records: &ArrayBase<S, Ix2>,
    ) -> Result<Array1<f64>, ChurnError> {
        Ok(self.predict_proba(records)?.column(1).to_owned())
    }

    /// Mean decrease in impurity per feature, summing to 1 unless no tree
    /// ever split
    pub fn feature_importances(&self) -> Array1<f64> {
        let mut importances = Array1::zeros(self.n_features);
        for tree in &self.trees {
            for (total, &value) in importances.iter_mut().zip(tree.importances()) {
                *total += value;
            }
        }
        let sum = importances.sum();
        if sum > 0.0 {
            importances /= sum;
        }
        importances
    }

    /// Structural checks for a deserialized forest
    pub(crate) fn validate(&self) -> Result<(), ChurnError> {
        if self.trees.is_empty() {
            return Err(ChurnError::CorruptModel("forest without trees".to_string()));
        }
        for tree in &self.trees {
            if tree.n_features() != self.n_features {
                return Err(ChurnError::CorruptModel(format!(
                    "tree expects {} features, forest {}",
                    tree.n_features(),
                    self.n_features
                )));
            }
            tree.validate()?;
        }
        Ok(())
    }

    fn check_width(&self, actual: usize) -> Result<(), ChurnError> {
        if actual != self.n_features {
            return Err(ChurnError::FeatureCountMismatch {
                expected: self.n_features,
                actual,
            });
        }
        Ok(())
    }

    fn distribution(&self, row: ArrayView1<'_, f64>) -> Distribution {
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let distribution = tree.distribution(row);
            sum[0] += distribution[0];
            sum[1] += distribution[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }
}

/// Most probable class, ties going to class 0
fn label_of(distribution: Distribution) -> usize {
    usize::from(distribution[1] > distribution[0])
}

impl PredictInplace<Array2<f64>, Array1<usize>> for RandomForest {
    fn predict_inplace<'a>(&'a self, records: &'a Array2<f64>, targets: &mut Array1<usize>) {
        assert_eq!(
            records.nrows(),
            targets.len(),
            "the number of data points must match the number of output targets"
        );
        assert_eq!(
            records.ncols(),
            self.n_features,
            "the number of features must match the fitted model"
        );

        for (row, target) in records.outer_iter().zip(targets.iter_mut()) {
            *target = label_of(self.distribution(row));
        }
    }

    fn default_target(&self, records: &Array2<f64>) -> Array1<usize> {
        Array1::zeros(records.nrows())
    }
}
