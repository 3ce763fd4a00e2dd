//! CART classification tree with Gini impurity, the building block of the forest

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ChurnError;

/// Class distribution over {0, 1}
pub type Distribution = [f64; 2];

/// Allowed drift of a leaf distribution's sum from 1
const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Tree node stored in a flat arena; children always come after their parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        /// Rows with `value <= threshold` go left
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Distribution,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Non-constant features examined per node
    pub max_features: usize,
}

/// Fitted binary classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    /// Normalized mean decrease in impurity per feature
    importances: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    weighted_impurity: f64,
}

struct Builder<'a, R> {
    records: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, usize>,
    params: TreeParams,
    rng: R,
    nodes: Vec<Node>,
    decrease: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples` (repeats allowed, as
    /// produced by bootstrapping). Targets must be 0 or 1.
    pub(crate) fn fit<'a, R: Rng>(
        records: ArrayView2<'a, f64>,
        targets: ArrayView1<'a, usize>,
        mut samples: Vec<usize>,
        params: TreeParams,
        rng: R,
    ) -> Self {
        let n_features = records.ncols();
        let mut builder = Builder {
            records,
            targets,
            params,
            rng,
            nodes: Vec::new(),
            decrease: vec![0.0; n_features],
        };
        builder.grow(&mut samples, 0);

        let total: f64 = builder.decrease.iter().sum();
        let importances = if total > 0.0 {
            builder.decrease.iter().map(|d| d / total).collect()
        } else {
            vec![0.0; n_features]
        };

        Self {
            nodes: builder.nodes,
            n_features,
            importances,
        }
    }

    /// Class distribution of the leaf reached by `row`
    pub fn distribution(&self, row: ArrayView1<'_, f64>) -> Distribution {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return *distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Checks for a deserialized tree: traversal cannot index out of bounds
    /// or cycle, and every leaf holds a probability distribution
    pub(crate) fn validate(&self) -> Result<(), ChurnError> {
        if self.nodes.is_empty() {
            return Err(ChurnError::CorruptModel("tree without nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { distribution } => {
                    let valid = distribution.iter().all(|p| p.is_finite() && *p >= 0.0)
                        && (distribution[0] + distribution[1] - 1.0).abs() <= DISTRIBUTION_TOLERANCE;
                    if !valid {
                        return Err(ChurnError::CorruptModel(format!(
                            "leaf {index} holds invalid distribution {distribution:?}"
                        )));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if !threshold.is_finite() {
                        return Err(ChurnError::CorruptModel(format!(
                            "node {index} has non-finite threshold {threshold}"
                        )));
                    }
                    if *feature >= self.n_features {
                        return Err(ChurnError::CorruptModel(format!(
                            "node {index} splits on feature {feature} of {}",
                            self.n_features
                        )));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(ChurnError::CorruptModel(format!(
                                "node {index} points to invalid child {child}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl<R: Rng> Builder<'_, R> {
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(samples);
        let n = samples.len() as f64;
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: [counts[0] as f64 / n, counts[1] as f64 / n],
        });

        let pure = counts[0] == 0 || counts[1] == 0;
        let too_deep = self.params.max_depth.is_some_and(|max| depth >= max);
        if pure || too_deep || samples.len() < self.params.min_samples_split {
            return index;
        }

        let Some(split) = self.best_split(samples, counts) else {
            return index;
        };

        let mut mid = 0;
        for i in 0..samples.len() {
            if self.records[[samples[i], split.feature]] <= split.threshold {
                samples.swap(i, mid);
                mid += 1;
            }
        }
        self.decrease[split.feature] += n * gini(counts) - split.weighted_impurity;

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// Lowest weighted Gini split over a random subset of features. Features
    /// are visited in random order until `max_features` non-constant ones have
    /// been examined.
    fn best_split(&mut self, samples: &[usize], counts: [usize; 2]) -> Option<Candidate> {
        let mut features: Vec<usize> = (0..self.records.ncols()).collect();
        features.shuffle(&mut self.rng);

        let total = samples.len();
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(total);
        let mut best: Option<Candidate> = None;
        let mut examined = 0;

        for feature in features {
            if examined >= self.params.max_features {
                break;
            }

            sorted.clear();
            sorted.extend(
                samples
                    .iter()
                    .map(|&sample| (self.records[[sample, feature]], self.targets[sample])),
            );
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 >= sorted[total - 1].0 {
                continue;
            }
            examined += 1;

            let mut left = [0usize; 2];
            for i in 0..total - 1 {
                left[sorted[i].1] += 1;
                let (value, next) = (sorted[i].0, sorted[i + 1].0);
                if value >= next {
                    continue;
                }

                let right = [counts[0] - left[0], counts[1] - left[1]];
                let impurity = (i + 1) as f64 * gini(left) + (total - i - 1) as f64 * gini(right);
                if best
                    .as_ref()
                    .map_or(true, |current| impurity < current.weighted_impurity)
                {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        weighted_impurity: impurity,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, samples: &[usize]) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for &sample in samples {
            counts[self.targets[sample]] += 1;
        }
        counts
    }
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}
