//! Seeded, stratified train/test partitioning

use ndarray::{Array1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::EncodedDataset;
use crate::error::ChurnError;

/// Row indices of the two partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows so both partitions keep the class balance of `targets`
///
/// Each class contributes `round(count * test_ratio)` rows to the test side,
/// clamped to `1..=count - 1`, chosen after shuffling with `seed`.
///
/// # Arguments
/// * `targets` - Binary labels, one per row
/// * `test_ratio` - Fraction held out, strictly between 0 and 1
/// * `seed` - Seed for the shuffle
pub fn stratified_split(
    targets: &Array1<usize>,
    test_ratio: f64,
    seed: u64,
) -> Result<TrainTestSplit, ChurnError> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ChurnError::InvalidParameter(format!(
            "test ratio must be in (0, 1), got {test_ratio}"
        )));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (row, &label) in targets.iter().enumerate() {
        match by_class.get_mut(label) {
            Some(rows) => rows.push(row),
            None => return Err(ChurnError::NonBinaryLabel(label)),
        }
    }

    for (class, rows) in by_class.iter().enumerate() {
        if rows.is_empty() {
            return Err(ChurnError::SingleClass(1 - class));
        }
        if rows.len() < 2 {
            return Err(ChurnError::TooFewClassMembers {
                class,
                count: rows.len(),
            });
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(targets.len());
    let mut test = Vec::new();

    for mut rows in by_class {
        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64 * test_ratio).round() as usize).clamp(1, rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(TrainTestSplit { train, test })
}

impl EncodedDataset {
    /// Rows of this dataset selected by `rows`, in that order
    pub fn select_rows(&self, rows: &[usize]) -> EncodedDataset {
        EncodedDataset {
            records: self.records.select(Axis(0), rows),
            targets: self.targets.select(Axis(0), rows),
            feature_names: self.feature_names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(zeros: usize, ones: usize) -> Array1<usize> {
        (0..zeros + ones).map(|row| usize::from(row >= zeros)).collect()
    }

    #[test]
    fn test_split_preserves_class_balance() {
        let targets = labels(80, 20);
        let split = stratified_split(&targets, 0.2, 42).unwrap();

        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let test_churn = split.test.iter().filter(|&&row| targets[row] == 1).count();
        let train_churn = split.train.iter().filter(|&&row| targets[row] == 1).count();
        assert_eq!(test_churn, 4);
        assert_eq!(train_churn, 16);
    }

    #[test]
    fn test_split_is_a_partition() {
        let targets = labels(13, 7);
        let split = stratified_split(&targets, 0.3, 9).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let targets = labels(30, 10);
        let first = stratified_split(&targets, 0.2, 42).unwrap();
        let second = stratified_split(&targets, 0.2, 42).unwrap();
        let other = stratified_split(&targets, 0.2, 43).unwrap();

        assert_eq!(first, second);
        assert_ne!(first.test, other.test);
    }

    #[test]
    fn test_split_rejects_single_class() {
        let targets = labels(10, 0);
        assert!(matches!(
            stratified_split(&targets, 0.2, 42),
            Err(ChurnError::SingleClass(0))
        ));
    }

    #[test]
    fn test_split_rejects_lonely_class() {
        let targets = labels(10, 1);
        assert!(matches!(
            stratified_split(&targets, 0.2, 42),
            Err(ChurnError::TooFewClassMembers { class: 1, count: 1 })
        ));
    }

    #[test]
    fn test_split_rejects_bad_ratio() {
        let targets = labels(10, 10);
        assert!(stratified_split(&targets, 0.0, 42).is_err());
        assert!(stratified_split(&targets, 1.0, 42).is_err());
    }
}
