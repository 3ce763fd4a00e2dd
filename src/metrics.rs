//! Classification report: per-class precision, recall, F1 and accuracy

use std::fmt;

use ndarray::Array1;

/// Scores for one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Rows whose true label is this class
    pub support: usize,
}

/// Evaluation of binary predictions against true labels
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    /// Indexed by class label (0, 1)
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build the report; any zero denominator scores 0
    pub fn new(actual: &Array1<usize>, predicted: &Array1<usize>) -> crate::Result<Self> {
        if actual.len() != predicted.len() {
            anyhow::bail!(
                "{} true labels but {} predictions",
                actual.len(),
                predicted.len()
            );
        }

        // confusion[actual][predicted]
        let mut confusion = [[0usize; 2]; 2];
        for (&truth, &guess) in actual.iter().zip(predicted.iter()) {
            if truth > 1 || guess > 1 {
                anyhow::bail!("labels must be 0 or 1, found {truth} / {guess}");
            }
            confusion[truth][guess] += 1;
        }

        let classes = [0usize, 1].map(|class| {
            let true_positive = confusion[class][class] as f64;
            let predicted_total = (confusion[0][class] + confusion[1][class]) as f64;
            let support = confusion[class][0] + confusion[class][1];
            let precision = ratio(true_positive, predicted_total);
            let recall = ratio(true_positive, support as f64);
            ClassMetrics {
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        });

        let total = actual.len();
        let accuracy = ratio((confusion[0][0] + confusion[1][1]) as f64, total as f64);

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weight = |value: fn(&ClassMetrics) -> f64| {
            classes
                .iter()
                .map(|metrics| value(metrics) * metrics.support as f64)
                .sum::<f64>()
                / (total.max(1)) as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        })
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (class, metrics) in self.classes.iter().enumerate() {
            write_row(f, &class.to_string(), metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, metrics: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        label, metrics.precision, metrics.recall, metrics.f1, metrics.support
    )
}
