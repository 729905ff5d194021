//! Confusion matrix and per-class classification metrics.

use std::fmt;

use serde::Serialize;

use crate::error::RfError;

/// `matrix[true_class][predicted_class]` counts for a multi-class problem.
#[derive(Debug, Clone, Serialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

/// Precision, recall, F1 and support for one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    /// Encoded class.
    pub class: usize,
    /// `TP / (TP + FP)`, 0.0 when the class was never predicted.
    pub precision: f64,
    /// `TP / (TP + FN)`, 0.0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0.0 when both are zero.
    pub f1: f64,
    /// True samples of the class.
    pub support: usize,
}

/// Precision, recall and F1 averaged across classes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AveragedMetrics {
    /// Averaged precision.
    pub precision: f64,
    /// Averaged recall.
    pub recall: f64,
    /// Averaged F1.
    pub f1: f64,
    /// Total samples.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally true against predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | no labels |
    /// | [`RfError::LabelCountMismatch`] | the slices differ in length |
    pub fn from_labels(true_labels: &[usize], predicted: &[usize], n_classes: usize) -> Result<Self, RfError> {
        if true_labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if true_labels.len() != predicted.len() {
            return Err(RfError::LabelCountMismatch {
                n_features_rows: predicted.len(),
                n_labels: true_labels.len(),
            });
        }
        let n_classes = true_labels
            .iter()
            .chain(predicted)
            .max()
            .map_or(n_classes, |&m| n_classes.max(m + 1));
        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in true_labels.iter().zip(predicted) {
            matrix[t][p] += 1;
        }
        Ok(Self { matrix, n_classes })
    }

    /// Share of samples on the diagonal.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 { 0.0 } else { correct as f64 / total as f64 }
    }

    /// Metrics for every class in index order.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes)
            .map(|c| {
                let tp = self.matrix[c][c];
                let predicted: usize = self.matrix.iter().map(|row| row[c]).sum();
                let support: usize = self.matrix[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Unweighted mean over classes.
    #[must_use]
    pub fn macro_avg(&self) -> AveragedMetrics {
        let metrics = self.class_metrics();
        let n = metrics.len().max(1) as f64;
        AveragedMetrics {
            precision: metrics.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: metrics.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: metrics.iter().map(|m| m.f1).sum::<f64>() / n,
            support: self.total(),
        }
    }

    /// Mean over classes weighted by support.
    #[must_use]
    pub fn weighted_avg(&self) -> AveragedMetrics {
        let metrics = self.class_metrics();
        let total = self.total().max(1) as f64;
        let weighted = |f: fn(&ClassMetrics) -> f64| metrics.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total;
        AveragedMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: self.total(),
        }
    }

    /// Borrow the rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let labels = vec![0, 1, 2, 0, 1, 2];
        let cm = ConfusionMatrix::from_labels(&labels, &labels, 3).unwrap();
        assert!((cm.accuracy() - 1.0).abs() < f64::EPSILON);
        assert!((cm.macro_avg().f1 - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cyclic_mistakes() {
        let truth = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&truth, &predicted, 3).unwrap();
        let metrics = cm.class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);
        assert!((cm.weighted_avg().f1 - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(cm.macro_avg().support, 9);
    }

    #[test]
    fn absent_class_scores_zero() {
        let truth = vec![0, 0, 1, 1];
        let cm = ConfusionMatrix::from_labels(&truth, &truth, 3).unwrap();
        let metrics = cm.class_metrics();
        assert_eq!(metrics[2].support, 0);
        assert_eq!(metrics[2].f1, 0.0);
        assert!((cm.macro_avg().f1 - 2.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn rejects_empty_and_mismatched() {
        assert!(matches!(ConfusionMatrix::from_labels(&[], &[], 2).unwrap_err(), RfError::EmptyDataset));
        assert!(matches!(
            ConfusionMatrix::from_labels(&[0, 1], &[0], 2).unwrap_err(),
            RfError::LabelCountMismatch { .. }
        ));
    }

    #[test]
    fn display_has_headers() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[1, 1], 2).unwrap();
        let text = cm.to_string();
        assert!(text.contains("pred_"));
        assert!(text.contains("true_"));
        assert_eq!(cm.as_rows()[0], vec![0, 1]);
    }
}
