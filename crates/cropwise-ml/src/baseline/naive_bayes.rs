use tracing::debug;

use super::{argmax, check_training};
use crate::MlError;

const NAME: &str = "Naive Bayes";

/// Gaussian naive Bayes with per-class, per-feature variances.
///
/// Variances are padded by `var_smoothing` times the largest feature
/// variance so constant columns do not divide by zero.
#[derive(Debug, Clone)]
pub struct GaussianNaiveBayes {
    log_priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl GaussianNaiveBayes {
    /// Default variance padding as a fraction of the widest feature variance.
    pub const VAR_SMOOTHING: f64 = 1e-9;

    /// Estimate class priors, means and variances.
    ///
    /// Classes absent from `labels` get a prior of zero and are never predicted.
    ///
    /// # Errors
    ///
    /// [`MlError::Baseline`] when the data is empty or ragged.
    pub fn fit(features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<Self, MlError> {
        let width = check_training(NAME, features, labels)?;
        let n_classes = n_classes.max(labels.iter().max().map_or(0, |&m| m + 1));

        let mut counts = vec![0usize; n_classes];
        let mut means = vec![vec![0.0f64; width]; n_classes];
        for (row, &class) in features.iter().zip(labels) {
            counts[class] += 1;
            for (m, v) in means[class].iter_mut().zip(row) {
                *m += v;
            }
        }
        for (class_means, &count) in means.iter_mut().zip(&counts) {
            if count > 0 {
                class_means.iter_mut().for_each(|m| *m /= count as f64);
            }
        }

        let mut variances = vec![vec![0.0f64; width]; n_classes];
        for (row, &class) in features.iter().zip(labels) {
            for ((var, v), m) in variances[class].iter_mut().zip(row).zip(&means[class]) {
                *var += (v - m).powi(2);
            }
        }
        for (class_vars, &count) in variances.iter_mut().zip(&counts) {
            if count > 0 {
                class_vars.iter_mut().for_each(|v| *v /= count as f64);
            }
        }

        let epsilon = Self::VAR_SMOOTHING * max_column_variance(features, width);
        // Guard against a dataset where every column is constant.
        let epsilon = if epsilon > 0.0 { epsilon } else { Self::VAR_SMOOTHING };
        variances.iter_mut().flatten().for_each(|v| *v += epsilon);

        let total = labels.len() as f64;
        let log_priors = counts
            .iter()
            .map(|&c| if c == 0 { f64::NEG_INFINITY } else { (c as f64 / total).ln() })
            .collect();

        debug!(n_classes, width, epsilon, "naive Bayes fitted");
        Ok(Self {
            log_priors,
            means,
            variances,
        })
    }

    /// Most probable class of one row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> usize {
        let scores: Vec<f64> = self
            .log_priors
            .iter()
            .zip(self.means.iter().zip(&self.variances))
            .map(|(&prior, (means, vars))| {
                if prior == f64::NEG_INFINITY {
                    return prior;
                }
                let log_likelihood: f64 = row
                    .iter()
                    .zip(means.iter().zip(vars))
                    .map(|(&x, (&m, &v))| -0.5 * ((2.0 * std::f64::consts::PI * v).ln() + (x - m).powi(2) / v))
                    .sum();
                prior + log_likelihood
            })
            .collect();
        argmax(&scores)
    }

    /// Predict every row.
    #[must_use]
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<usize> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

fn max_column_variance(features: &[Vec<f64>], width: usize) -> f64 {
    let n = features.len() as f64;
    (0..width)
        .map(|col| {
            let mean = features.iter().map(|r| r[col]).sum::<f64>() / n;
            features.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_blobs() {
        let features = vec![
            vec![1.0, 10.0],
            vec![1.2, 11.0],
            vec![0.8, 9.5],
            vec![5.0, 2.0],
            vec![5.3, 2.5],
            vec![4.9, 1.5],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let model = GaussianNaiveBayes::fit(&features, &labels, 2).unwrap();
        assert_eq!(model.predict_batch(&features), labels);
        assert_eq!(model.predict(&[1.1, 10.2]), 0);
        assert_eq!(model.predict(&[5.1, 2.1]), 1);
    }

    #[test]
    fn constant_column_does_not_break_fit() {
        let features = vec![vec![3.0, 0.0], vec![3.0, 0.1], vec![3.0, 5.0], vec![3.0, 5.2]];
        let labels = vec![0, 0, 1, 1];
        let model = GaussianNaiveBayes::fit(&features, &labels, 2).unwrap();
        assert_eq!(model.predict(&[3.0, 4.9]), 1);
    }

    #[test]
    fn unseen_class_never_predicted() {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        let labels = vec![0, 0, 2, 2];
        let model = GaussianNaiveBayes::fit(&features, &labels, 3).unwrap();
        assert!(model.predict_batch(&features).iter().all(|&c| c != 1));
    }

    #[test]
    fn empty_input_rejected() {
        let err = GaussianNaiveBayes::fit(&[], &[], 2).unwrap_err();
        assert!(matches!(err, MlError::Baseline { model: "Naive Bayes", .. }));
    }
}
