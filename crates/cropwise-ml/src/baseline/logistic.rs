use tracing::debug;

use super::{argmax, check_training};
use crate::MlError;

const NAME: &str = "Logistic Regression";

/// Multinomial logistic regression trained by full-batch gradient descent.
///
/// Inputs are standardized internally with statistics from the training
/// rows, so callers can pass raw measurements. An L2 penalty keeps the
/// weights finite on separable data.
#[derive(Debug, Clone)]
pub struct SoftmaxRegression {
    mean: Vec<f64>,
    scale: Vec<f64>,
    /// `weights[class][feature]`.
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl SoftmaxRegression {
    /// Gradient steps.
    pub const MAX_ITER: usize = 500;
    /// Step size.
    pub const LEARNING_RATE: f64 = 0.5;
    /// L2 penalty on the weights.
    pub const L2: f64 = 1e-4;

    /// Fit weights for `n_classes` classes.
    ///
    /// # Errors
    ///
    /// [`MlError::Baseline`] when the data is empty, ragged or the
    /// weights diverge.
    pub fn fit(features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<Self, MlError> {
        let width = check_training(NAME, features, labels)?;
        let n_classes = n_classes.max(labels.iter().max().map_or(0, |&m| m + 1));
        let n = features.len() as f64;

        let mut mean = vec![0.0f64; width];
        for row in features {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut scale = vec![0.0f64; width];
        for row in features {
            for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }
        scale.iter_mut().for_each(|s| *s = if *s > 0.0 { s.sqrt() } else { 1.0 });

        let standardized: Vec<Vec<f64>> = features.iter().map(|r| standardize(r, &mean, &scale)).collect();

        let mut weights = vec![vec![0.0f64; width]; n_classes];
        let mut bias = vec![0.0f64; n_classes];
        let mut probs = vec![0.0f64; n_classes];

        for _ in 0..Self::MAX_ITER {
            let mut grad_w = vec![vec![0.0f64; width]; n_classes];
            let mut grad_b = vec![0.0f64; n_classes];
            for (row, &label) in standardized.iter().zip(labels) {
                softmax_into(&weights, &bias, row, &mut probs);
                for (class, &p) in probs.iter().enumerate() {
                    let err = p - if class == label { 1.0 } else { 0.0 };
                    grad_b[class] += err;
                    for (g, x) in grad_w[class].iter_mut().zip(row) {
                        *g += err * x;
                    }
                }
            }
            for ((w_class, g_class), (b, gb)) in weights.iter_mut().zip(&grad_w).zip(bias.iter_mut().zip(&grad_b)) {
                for (w, g) in w_class.iter_mut().zip(g_class) {
                    *w -= Self::LEARNING_RATE * (g / n + Self::L2 * *w);
                }
                *b -= Self::LEARNING_RATE * gb / n;
            }
        }

        if weights.iter().flatten().chain(&bias).any(|v| !v.is_finite()) {
            return Err(MlError::Baseline {
                model: NAME,
                reason: "weights diverged".to_string(),
            });
        }
        debug!(n_classes, width, iterations = Self::MAX_ITER, "softmax regression fitted");
        Ok(Self {
            mean,
            scale,
            weights,
            bias,
        })
    }

    /// Class probabilities of one row.
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let x = standardize(row, &self.mean, &self.scale);
        let mut probs = vec![0.0f64; self.bias.len()];
        softmax_into(&self.weights, &self.bias, &x, &mut probs);
        probs
    }

    /// Most probable class of one row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    /// Predict every row.
    #[must_use]
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<usize> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

fn standardize(row: &[f64], mean: &[f64], scale: &[f64]) -> Vec<f64> {
    row.iter().zip(mean.iter().zip(scale)).map(|(v, (m, s))| (v - m) / s).collect()
}

fn softmax_into(weights: &[Vec<f64>], bias: &[f64], row: &[f64], out: &mut [f64]) {
    for ((o, w), b) in out.iter_mut().zip(weights).zip(bias) {
        *o = b + w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>();
    }
    let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for o in out.iter_mut() {
        *o = (*o - max).exp();
        total += *o;
    }
    out.iter_mut().for_each(|o| *o /= total);
}
