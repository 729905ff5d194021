//! Non-forest classifiers used as comparison baselines.

mod logistic;
mod naive_bayes;

pub use logistic::SoftmaxRegression;
pub use naive_bayes::GaussianNaiveBayes;

use crate::MlError;

/// Reject empty, ragged or label-mismatched training data.
pub(crate) fn check_training(
    model: &'static str,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<usize, MlError> {
    let fail = |reason: String| MlError::Baseline { model, reason };
    let Some(first) = features.first() else {
        return Err(fail("no training rows".to_string()));
    };
    if features.len() != labels.len() {
        return Err(fail(format!("{} rows but {} labels", features.len(), labels.len())));
    }
    let width = first.len();
    if width == 0 {
        return Err(fail("rows have no columns".to_string()));
    }
    if let Some(row) = features.iter().position(|r| r.len() != width) {
        return Err(fail(format!("row {row} has {} columns, expected {width}", features[row].len())));
    }
    Ok(width)
}

/// Index of the largest value; ties go to the lower index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        .map_or(0, |(idx, _)| idx)
}
