//! Out-of-bag scoring.

use crate::error::RfError;
use crate::tree::DecisionTree;

/// Accuracy of the forest on samples each tree never saw.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Fraction of OOB-scored samples predicted correctly.
    pub accuracy: f64,
    /// `confusion_matrix[true][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Samples left out of at least one bag.
    pub n_oob_samples: usize,
}

/// Majority vote of the trees whose bag excluded each sample.
///
/// Samples that landed in every bag are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut votes = vec![vec![0usize; n_classes]; features.len()];
    for (tree, oob) in trees.iter().zip(oob_indices_per_tree) {
        for &i in oob {
            votes[i][tree.predict(&features[i])?] += 1;
        }
    }

    let mut confusion_matrix = vec![vec![0usize; n_classes]; n_classes];
    let mut n_oob_samples = 0usize;
    let mut correct = 0usize;
    for (i, sample_votes) in votes.iter().enumerate() {
        if sample_votes.iter().all(|&v| v == 0) {
            continue;
        }
        let predicted = sample_votes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
            .map_or(0, |(class, _)| class);
        confusion_matrix[labels[i]][predicted] += 1;
        n_oob_samples += 1;
        if predicted == labels[i] {
            correct += 1;
        }
    }

    if n_oob_samples == 0 {
        return Err(RfError::OobEvaluationFailed {
            reason: "no sample has any OOB tree".to_string(),
        });
    }

    Ok(OobScore {
        accuracy: correct as f64 / n_oob_samples as f64,
        confusion_matrix,
        n_oob_samples,
    })
}
