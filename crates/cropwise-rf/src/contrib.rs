//! Per-feature contributions to a single prediction.
//!
//! Each split moves the class distribution from the parent's to the
//! child's; that change is credited to the split feature. Along a root to
//! leaf path the credits telescope, so `bias + sum(contributions)` equals
//! the leaf distribution exactly. Averaging over trees keeps the identity
//! for the forest's `predict_proba`.

use crate::error::RfError;
use crate::forest::RandomForest;

/// Decomposition of one prediction into a bias and per-feature terms.
#[derive(Debug, Clone)]
pub struct Contributions {
    /// Mean root distribution, i.e. the training class prior.
    pub bias: Vec<f64>,
    /// `values[feature][class]`.
    pub values: Vec<Vec<f64>>,
}

impl Contributions {
    /// Contribution of every feature towards `class`.
    #[must_use]
    pub fn for_class(&self, class: usize) -> Vec<f64> {
        self.values.iter().map(|per_class| per_class.get(class).copied().unwrap_or(0.0)).collect()
    }
}

impl RandomForest {
    /// Decompose the prediction for `sample` along every tree's decision path.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn contributions(&self, sample: &[f64]) -> Result<Contributions, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }

        let mut bias = vec![0.0f64; self.n_classes];
        let mut values = vec![vec![0.0f64; self.n_classes]; self.n_features];

        for tree in &self.trees {
            let path = tree.decision_path(sample);
            for (b, p) in bias.iter_mut().zip(tree.nodes[0].distribution()) {
                *b += p;
            }
            for step in path.windows(2) {
                let parent = &tree.nodes[step[0]];
                let child = &tree.nodes[step[1]];
                let Some(feature) = parent.split_feature() else {
                    continue;
                };
                let target = &mut values[feature.index()];
                for (class, slot) in target.iter_mut().enumerate() {
                    *slot += child.distribution()[class] - parent.distribution()[class];
                }
            }
        }

        let n = self.trees.len() as f64;
        bias.iter_mut().for_each(|v| *v /= n);
        values.iter_mut().flatten().for_each(|v| *v /= n);
        Ok(Contributions { bias, values })
    }
}
