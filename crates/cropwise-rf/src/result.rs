//! Training result types.

use crate::forest::RandomForest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;
use crate::perm_importance::{PermutationImportance, compute_permutation_importance};

/// A fitted forest plus the diagnostics gathered while growing it.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
    oob_score: Option<OobScore>,
    oob_indices_per_tree: Vec<Vec<usize>>,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: Vec<RankedFeature>,
        oob_score: Option<OobScore>,
        oob_indices_per_tree: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            forest,
            importances,
            oob_score,
            oob_indices_per_tree,
        }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Take ownership of the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// MDI importances, most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// OOB score, when training ran with [`crate::OobMode::Enabled`].
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Permutation importance over each tree's OOB samples.
    ///
    /// `features` and `labels` must be the training data passed to `fit`.
    #[must_use]
    pub fn permutation_importances(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        seed: u64,
    ) -> Vec<PermutationImportance> {
        compute_permutation_importance(&self.forest, features, labels, &self.oob_indices_per_tree, seed)
    }
}
