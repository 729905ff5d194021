//! Configuration builder for forest training.

use serde::{Deserialize, Serialize};

use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::{SplitCriterion, SplitMethod};

/// How many columns each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_features))`.
    Sqrt,
    /// `ceil(log2(n_features))`, at least 1.
    Log2,
    /// `ceil(n_features * f)` for `f` in `(0.0, 1.0]`.
    Fraction(f64),
    /// An explicit count.
    Fixed(usize),
    /// Every column.
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete column count for `n_features` columns.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidMaxFeatures`] when the count falls outside `[1, n_features]`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(count) => count,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Whether training also scores the forest on its out-of-bag samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Compute OOB accuracy and confusion matrix.
    Enabled,
    /// Skip OOB scoring.
    Disabled,
}

/// Configuration for random forest training.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `max_features`       | `Sqrt`      |
/// | `max_depth`          | `None`      |
/// | `min_samples_split`  | 2           |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `split_method`       | `Exact`     |
/// | `seed`               | 42          |
/// | `oob_mode`           | `Disabled`  |
/// | `bootstrap_fraction` | 1.0         |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// Create a config for `n_trees` trees with the defaults above.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            seed: 42,
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 1.0,
        })
    }

    /// Set the per-split column sampling strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Limit tree depth. `None` grows until leaves are pure.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum node size eligible for splitting.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum size of each child after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the split-finding strategy.
    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Set the master seed from which per-tree seeds are drawn.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable OOB scoring.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the share of the training set drawn (with replacement) per tree.
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Train a forest on row-major `features` with zero-based `labels`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `features` is empty |
    /// | [`RfError::LabelCountMismatch`] | `labels` and `features` differ in length |
    /// | [`RfError::ZeroFeatures`] | rows have no columns |
    /// | [`RfError::FeatureCountMismatch`] | rows differ in length |
    /// | [`RfError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`RfError::InvalidMaxFeatures`] | `max_features` resolves outside `[1, n_features]` |
    /// | [`RfError::InvalidBootstrapFraction`] | fraction outside `(0.0, 1.0]` |
    /// | [`RfError::InvalidMaxDepth`] and other tree settings | invalid per-tree limits |
    /// | [`RfError::OobEvaluationFailed`] | OOB enabled but every sample was in every bag |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(15).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(15).unwrap(), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(15).unwrap(), 8);
        assert_eq!(MaxFeatures::All.resolve(7).unwrap(), 7);
        assert!(MaxFeatures::Fixed(16).resolve(15).is_err());
        assert!(MaxFeatures::Fixed(0).resolve(15).is_err());
    }

    #[test]
    fn builder_round_trip() {
        let config = RandomForestConfig::new(50)
            .unwrap()
            .with_max_depth(Some(20))
            .with_min_samples_leaf(2)
            .with_split_method(SplitMethod::ExtraTrees)
            .with_seed(7);
        assert_eq!(config.n_trees, 50);
        assert_eq!(config.max_depth, Some(20));
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.split_method, SplitMethod::ExtraTrees);
        assert_eq!(config.seed, 7);
        assert_eq!(config.oob_mode, OobMode::Disabled);
    }

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0).unwrap_err(),
            RfError::InvalidTreeCount { n_trees: 0 }
        ));
    }
}
