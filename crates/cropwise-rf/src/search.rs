//! Randomized hyperparameter search scored by cross-validation.

use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::eval::CrossValidation;

/// Candidate values for each tuned hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    /// Forest sizes.
    pub n_trees: Vec<usize>,
    /// Depth limits; `None` is unlimited.
    pub max_depth: Vec<Option<usize>>,
    /// Minimum node sizes eligible for splitting.
    pub min_samples_split: Vec<usize>,
    /// Minimum child sizes.
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![50, 100, 200],
            max_depth: vec![Some(10), Some(20), Some(30), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ParamGrid {
    /// Number of distinct combinations.
    #[must_use]
    pub fn n_combinations(&self) -> usize {
        self.n_trees.len() * self.max_depth.len() * self.min_samples_split.len() * self.min_samples_leaf.len()
    }

    fn validate(&self) -> Result<(), RfError> {
        let axes = [
            ("n_trees", self.n_trees.len()),
            ("max_depth", self.max_depth.len()),
            ("min_samples_split", self.min_samples_split.len()),
            ("min_samples_leaf", self.min_samples_leaf.len()),
        ];
        match axes.iter().find(|(_, len)| *len == 0) {
            Some(&(axis, _)) => Err(RfError::EmptyParamGrid { axis }),
            None => Ok(()),
        }
    }

    /// Decode a flat index in `0..n_combinations()` as mixed-radix digits.
    fn combination(&self, mut flat: usize) -> ParamSet {
        let mut digit = |len: usize| {
            let d = flat % len;
            flat /= len;
            d
        };
        let leaf = digit(self.min_samples_leaf.len());
        let split = digit(self.min_samples_split.len());
        let depth = digit(self.max_depth.len());
        let trees = digit(self.n_trees.len());
        ParamSet {
            n_trees: self.n_trees[trees],
            max_depth: self.max_depth[depth],
            min_samples_split: self.min_samples_split[split],
            min_samples_leaf: self.min_samples_leaf[leaf],
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSet {
    /// Forest size.
    pub n_trees: usize,
    /// Depth limit.
    pub max_depth: Option<usize>,
    /// Minimum node size eligible for splitting.
    pub min_samples_split: usize,
    /// Minimum child size.
    pub min_samples_leaf: usize,
}

impl ParamSet {
    /// Overlay these values onto `base`, keeping its other settings.
    #[must_use]
    pub fn apply(&self, base: &RandomForestConfig) -> RandomForestConfig {
        RandomForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            ..base.clone()
        }
    }
}

/// Cross-validated score of one sampled combination.
#[derive(Debug, Clone, Serialize)]
pub struct Trial {
    /// Values tried.
    pub params: ParamSet,
    /// Mean held-out accuracy.
    pub mean_accuracy: f64,
    /// Standard deviation of fold accuracies.
    pub std_accuracy: f64,
}

/// Outcome of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Highest scoring combination; the earliest trial wins ties.
    pub best_params: ParamSet,
    /// Its mean held-out accuracy.
    pub best_score: f64,
    /// Every trial in sampling order.
    pub trials: Vec<Trial>,
}

/// Randomized search over a [`ParamGrid`].
#[derive(Debug, Clone)]
pub struct RandomSearch {
    grid: ParamGrid,
    n_iter: usize,
    n_folds: usize,
    seed: u64,
}

impl RandomSearch {
    /// Sample `n_iter` distinct combinations of `grid`, 3-fold CV, seed 42.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::InvalidIterationCount`] | `n_iter` is zero |
    /// | [`RfError::EmptyParamGrid`] | an axis has no values |
    pub fn new(grid: ParamGrid, n_iter: usize) -> Result<Self, RfError> {
        if n_iter == 0 {
            return Err(RfError::InvalidIterationCount { n_iter });
        }
        grid.validate()?;
        Ok(Self {
            grid,
            n_iter,
            n_folds: 3,
            seed: 42,
        })
    }

    // --- Setters ---

    /// Set the fold count used to score each trial.
    #[must_use]
    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Set the sampling and fold seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the grid.
    #[must_use]
    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Return the requested iteration count.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Score the sampled combinations and keep the best.
    ///
    /// Never samples more than the grid holds.
    ///
    /// # Errors
    ///
    /// Any [`RfError`] from cross-validation.
    #[instrument(skip_all, fields(n_iter = self.n_iter, n_folds = self.n_folds))]
    pub fn run(
        &self,
        base: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<SearchResult, RfError> {
        let cv = CrossValidation::new(self.n_folds)?.with_seed(self.seed);
        let total = self.grid.n_combinations();
        let amount = self.n_iter.min(total);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let picks = index::sample(&mut rng, total, amount);

        let mut trials = Vec::with_capacity(amount);
        for flat in picks.iter() {
            let params = self.grid.combination(flat);
            let config = params.apply(base);
            let scored = cv.evaluate(&config, features, labels, feature_names)?;
            info!(
                n_trees = params.n_trees,
                max_depth = ?params.max_depth,
                min_samples_split = params.min_samples_split,
                min_samples_leaf = params.min_samples_leaf,
                mean_accuracy = scored.mean_accuracy,
                "search trial scored"
            );
            trials.push(Trial {
                params,
                mean_accuracy: scored.mean_accuracy,
                std_accuracy: scored.std_accuracy,
            });
        }

        let best = trials
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.mean_accuracy.total_cmp(&b.1.mean_accuracy).then(b.0.cmp(&a.0)))
            .map(|(_, t)| t.clone())
            .ok_or(RfError::InvalidIterationCount { n_iter: 0 })?;

        info!(best_score = best.mean_accuracy, "random search complete");

        Ok(SearchResult {
            best_params: best.params,
            best_score: best.mean_accuracy,
            trials,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn small_grid() -> ParamGrid {
        ParamGrid {
            n_trees: vec![5, 10],
            max_depth: vec![Some(3), None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1, 2],
        }
    }

    #[test]
    fn combinations_cover_grid_exactly_once() {
        let grid = small_grid();
        let all: HashSet<_> = (0..grid.n_combinations())
            .map(|i| {
                let p = grid.combination(i);
                (p.n_trees, p.max_depth, p.min_samples_split, p.min_samples_leaf)
            })
            .collect();
        assert_eq!(all.len(), 8);
        assert_eq!(ParamGrid::default().n_combinations(), 108);
    }

    #[test]
    fn apply_keeps_other_settings() {
        let base = RandomForestConfig::new(1).unwrap().with_seed(9);
        let params = ParamSet {
            n_trees: 30,
            max_depth: Some(4),
            min_samples_split: 5,
            min_samples_leaf: 2,
        };
        let config = params.apply(&base);
        assert_eq!(config.n_trees, 30);
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn rejects_bad_setup() {
        assert!(matches!(
            RandomSearch::new(ParamGrid::default(), 0).unwrap_err(),
            RfError::InvalidIterationCount { n_iter: 0 }
        ));
        let mut grid = small_grid();
        grid.min_samples_split.clear();
        assert!(matches!(
            RandomSearch::new(grid, 3).unwrap_err(),
            RfError::EmptyParamGrid { axis: "min_samples_split" }
        ));
    }

    #[test]
    fn search_caps_trials_at_grid_size() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..24 {
            features.push(vec![f64::from(i), f64::from(i % 4)]);
            labels.push(usize::from(i >= 12));
        }
        let names = vec!["temperature".to_string(), "ph".to_string()];
        let search = RandomSearch::new(small_grid(), 50).unwrap();
        let base = RandomForestConfig::new(1).unwrap();
        let result = search.run(&base, &features, &labels, &names).unwrap();
        assert_eq!(result.trials.len(), 8);
        assert!(result.best_score > 0.8);
        assert!(result.trials.iter().all(|t| t.mean_accuracy <= result.best_score));
    }
}
