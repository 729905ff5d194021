use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::RfError;
use crate::histogram::FeatureBins;
use crate::node::{Node, NodeIndex};
use crate::split::{NodeSamples, SplitCriterion, SplitMethod, find_split_with_bins};

/// Configuration for a single CART decision tree.
///
/// # Defaults
///
/// | Parameter           | Default                   |
/// |---------------------|---------------------------|
/// | `criterion`         | `Gini`                    |
/// | `split_method`      | `Exact`                   |
/// | `max_depth`         | `None` (unlimited)        |
/// | `min_samples_split` | 2                         |
/// | `min_samples_leaf`  | 1                         |
/// | `max_features`      | `None` (all features)     |
/// | `n_classes`         | `None` (max label + 1)    |
/// | `seed`              | 42                        |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) n_classes: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a config with the defaults listed above.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            split_method: SplitMethod::Exact,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_classes: None,
            seed: 42,
        }
    }

    // --- Setters ---

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

    /// Limit depth; the root is depth 0.
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

    /// Set how many columns are tried per split.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fix the width of every class distribution.
    ///
    /// Forests pass their global class count so that bootstrap samples
    /// missing a rare class still produce full-width distributions.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the split-finding strategy.
    #[must_use]
    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    /// Return the depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Grow a tree on row-major `features` with zero-based `labels`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `features` is empty |
    /// | [`RfError::LabelCountMismatch`] | `labels.len() != features.len()` |
    /// | [`RfError::ZeroFeatures`] | rows have no columns |
    /// | [`RfError::FeatureCountMismatch`] | rows differ in length |
    /// | [`RfError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`RfError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`RfError::InvalidMinSamplesSplit`] | `min_samples_split < 2` |
    /// | [`RfError::InvalidMinSamplesLeaf`] | `min_samples_leaf < 1` |
    /// | [`RfError::InvalidMaxFeatures`] | `max_features` outside `[1, n_features]` |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        let n_features = validate_matrix(features, labels)?;
        self.validate()?;

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures { max_features, n_features });
        }

        let observed = labels.iter().max().map_or(1, |&m| m + 1);
        let n_classes = self.n_classes.map_or(observed, |n| n.max(observed));

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();
        let bins = match self.split_method {
            SplitMethod::Histogram { n_bins } => Some(FeatureBins::build(&columns, n_bins)),
            SplitMethod::Exact | SplitMethod::ExtraTrees => None,
        };

        let mut builder = TreeBuilder {
            columns: &columns,
            labels,
            n_classes,
            config: self,
            max_features,
            bins: bins.as_ref(),
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        let indices: Vec<usize> = (0..features.len()).collect();
        builder.grow(&indices, 0);
        let nodes = builder.arena;

        debug!(n_nodes = nodes.len(), n_classes, "decision tree built");

        Ok(DecisionTree { nodes, n_features, n_classes })
    }

    fn validate(&self) -> Result<(), RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        Ok(())
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check shape and finiteness of a row-major training matrix.
///
/// Returns the column count.
pub(crate) fn validate_matrix(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, RfError> {
    let first = features.first().ok_or(RfError::EmptyDataset)?;
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue { sample_index, feature_index });
        }
    }
    Ok(n_features)
}

struct TreeBuilder<'a> {
    columns: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    config: &'a DecisionTreeConfig,
    max_features: usize,
    bins: Option<&'a FeatureBins>,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `indices` and return its root.
    fn grow(&mut self, indices: &[usize], depth: usize) -> NodeIndex {
        let node = NodeSamples {
            features: self.columns,
            labels: self.labels,
            indices,
            n_classes: self.n_classes,
        };
        let counts = node.class_counts();
        let n_samples = indices.len();
        let impurity = self.config.criterion.impurity(&counts, n_samples);
        let distribution: Vec<f64> = counts.iter().map(|&c| c as f64 / n_samples as f64).collect();

        let stop = n_samples < self.config.min_samples_split
            || impurity.value() == 0.0
            || self.config.max_depth.is_some_and(|d| depth >= d);

        let split = if stop {
            None
        } else {
            find_split_with_bins(
                &node,
                &self.config.criterion,
                &self.config.split_method,
                self.bins,
                self.max_features,
                self.config.min_samples_leaf,
                &mut self.rng,
            )
        };

        let slot = self.arena.len();
        let Some(split) = split else {
            let prediction = counts
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                .map_or(0, |(class, _)| class);
            self.arena.push(Node::Leaf { prediction, distribution, impurity, n_samples });
            return NodeIndex::new(slot);
        };

        // Reserve the slot so children get higher indices, then fill it in.
        self.arena.push(Node::Leaf {
            prediction: 0,
            distribution: Vec::new(),
            impurity,
            n_samples,
        });
        let left = self.grow(&split.left_indices, depth + 1);
        let right = self.grow(&split.right_indices, depth + 1);
        self.arena[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            distribution,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(slot)
    }
}

/// A fitted CART decision tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class of one sample.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        self.check_width(sample)?;
        match &self.nodes[self.traverse(sample)] {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Class distribution of the leaf reached by `sample`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], RfError> {
        self.check_width(sample)?;
        Ok(self.nodes[self.traverse(sample)].distribution())
    }

    /// Arena indices visited from the root down to the leaf for `sample`.
    pub(crate) fn decision_path(&self, sample: &[f64]) -> Vec<usize> {
        let mut path = vec![0usize];
        let mut idx = 0usize;
        while let Node::Split { feature, threshold, left, right, .. } = &self.nodes[idx] {
            idx = if sample[feature.index()] <= *threshold { left.index() } else { right.index() };
            path.push(idx);
        }
        path
    }

    /// Mean decrease in impurity per feature, normalized to sum to 1.
    ///
    /// All zeros when the tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split { feature, impurity_decrease, .. } = node {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the depth of the deepest leaf; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => deepest = deepest.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        deepest
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        while let Node::Split { feature, threshold, left, right, .. } = &self.nodes[idx] {
            idx = if sample[feature.index()] <= *threshold { left.index() } else { right.index() };
        }
        idx
    }
}
