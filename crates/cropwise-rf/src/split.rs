use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::histogram::{FeatureBins, find_histogram_split};
use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: `1 - Σ p_i²`.
    Gini,
    /// Shannon entropy: `-Σ p_i ln p_i`.
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node with the given class counts. Empty nodes are pure.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let proportions = class_counts.iter().filter(|&&c| c > 0).map(|&c| c as f64 / n);
        let value = match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// How candidate thresholds are generated at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Sort each candidate feature and scan every boundary (classic CART).
    Exact,
    /// Draw one uniform threshold per candidate feature (extremely randomized trees).
    ExtraTrees,
    /// Scan quantile bin boundaries computed once per tree.
    Histogram {
        /// Bins per feature.
        n_bins: usize,
    },
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Everything a split search needs to know about the node being split.
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
pub(crate) struct NodeSamples<'a> {
    pub(crate) features: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    pub(crate) indices: &'a [usize],
    pub(crate) n_classes: usize,
}

impl NodeSamples<'_> {
    pub(crate) fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &si in self.indices {
            counts[self.labels[si]] += 1;
        }
        counts
    }
}

/// Pick `max_features` distinct columns with a partial Fisher-Yates shuffle.
pub(crate) fn choose_features(n_features: usize, max_features: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        order.swap(i, j);
    }
    order.truncate(take);
    order
}

/// Weighted impurity decrease of a candidate split (scikit-learn's MDI form).
pub(crate) fn weighted_decrease(
    criterion: &SplitCriterion,
    parent: Impurity,
    n_samples: usize,
    left_counts: &[usize],
    n_left: usize,
    right_counts: &[usize],
    n_right: usize,
) -> f64 {
    n_samples as f64 * parent.value()
        - n_left as f64 * criterion.impurity(left_counts, n_left).value()
        - n_right as f64 * criterion.impurity(right_counts, n_right).value()
}

/// Send each sample left or right of `threshold` on `feature`.
pub(crate) fn partition(node: &NodeSamples<'_>, feature: FeatureIndex, threshold: f64) -> (Vec<usize>, Vec<usize>) {
    let column = &node.features[feature.index()];
    node.indices.iter().copied().partition(|&si| column[si] <= threshold)
}

/// Dispatch to the split search selected by `method`.
///
/// `bins` must be `Some` for [`SplitMethod::Histogram`]; without it the
/// search falls back to exact scanning.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_split_with_bins(
    node: &NodeSamples<'_>,
    criterion: &SplitCriterion,
    method: &SplitMethod,
    bins: Option<&FeatureBins>,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    match (method, bins) {
        (SplitMethod::ExtraTrees, _) => {
            find_random_split(node, criterion, max_features, min_samples_leaf, rng)
        }
        (SplitMethod::Histogram { .. }, Some(bins)) => {
            find_histogram_split(node, criterion, bins, max_features, min_samples_leaf, rng)
        }
        _ => find_best_split(node, criterion, max_features, min_samples_leaf, rng),
    }
}

/// Exact CART search over a random subset of features.
///
/// Each candidate column is sorted and scanned left to right with
/// incremental class counts; thresholds sit halfway between adjacent
/// distinct values. Returns `None` when every candidate is constant or
/// violates `min_samples_leaf`.
pub(crate) fn find_best_split(
    node: &NodeSamples<'_>,
    criterion: &SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_samples = node.indices.len();
    if n_samples < 2 || node.features.is_empty() {
        return None;
    }

    let parent_counts = node.class_counts();
    let parent_impurity = criterion.impurity(&parent_counts, n_samples);

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for feat_idx in choose_features(node.features.len(), max_features, rng) {
        let column = &node.features[feat_idx];
        let mut sorted: Vec<(f64, usize)> = node.indices.iter().map(|&si| (column[si], node.labels[si])).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; node.n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..n_samples - 1 {
            let (value, class) = sorted[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next_value = sorted[i + 1].0;
            if value == next_value {
                continue;
            }
            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = weighted_decrease(
                criterion,
                parent_impurity,
                n_samples,
                &left_counts,
                n_left,
                &right_counts,
                n_right,
            );
            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((FeatureIndex::new(feat_idx), (value + next_value) / 2.0));
            }
        }
    }

    let (feature, threshold) = best?;
    let (left_indices, right_indices) = partition(node, feature, threshold);
    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}

/// Extremely randomized split: one uniform threshold per candidate feature,
/// keep the best of those.
pub(crate) fn find_random_split(
    node: &NodeSamples<'_>,
    criterion: &SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_samples = node.indices.len();
    if n_samples < 2 || node.features.is_empty() {
        return None;
    }

    let parent_counts = node.class_counts();
    let parent_impurity = criterion.impurity(&parent_counts, n_samples);

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for feat_idx in choose_features(node.features.len(), max_features, rng) {
        let column = &node.features[feat_idx];
        let (lo, hi) = node
            .indices
            .iter()
            .map(|&si| column[si])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo >= hi {
            continue;
        }
        let threshold = rng.gen_range(lo..hi);

        let mut left_counts = vec![0usize; node.n_classes];
        let mut n_left = 0usize;
        for &si in node.indices {
            if column[si] <= threshold {
                left_counts[node.labels[si]] += 1;
                n_left += 1;
            }
        }
        let n_right = n_samples - n_left;
        if n_left < min_samples_leaf.max(1) || n_right < min_samples_leaf.max(1) {
            continue;
        }
        let right_counts: Vec<usize> = parent_counts.iter().zip(&left_counts).map(|(p, l)| p - l).collect();

        let decrease = weighted_decrease(
            criterion,
            parent_impurity,
            n_samples,
            &left_counts,
            n_left,
            &right_counts,
            n_right,
        );
        if decrease > best_decrease {
            best_decrease = decrease;
            best = Some((FeatureIndex::new(feat_idx), threshold));
        }
    }

    let (feature, threshold) = best?;
    let (left_indices, right_indices) = partition(node, feature, threshold);
    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
