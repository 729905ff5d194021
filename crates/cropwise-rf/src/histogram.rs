//! Quantile-binned split search.
//!
//! Bin edges are computed once per tree; each node then accumulates
//! per-bin class counts in O(n) and scans the O(B) boundaries instead of
//! sorting every candidate column.

use rand::Rng;

use crate::node::FeatureIndex;
use crate::split::{NodeSamples, SplitCriterion, SplitResult, choose_features, partition, weighted_decrease};

/// Quantile bin edges for every feature column.
#[derive(Debug, Clone)]
pub(crate) struct FeatureBins {
    /// `edges[feature]` is strictly increasing and lies strictly inside the
    /// column's `(min, max)`. A constant column has no edges.
    edges: Vec<Vec<f64>>,
}

impl FeatureBins {
    /// Build edges at the `k / n_bins` quantiles of each column-major column.
    pub(crate) fn build(col_features: &[Vec<f64>], n_bins: usize) -> Self {
        let n_bins = n_bins.max(2);
        let edges = col_features
            .iter()
            .map(|column| {
                let mut sorted = column.clone();
                sorted.sort_unstable_by(|a, b| a.total_cmp(b));
                let Some((&lo, &hi)) = sorted.first().zip(sorted.last()) else {
                    return Vec::new();
                };
                if lo == hi {
                    return Vec::new();
                }
                let last = sorted.len() - 1;
                let mut edges: Vec<f64> = (1..n_bins)
                    .map(|k| {
                        let pos = k as f64 / n_bins as f64 * last as f64;
                        let below = pos.floor() as usize;
                        let above = (below + 1).min(last);
                        sorted[below] + (pos - below as f64) * (sorted[above] - sorted[below])
                    })
                    .collect();
                edges.dedup();
                edges.retain(|&e| e > lo && e < hi);
                edges
            })
            .collect();
        Self { edges }
    }

    /// Bin of `value` in `feature`: the number of edges strictly below it.
    pub(crate) fn bin_index(&self, feature: usize, value: f64) -> usize {
        self.edges[feature].partition_point(|&e| e < value)
    }

    /// Number of bins for `feature`, zero for a constant column.
    pub(crate) fn n_bins_for_feature(&self, feature: usize) -> usize {
        match self.edges[feature].len() {
            0 => 0,
            n => n + 1,
        }
    }

    pub(crate) fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }
}

/// Best split among the bin boundaries of `max_features` random columns.
pub(crate) fn find_histogram_split(
    node: &NodeSamples<'_>,
    criterion: &SplitCriterion,
    bins: &FeatureBins,
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
        let n_bins = bins.n_bins_for_feature(feat_idx);
        if n_bins == 0 {
            continue;
        }

        let column = &node.features[feat_idx];
        let mut bin_counts = vec![vec![0usize; node.n_classes]; n_bins];
        for &si in node.indices {
            let bin = bins.bin_index(feat_idx, column[si]).min(n_bins - 1);
            bin_counts[bin][node.labels[si]] += 1;
        }

        // Boundary b sends bins 0..=b left.
        let mut left_counts = vec![0usize; node.n_classes];
        let mut right_counts = parent_counts.clone();
        let mut n_left = 0usize;

        for (boundary, counts) in bin_counts.iter().enumerate().take(n_bins - 1) {
            for (class, &c) in counts.iter().enumerate() {
                left_counts[class] += c;
                right_counts[class] -= c;
                n_left += c;
            }
            let n_right = n_samples - n_left;
            if n_left == 0 || n_right == 0 || n_left < min_samples_leaf || n_right < min_samples_leaf {
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
                best = Some((FeatureIndex::new(feat_idx), bins.threshold(feat_idx, boundary)));
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
