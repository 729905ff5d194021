//! Feature importance aggregation across trees.

use serde::{Deserialize, Serialize};

/// A feature with its normalized importance and 1-based rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedFeature {
    /// Column name.
    pub name: String,
    /// Importance; all features sum to 1.0 unless every tree is a stump leaf.
    pub importance: f64,
    /// 1 is most important.
    pub rank: usize,
}

/// Column-wise sum of per-tree importances, normalized to 1.
pub(crate) fn sum_normalized(per_tree: &[Vec<f64>], n_features: usize) -> Vec<f64> {
    let mut totals = vec![0.0f64; n_features];
    for tree in per_tree {
        for (total, value) in totals.iter_mut().zip(tree) {
            *total += value;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }
    totals
}

/// Rank `names` by their summed, normalized importance across `per_tree`.
pub(crate) fn aggregate_importances(per_tree: &[Vec<f64>], names: &[String]) -> Vec<RankedFeature> {
    if per_tree.is_empty() || names.is_empty() {
        return Vec::new();
    }
    rank(names, &sum_normalized(per_tree, names.len()))
}

/// Pair names with scores, sort descending and assign ranks.
pub fn rank(names: &[String], scores: &[f64]) -> Vec<RankedFeature> {
    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(scores)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
            rank: 0,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, feature) in ranked.iter_mut().enumerate() {
        feature.rank = i + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::aggregate_importances;

    #[test]
    fn sums_normalizes_and_ranks() {
        let names = vec!["N".to_string(), "P".to_string(), "K".to_string()];
        let per_tree = vec![vec![0.2, 0.8, 0.0], vec![0.6, 0.4, 0.0]];
        let ranked = aggregate_importances(&per_tree, &names);
        assert_eq!(ranked[0].name, "P");
        assert!((ranked[0].importance - 0.6).abs() < 1e-12);
        assert_eq!(ranked[2].name, "K");
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn empty_inputs_give_empty_ranking() {
        assert!(aggregate_importances(&[], &["N".to_string()]).is_empty());
    }
}
