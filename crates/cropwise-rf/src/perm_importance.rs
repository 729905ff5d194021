//! Permutation feature importance on out-of-bag samples.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// Accuracy drop when one column is shuffled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationImportance {
    /// Column name.
    pub name: String,
    /// Mean accuracy drop across trees.
    pub importance: f64,
    /// Population standard deviation of the drop across trees.
    pub std: f64,
    /// 1 is most important.
    pub rank: usize,
}

fn tree_accuracy(tree: &DecisionTree, rows: &[Vec<f64>], labels: &[usize]) -> f64 {
    let correct = rows
        .iter()
        .zip(labels)
        .filter(|(row, label)| tree.predict(row).is_ok_and(|p| p == **label))
        .count();
    correct as f64 / rows.len() as f64
}

/// Per-tree, per-feature accuracy drops; trees without OOB samples are skipped.
fn tree_drops(tree: &DecisionTree, features: &[Vec<f64>], labels: &[usize], oob: &[usize], seed: u64) -> Vec<f64> {
    let rows: Vec<Vec<f64>> = oob.iter().map(|&i| features[i].clone()).collect();
    let truth: Vec<usize> = oob.iter().map(|&i| labels[i]).collect();
    let baseline = tree_accuracy(tree, &rows, &truth);
    let n_features = tree.n_features;

    (0..n_features)
        .map(|feature| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(feature as u64));
            let mut column: Vec<f64> = rows.iter().map(|r| r[feature]).collect();
            column.shuffle(&mut rng);
            let permuted: Vec<Vec<f64>> = rows
                .iter()
                .zip(&column)
                .map(|(row, &v)| {
                    let mut row = row.clone();
                    row[feature] = v;
                    row
                })
                .collect();
            baseline - tree_accuracy(tree, &permuted, &truth)
        })
        .collect()
}

pub(crate) fn compute_permutation_importance(
    forest: &RandomForest,
    features: &[Vec<f64>],
    labels: &[usize],
    oob_indices_per_tree: &[Vec<usize>],
    seed: u64,
) -> Vec<PermutationImportance> {
    let n_features = forest.n_features;
    let drops: Vec<Vec<f64>> = forest
        .trees
        .par_iter()
        .zip(oob_indices_per_tree.par_iter())
        .enumerate()
        .filter(|(_, (_, oob))| !oob.is_empty())
        .map(|(t, (tree, oob))| {
            let tree_seed = seed.wrapping_add((t as u64).wrapping_mul(n_features as u64));
            tree_drops(tree, features, labels, oob, tree_seed)
        })
        .collect();

    let n_trees = drops.len().max(1) as f64;
    let mut results: Vec<PermutationImportance> = forest
        .feature_names
        .iter()
        .enumerate()
        .map(|(f, name)| {
            let mean = drops.iter().map(|d| d[f]).sum::<f64>() / n_trees;
            let variance = drops.iter().map(|d| (d[f] - mean).powi(2)).sum::<f64>() / n_trees;
            PermutationImportance {
                name: name.clone(),
                importance: mean,
                std: variance.sqrt(),
                rank: 0,
            }
        })
        .collect();

    results.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    results
}
