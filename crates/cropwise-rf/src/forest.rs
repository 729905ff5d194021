//! Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::oob::compute_oob;
use crate::result::RandomForestResult;
use crate::tree::{DecisionTree, DecisionTreeConfig, validate_matrix};

/// A fitted random forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Draw `draw_count` indices with replacement; return them with the indices never drawn.
fn bootstrap_sample(n_samples: usize, draw_count: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let drawn: Vec<usize> = (0..draw_count)
        .map(|_| {
            let idx = rng.gen_range(0..n_samples);
            in_bag[idx] = true;
            idx
        })
        .collect();
    let out_of_bag = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (drawn, out_of_bag)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_matrix(features, labels)?;
    let n_samples = features.len();
    let max_features = config.max_features.resolve(n_features)?;

    if !(config.bootstrap_fraction > 0.0 && config.bootstrap_fraction <= 1.0) {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_classes = labels.iter().max().map_or(1, |&m| m + 1);
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features,
        split_method = ?config.split_method,
        "training random forest"
    );

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_split_method(config.split_method)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features))
        .with_n_classes(Some(n_classes));

    let mut master = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master.r#gen()).collect();

    let grown: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (drawn, out_of_bag) = bootstrap_sample(n_samples, draw_count, &mut rng);
            let bag_features: Vec<Vec<f64>> = drawn.iter().map(|&i| features[i].clone()).collect();
            let bag_labels: Vec<usize> = drawn.iter().map(|&i| labels[i]).collect();
            let tree = tree_config
                .clone()
                .with_seed(rng.r#gen())
                .fit(&bag_features, &bag_labels)?;
            Ok((tree, out_of_bag))
        })
        .collect::<Result<_, RfError>>()?;

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) = grown.into_iter().unzip();
    debug!(n_trees_trained = trees.len(), "tree training complete");

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, features, labels, n_classes, &oob_indices_per_tree)?),
        OobMode::Disabled => None,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        feature_names: feature_names.to_vec(),
    };
    Ok(RandomForestResult::new(forest, importances, oob_score, oob_indices_per_tree))
}

#[cfg(test)]
mod tests {
    use crate::config::{MaxFeatures, OobMode, RandomForestConfig};
    use crate::split::SplitMethod;

    /// Three crops separated by rainfall, with a constant pH column.
    fn rainfall_bands() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, base) in [40.0, 120.0, 220.0].into_iter().enumerate() {
            for i in 0..20 {
                features.push(vec![base + f64::from(i) * 1.5, 6.5]);
                labels.push(class);
            }
        }
        (features, labels, vec!["rainfall".into(), "ph".into()])
    }

    fn accuracy(predicted: &[usize], labels: &[usize]) -> f64 {
        let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
        correct as f64 / labels.len() as f64
    }

    #[test]
    fn fits_every_split_method() {
        let (features, labels, names) = rainfall_bands();
        for method in [SplitMethod::Exact, SplitMethod::ExtraTrees, SplitMethod::Histogram { n_bins: 32 }] {
            let result = RandomForestConfig::new(30)
                .unwrap()
                .with_max_features(MaxFeatures::All)
                .with_split_method(method)
                .fit(&features, &labels, &names)
                .unwrap();
            let predicted = result.forest().predict_batch(&features).unwrap();
            assert!(accuracy(&predicted, &labels) > 0.9, "{method:?}");
        }
    }

    #[test]
    fn oob_score_reported_when_enabled() {
        let (features, labels, names) = rainfall_bands();
        let result = RandomForestConfig::new(40)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .fit(&features, &labels, &names)
            .unwrap();
        let oob = result.oob_score().expect("oob enabled");
        assert!(oob.accuracy > 0.8, "oob accuracy = {}", oob.accuracy);
        assert!(oob.n_oob_samples > 0);
    }

    #[test]
    fn informative_column_ranked_first() {
        let (features, labels, names) = rainfall_bands();
        let result = RandomForestConfig::new(20).unwrap().fit(&features, &labels, &names).unwrap();
        let total: f64 = result.importances().iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10);
        assert_eq!(result.importances()[0].name, "rainfall");
        assert_eq!(result.importances()[0].rank, 1);
    }

    #[test]
    fn same_seed_same_forest() {
        let (features, labels, names) = rainfall_bands();
        let fit = |seed| {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(seed)
                .fit(&features, &labels, &names)
                .unwrap()
                .into_forest()
        };
        let (a, b) = (fit(99), fit(99));
        let pa = a.predict_proba_batch(&features).unwrap();
        let pb = b.predict_proba_batch(&features).unwrap();
        for (x, y) in pa.iter().zip(&pb) {
            assert_eq!(x.as_slice(), y.as_slice());
        }
    }

    #[test]
    fn invalid_inputs_rejected() {
        let config = RandomForestConfig::new(5).unwrap();
        assert!(matches!(config.fit(&[], &[], &[]).unwrap_err(), crate::RfError::EmptyDataset));
        let bad_fraction = config.clone().with_bootstrap_fraction(0.0);
        let (features, labels, names) = rainfall_bands();
        assert!(matches!(
            bad_fraction.fit(&features, &labels, &names).unwrap_err(),
            crate::RfError::InvalidBootstrapFraction { .. }
        ));
    }
}
