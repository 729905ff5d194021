//! Accuracy regression tests on a deterministic synthetic crop dataset.
//!
//! Algorithmic changes to splitting, bagging or search must not drop
//! accuracy below these floors.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use cropwise_rf::{CrossValidation, OobMode, ParamGrid, RandomForestConfig, RandomSearch, SplitMethod};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic dataset
// ---------------------------------------------------------------------------

/// 4 classes x 60 rows. Columns 0-2 (nitrogen, humidity, rainfall) carry the
/// class; columns 3-5 are uniform noise.
fn make_crops() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let centres = [[20.0, 30.0, 60.0], [60.0, 55.0, 120.0], [100.0, 75.0, 180.0], [130.0, 92.0, 260.0]];
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (class, centre) in centres.iter().enumerate() {
        for _ in 0..60 {
            let mut row: Vec<f64> = centre.iter().map(|c| c + rng.gen_range(-8.0..8.0)).collect();
            row.extend((0..3).map(|_| rng.gen_range(0.0..100.0)));
            features.push(row);
            labels.push(class);
        }
    }
    let names = ["N", "humidity", "rainfall", "noise_a", "noise_b", "noise_c"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    (features, labels, names)
}

#[test]
fn cv_accuracy_above_threshold() {
    let (features, labels, names) = make_crops();
    let config = RandomForestConfig::new(60).unwrap();
    let result = CrossValidation::new(5)
        .unwrap()
        .evaluate(&config, &features, &labels, &names)
        .unwrap();
    assert!(result.mean_accuracy > 0.9, "cv mean_accuracy {}", result.mean_accuracy);
    assert!(result.mean_f1_macro > 0.9, "cv mean_f1_macro {}", result.mean_f1_macro);
}

#[test]
fn every_split_method_above_threshold() {
    let (features, labels, names) = make_crops();
    for method in [SplitMethod::Exact, SplitMethod::ExtraTrees, SplitMethod::Histogram { n_bins: 32 }] {
        let config = RandomForestConfig::new(40).unwrap().with_split_method(method);
        let result = CrossValidation::new(3)
            .unwrap()
            .evaluate(&config, &features, &labels, &names)
            .unwrap();
        assert!(result.mean_accuracy > 0.85, "{method:?}: {}", result.mean_accuracy);
    }
}

#[test]
fn oob_accuracy_above_threshold() {
    let (features, labels, names) = make_crops();
    let result = RandomForestConfig::new(80)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .fit(&features, &labels, &names)
        .unwrap();
    let oob = result.oob_score().expect("OOB score computed when enabled");
    assert!(oob.accuracy > 0.85, "oob_accuracy {}", oob.accuracy);
}

#[test]
fn noise_columns_rank_last() {
    let (features, labels, names) = make_crops();
    let result = RandomForestConfig::new(80).unwrap().fit(&features, &labels, &names).unwrap();
    let top3: Vec<&str> = result.importances().iter().take(3).map(|f| f.name.as_str()).collect();
    let informative = top3.iter().filter(|n| !n.starts_with("noise")).count();
    assert!(informative >= 2, "top-3: {top3:?}");

    let perm = result.permutation_importances(&features, &labels, 42);
    let best = perm
        .iter()
        .max_by(|a, b| a.importance.total_cmp(&b.importance))
        .expect("one entry per column");
    assert!(!best.name.starts_with("noise"), "best permutation feature {}", best.name);
}

#[test]
fn random_search_finds_strong_params() {
    let (features, labels, names) = make_crops();
    let grid = ParamGrid {
        n_trees: vec![10, 30],
        max_depth: vec![Some(2), None],
        min_samples_split: vec![2],
        min_samples_leaf: vec![1],
    };
    let result = RandomSearch::new(grid, 4)
        .unwrap()
        .run(&RandomForestConfig::new(1).unwrap(), &features, &labels, &names)
        .unwrap();
    assert_eq!(result.trials.len(), 4);
    assert!(result.best_score > 0.9, "best_score {}", result.best_score);
}
