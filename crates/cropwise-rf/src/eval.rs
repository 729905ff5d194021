//! Stratified k-fold cross-validation.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::importance::{RankedFeature, aggregate_importances};

/// Cross-validation settings.
///
/// Construct via [`CrossValidation::new`], then chain setters.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
    train_scores: bool,
}

/// Scores gathered over all folds.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Held-out accuracy per fold.
    pub fold_accuracies: Vec<f64>,
    /// Held-out macro F1 per fold.
    pub fold_f1_macro: Vec<f64>,
    /// Accuracy on each fold's own training rows; empty unless requested.
    pub train_accuracies: Vec<f64>,
    /// Mean held-out accuracy.
    pub mean_accuracy: f64,
    /// Population standard deviation of the fold accuracies.
    pub std_accuracy: f64,
    /// Mean held-out macro F1.
    pub mean_f1_macro: f64,
    /// Mean training accuracy, `None` unless requested.
    pub mean_train_accuracy: Option<f64>,
    /// Held-out predictions of every fold, summed.
    pub confusion_matrix: ConfusionMatrix,
    /// MDI importances pooled over every fold's trees.
    pub feature_importances: Vec<RankedFeature>,
    /// Folds run.
    pub n_folds: usize,
    /// Total rows.
    pub n_samples: usize,
    /// Columns per row.
    pub n_features: usize,
    /// Distinct classes.
    pub n_classes: usize,
}

impl CrossValidation {
    /// Create a config for `n_folds` folds, seed 42, without train scores.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds < 2`.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self {
            n_folds,
            seed: 42,
            train_scores: false,
        })
    }

    /// Set the seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Also score each fold's model on its own training rows.
    #[must_use]
    pub fn with_train_scores(mut self, train_scores: bool) -> Self {
        self.train_scores = train_scores;
        self
    }

    /// Return the fold count.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run stratified k-fold cross-validation of `config`.
    ///
    /// Fold `k` trains with seed `config.seed + k`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | zero samples |
    /// | [`RfError::TooFewSamplesForFolds`] | a class has fewer samples than folds |
    /// | other variants | from training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        let n_features = crate::tree::validate_matrix(features, labels)?;
        let n_samples = features.len();
        let n_classes = labels.iter().max().map_or(1, |&m| m + 1);

        let assignments = stratified_folds(labels, self.n_folds, self.seed)?;

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);
        let mut fold_f1_macro = Vec::with_capacity(self.n_folds);
        let mut train_accuracies = Vec::new();
        let mut all_true = Vec::with_capacity(n_samples);
        let mut all_predicted = Vec::with_capacity(n_samples);
        let mut all_importances: Vec<Vec<f64>> = Vec::new();

        for fold in 0..self.n_folds {
            let (train_idx, test_idx): (Vec<usize>, Vec<usize>) =
                (0..n_samples).partition(|&i| assignments[i] != fold);
            let train_features: Vec<Vec<f64>> = train_idx.iter().map(|&i| features[i].clone()).collect();
            let train_labels: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
            let test_features: Vec<Vec<f64>> = test_idx.iter().map(|&i| features[i].clone()).collect();
            let test_labels: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();

            let fold_config = config.clone().with_seed(config.seed.wrapping_add(fold as u64));
            let result = fold_config.fit(&train_features, &train_labels, feature_names)?;
            let forest = result.forest();

            let predictions = forest.predict_batch(&test_features)?;
            let fold_cm = ConfusionMatrix::from_labels(&test_labels, &predictions, n_classes)?;
            let accuracy = fold_cm.accuracy();
            let f1_macro = fold_cm.macro_avg().f1;
            fold_accuracies.push(accuracy);
            fold_f1_macro.push(f1_macro);

            if self.train_scores {
                let fitted = forest.predict_batch(&train_features)?;
                let train_accuracy = ConfusionMatrix::from_labels(&train_labels, &fitted, n_classes)?.accuracy();
                debug!(fold, train_accuracy, "fold train score");
                train_accuracies.push(train_accuracy);
            }

            info!(fold, accuracy, f1_macro, "fold completed");

            all_true.extend_from_slice(&test_labels);
            all_predicted.extend_from_slice(&predictions);
            all_importances.extend(forest.trees.iter().map(|t| t.feature_importances()));
        }

        let (mean_accuracy, std_accuracy) = mean_std(&fold_accuracies);
        let (mean_f1_macro, _) = mean_std(&fold_f1_macro);
        let mean_train_accuracy = self.train_scores.then(|| mean_std(&train_accuracies).0);

        let confusion_matrix = ConfusionMatrix::from_labels(&all_true, &all_predicted, n_classes)?;
        let feature_importances = aggregate_importances(&all_importances, feature_names);

        info!(mean_accuracy, std_accuracy, mean_f1_macro, "cross-validation complete");

        Ok(CrossValidationResult {
            fold_accuracies,
            fold_f1_macro,
            train_accuracies,
            mean_accuracy,
            std_accuracy,
            mean_f1_macro,
            mean_train_accuracy,
            confusion_matrix,
            feature_importances,
            n_folds: self.n_folds,
            n_samples,
            n_features,
            n_classes,
        })
    }
}

/// Mean and population standard deviation; `(0.0, 0.0)` for an empty slice.
#[must_use]
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Assign every sample a fold in `0..n_folds` with per-class balance.
///
/// Indices of each class are shuffled, then dealt round-robin, so fold
/// sizes per class differ by at most one.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::InvalidFoldCount`] | `n_folds < 2` |
/// | [`RfError::TooFewSamplesForFolds`] | a present class has fewer than `n_folds` samples |
pub fn stratified_folds(labels: &[usize], n_folds: usize, seed: u64) -> Result<Vec<usize>, RfError> {
    if n_folds < 2 {
        return Err(RfError::InvalidFoldCount { n_folds });
    }
    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    for (class, indices) in by_class.iter().enumerate() {
        if !indices.is_empty() && indices.len() < n_folds {
            return Err(RfError::TooFewSamplesForFolds {
                class,
                count: indices.len(),
                n_folds,
            });
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut assignments = vec![0usize; labels.len()];
    for indices in &mut by_class {
        indices.shuffle(&mut rng);
        for (pos, &sample) in indices.iter().enumerate() {
            assignments[sample] = pos % n_folds;
        }
    }
    Ok(assignments)
}
