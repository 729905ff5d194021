//! Tuning, cross-validation and hold-out evaluation of the forest.

use std::collections::BTreeMap;

use cropwise_features::{LabelEncoder, StandardScaler, feature_names};
use cropwise_io::{
    BestParams, ClassReportEntry, ClassificationReport, ConfusionMatrixReport, CropDataset, CropModel, CvMetrics,
    FeatureImportanceEntry, MaturityReport,
};
use cropwise_rf::{AveragedMetrics, ConfusionMatrix, CrossValidation, ParamGrid, RandomForestConfig, RandomSearch};
use tracing::{info, instrument, warn};

use crate::MlError;
use crate::split::{stratified_train_test_split, take_rows};

/// Train/test gap above which the report flags overfitting.
const OVERFITTING_GAP: f64 = 0.05;

/// Settings for [`run_maturity_evaluation`].
///
/// # Defaults
///
/// | Parameter       | Default                 |
/// |-----------------|-------------------------|
/// | `grid`          | [`ParamGrid::default`]  |
/// | `n_iter`        | 10                      |
/// | `search_folds`  | 3                       |
/// | `cv_folds`      | 5                       |
/// | `test_fraction` | 0.2                     |
/// | `seed`          | 42                      |
#[derive(Debug, Clone)]
pub struct MaturityOptions {
    grid: ParamGrid,
    n_iter: usize,
    search_folds: usize,
    cv_folds: usize,
    test_fraction: f64,
    seed: u64,
}

impl Default for MaturityOptions {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            n_iter: 10,
            search_folds: 3,
            cv_folds: 5,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl MaturityOptions {
    // --- Setters ---

    /// Replace the search grid.
    #[must_use]
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Set how many grid points the search samples.
    #[must_use]
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Set the fold count used inside the search.
    #[must_use]
    pub fn with_search_folds(mut self, search_folds: usize) -> Self {
        self.search_folds = search_folds;
        self
    }

    /// Set the fold count of the final cross-validation.
    #[must_use]
    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    /// Set the hold-out share.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the seed for splitting, searching and training.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the search grid.
    #[must_use]
    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Return the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// The report plus the tuned model, refit on the training split.
#[derive(Debug)]
pub struct MaturityOutcome {
    /// JSON-ready report.
    pub report: MaturityReport,
    /// Tuned forest and its labels.
    pub model: CropModel,
    /// Scaler fit on the training split.
    pub scaler: StandardScaler,
}

/// Search hyperparameters, cross-validate the winner and score it on a
/// stratified hold-out split.
///
/// 1. Stratified split; the scaler is fit on the training side only.
/// 2. Random search over the grid, scored by k-fold CV on the training side.
/// 3. k-fold CV of the winner on all rows, with train scores.
/// 4. Refit on the training side and evaluate on the test side.
///
/// # Errors
///
/// Any [`MlError`] from encoding, splitting, searching or training.
#[instrument(skip_all, fields(n_samples = dataset.n_samples(), n_iter = options.n_iter))]
pub fn run_maturity_evaluation(dataset: &CropDataset, options: &MaturityOptions) -> Result<MaturityOutcome, MlError> {
    let encoder = LabelEncoder::fit(dataset.labels())?;
    let labels = encoder.encode_all(dataset.labels())?;
    let engineered = dataset.engineered_features();
    let names = feature_names();

    let (train_idx, test_idx) = stratified_train_test_split(&labels, options.test_fraction, options.seed)?;
    let scaler = StandardScaler::fit(&take_rows(&engineered, &train_idx))?;
    let scaled = scaler.transform_batch(&engineered)?;
    let train_x = take_rows(&scaled, &train_idx);
    let train_y = take_rows(&labels, &train_idx);
    let test_x = take_rows(&scaled, &test_idx);
    let test_y = take_rows(&labels, &test_idx);
    info!(n_train = train_x.len(), n_test = test_x.len(), "hold-out split ready");

    let base = RandomForestConfig::new(1)?.with_seed(options.seed);
    let search = RandomSearch::new(options.grid.clone(), options.n_iter)?
        .with_folds(options.search_folds)
        .with_seed(options.seed)
        .run(&base, &train_x, &train_y, &names)?;
    let best = search.best_params;
    let tuned = best.apply(&base);
    info!(
        n_trees = best.n_trees,
        max_depth = ?best.max_depth,
        min_samples_split = best.min_samples_split,
        min_samples_leaf = best.min_samples_leaf,
        best_score = search.best_score,
        "best parameters selected"
    );

    let cv = CrossValidation::new(options.cv_folds)?
        .with_seed(options.seed)
        .with_train_scores(true)
        .evaluate(&tuned, &scaled, &labels, &names)?;
    let train_accuracy = cv.mean_train_accuracy.unwrap_or(cv.mean_accuracy);
    let overfitting_warning = train_accuracy - cv.mean_accuracy > OVERFITTING_GAP;
    if overfitting_warning {
        warn!(train_accuracy, test_accuracy = cv.mean_accuracy, "possible overfitting (gap > 0.05)");
    }

    let fitted = tuned.fit(&train_x, &train_y, &names)?;
    let predicted = fitted.forest().predict_batch(&test_x)?;
    let confusion = ConfusionMatrix::from_labels(&test_y, &predicted, encoder.n_classes())?;
    info!(test_accuracy = confusion.accuracy(), "hold-out evaluation complete");

    let report = MaturityReport {
        best_params: BestParams {
            n_estimators: best.n_trees,
            max_depth: best.max_depth,
            min_samples_split: best.min_samples_split,
            min_samples_leaf: best.min_samples_leaf,
        },
        cv_metrics: CvMetrics {
            train_accuracy,
            test_accuracy: cv.mean_accuracy,
            f1_score: cv.mean_f1_macro,
        },
        overfitting_warning,
        feature_importance: fitted
            .importances()
            .iter()
            .map(|f| FeatureImportanceEntry {
                feature: f.name.clone(),
                importance: f.importance,
            })
            .collect(),
        confusion_matrix: ConfusionMatrixReport {
            values: confusion.as_rows().to_vec(),
            labels: encoder.classes().to_vec(),
        },
        classification_report: classification_report(&confusion, &encoder),
    };

    Ok(MaturityOutcome {
        report,
        model: CropModel::new(fitted.into_forest(), encoder),
        scaler,
    })
}

fn classification_report(confusion: &ConfusionMatrix, encoder: &LabelEncoder) -> ClassificationReport {
    let mut entries: BTreeMap<String, ClassReportEntry> = confusion
        .class_metrics()
        .into_iter()
        .zip(encoder.classes())
        .map(|(m, name)| {
            (
                name.clone(),
                ClassReportEntry {
                    precision: m.precision,
                    recall: m.recall,
                    f1_score: m.f1,
                    support: m.support,
                },
            )
        })
        .collect();
    entries.insert("macro avg".to_string(), averaged(confusion.macro_avg()));
    entries.insert("weighted avg".to_string(), averaged(confusion.weighted_avg()));
    ClassificationReport {
        accuracy: confusion.accuracy(),
        entries,
    }
}

fn averaged(m: AveragedMetrics) -> ClassReportEntry {
    ClassReportEntry {
        precision: m.precision,
        recall: m.recall,
        f1_score: m.f1,
        support: m.support,
    }
}
