//! Fit and persist the served model.

use std::path::Path;

use cropwise_features::{LabelEncoder, StandardScaler, feature_names};
use cropwise_io::{ArtifactStore, CropDataset, CropModel, DatasetReader};
use cropwise_rf::{OobMode, PermutationImportance, RandomForestConfig, RankedFeature};
use serde::Serialize;
use tracing::{info, instrument};

use crate::MlError;

/// Forest settings for the served model.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `n_trees` | 100     |
/// | `seed`    | 42      |
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    n_trees: usize,
    seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self { n_trees: 100, seed: 42 }
    }
}

impl TrainingOptions {
    // --- Setters ---

    /// Set the number of trees.
    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Set the forest seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the forest seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// What a training run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    /// Training rows.
    pub n_samples: usize,
    /// Distinct crops.
    pub n_classes: usize,
    /// Trees grown.
    pub n_trees: usize,
    /// Out-of-bag accuracy.
    pub oob_accuracy: Option<f64>,
    /// Engineered column names in model order.
    pub feature_names: Vec<String>,
    /// MDI importances, most important first.
    pub importances: Vec<RankedFeature>,
    /// OOB accuracy drop per shuffled column, most important first.
    pub permutation_importances: Vec<PermutationImportance>,
}

/// Engineer, scale and fit a forest on every row of `dataset`.
///
/// # Errors
///
/// Any [`MlError`] from label encoding, scaling or training.
#[instrument(skip_all, fields(n_samples = dataset.n_samples(), n_trees = options.n_trees))]
pub fn train_model(
    dataset: &CropDataset,
    options: &TrainingOptions,
) -> Result<(CropModel, StandardScaler, TrainingSummary), MlError> {
    let encoder = LabelEncoder::fit(dataset.labels())?;
    let labels = encoder.encode_all(dataset.labels())?;
    let (scaler, scaled) = StandardScaler::fit_transform(&dataset.engineered_features())?;
    let names = feature_names();

    let result = RandomForestConfig::new(options.n_trees)?
        .with_seed(options.seed)
        .with_oob_mode(OobMode::Enabled)
        .fit(&scaled, &labels, &names)?;

    let summary = TrainingSummary {
        n_samples: dataset.n_samples(),
        n_classes: encoder.n_classes(),
        n_trees: options.n_trees,
        oob_accuracy: result.oob_score().map(|s| s.accuracy),
        feature_names: names,
        importances: result.importances().to_vec(),
        permutation_importances: result.permutation_importances(&scaled, &labels, options.seed),
    };
    info!(
        n_classes = summary.n_classes,
        oob_accuracy = ?summary.oob_accuracy,
        "crop model trained"
    );
    Ok((CropModel::new(result.into_forest(), encoder), scaler, summary))
}

/// Read the CSV at `dataset_path`, train, and write both artifacts to `store`.
///
/// # Errors
///
/// Any [`MlError`] from reading, training or saving.
pub fn train_and_save(
    dataset_path: &Path,
    store: &ArtifactStore,
    options: &TrainingOptions,
) -> Result<TrainingSummary, MlError> {
    let dataset = DatasetReader::new(dataset_path).read()?;
    let (model, scaler, summary) = train_model(&dataset, options)?;
    store.save(&model, &scaler)?;
    Ok(summary)
}
