//! JSON evaluation reports.
//!
//! The structs here are the on-disk schema. They hold primitives only, so
//! this crate does not depend on the pipelines that fill them in.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::IoError;

/// File name of the model comparison report.
pub const COMPARISON_FILE: &str = "model_comparison_results.json";

/// File name of the maturity report.
pub const MATURITY_FILE: &str = "ml_maturity_report.json";

/// Cross-validated accuracy of one model, or why it could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelScore {
    /// Scored on every fold.
    Scored {
        /// Mean fold accuracy.
        mean_accuracy: f64,
        /// Population standard deviation of fold accuracies.
        std_accuracy: f64,
        /// Accuracy per fold.
        scores: Vec<f64>,
    },
    /// The model failed to train or predict.
    Failed {
        /// Failure message.
        error: String,
    },
}

/// Model name to score.
pub type ComparisonReport = BTreeMap<String, ModelScore>;

/// Hyperparameters chosen by the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParams {
    /// Trees in the forest.
    pub n_estimators: usize,
    /// Depth limit, `null` for unlimited.
    pub max_depth: Option<usize>,
    /// Minimum node size eligible for splitting.
    pub min_samples_split: usize,
    /// Minimum child size.
    pub min_samples_leaf: usize,
}

/// Cross-validated means of the tuned model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvMetrics {
    /// Mean accuracy on the training folds.
    pub train_accuracy: f64,
    /// Mean accuracy on the held-out folds.
    pub test_accuracy: f64,
    /// Mean held-out macro F1.
    pub f1_score: f64,
}

/// One feature's share of the total impurity decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceEntry {
    /// Column name.
    pub feature: String,
    /// Normalized importance.
    pub importance: f64,
}

/// Test-set confusion matrix with row and column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrixReport {
    /// `values[true][predicted]`.
    pub values: Vec<Vec<usize>>,
    /// Crop names in index order.
    pub labels: Vec<String>,
}

/// Precision, recall, F1 and support of one class or one average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReportEntry {
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1 score.
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    /// True samples.
    pub support: usize,
}

/// Per-class metrics keyed by crop name, plus `macro avg` and
/// `weighted avg` entries and the overall accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Overall test accuracy.
    pub accuracy: f64,
    /// Crop names and the two averages.
    #[serde(flatten)]
    pub entries: BTreeMap<String, ClassReportEntry>,
}

/// Hyperparameter search, cross-validation and test-set evaluation of the
/// tuned forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaturityReport {
    /// Winning hyperparameters.
    pub best_params: BestParams,
    /// Cross-validated train/test accuracy and F1.
    pub cv_metrics: CvMetrics,
    /// Train accuracy exceeds test accuracy by more than 0.05.
    pub overfitting_warning: bool,
    /// MDI importances, most important first.
    pub feature_importance: Vec<FeatureImportanceEntry>,
    /// Test-set confusion matrix.
    pub confusion_matrix: ConfusionMatrixReport,
    /// Test-set classification report.
    pub classification_report: ClassificationReport,
}

/// Reads and writes the two reports in a directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Target `output_dir` without touching the filesystem.
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Return the full path of the comparison report.
    #[must_use]
    pub fn comparison_path(&self) -> PathBuf {
        self.output_dir.join(COMPARISON_FILE)
    }

    /// Return the full path of the maturity report.
    #[must_use]
    pub fn maturity_path(&self) -> PathBuf {
        self.output_dir.join(MATURITY_FILE)
    }

    /// Write `model_comparison_results.json`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::OutputDirCreate`] | the directory cannot be created |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(dir = %self.output_dir.display()))]
    pub fn write_comparison(&self, report: &ComparisonReport) -> Result<PathBuf, IoError> {
        self.write_json(&self.comparison_path(), report)
    }

    /// Write `ml_maturity_report.json`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// As [`ReportWriter::write_comparison`].
    #[instrument(skip_all, fields(dir = %self.output_dir.display()))]
    pub fn write_maturity(&self, report: &MaturityReport) -> Result<PathBuf, IoError> {
        self.write_json(&self.maturity_path(), report)
    }

    /// Read the comparison report, `None` if it has not been written.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::ReadFile`] | the file exists but cannot be read |
    /// | [`IoError::Json`] | the file is not a valid report |
    pub fn read_comparison(&self) -> Result<Option<ComparisonReport>, IoError> {
        read_json(&self.comparison_path())
    }

    /// Read the maturity report, `None` if it has not been written.
    ///
    /// # Errors
    ///
    /// As [`ReportWriter::read_comparison`].
    pub fn read_maturity(&self) -> Result<Option<MaturityReport>, IoError> {
        read_json(&self.maturity_path())
    }

    fn write_json<T: Serialize>(&self, path: &Path, report: &T) -> Result<PathBuf, IoError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| IoError::OutputDirCreate {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(report).map_err(|e| IoError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, &json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(path = %path.display(), "report written");
        Ok(path.to_path_buf())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, IoError> {
    if !path.is_file() {
        debug!(path = %path.display(), "no cached report");
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| IoError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map(Some).map_err(|e| IoError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}
