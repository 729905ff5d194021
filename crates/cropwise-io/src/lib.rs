//! File I/O for the cropwise pipeline: the training CSV, the persisted
//! model and scaler, and the JSON evaluation reports.

mod artifacts;
mod dataset;
mod error;
mod report;

pub use artifacts::{ArtifactStore, CropModel, FORMAT_VERSION};
pub use dataset::{CropDataset, DatasetReader};
pub use error::IoError;
pub use report::{
    BestParams, ClassReportEntry, ClassificationReport, ComparisonReport, ConfusionMatrixReport, CvMetrics,
    FeatureImportanceEntry, MaturityReport, ModelScore, ReportWriter, COMPARISON_FILE, MATURITY_FILE,
};
