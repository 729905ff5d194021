use cropwise_features::FeatureError;
use cropwise_io::IoError;
use cropwise_rf::RfError;

/// Errors from the training, evaluation and inference pipelines.
#[derive(Debug, thiserror::Error)]
pub enum MlError {
    /// Reading the dataset or persisting artifacts failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Validation, scaling or label encoding failed.
    #[error(transparent)]
    Features(#[from] FeatureError),

    /// Forest training, evaluation or search failed.
    #[error(transparent)]
    Forest(#[from] RfError),

    /// A train/test split left one side empty.
    #[error("a {test_fraction} test split of {n_samples} samples leaves an empty side")]
    DegenerateSplit {
        /// Rows available.
        n_samples: usize,
        /// Requested test share.
        test_fraction: f64,
    },

    /// A baseline classifier could not be fit.
    #[error("{model} failed: {reason}")]
    Baseline {
        /// Model name.
        model: &'static str,
        /// What went wrong.
        reason: String,
    },
}
