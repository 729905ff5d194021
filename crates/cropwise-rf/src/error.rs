/// Errors from forest training, evaluation and search.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// `n_trees` was zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// Value that was rejected.
        n_trees: usize,
    },

    /// `max_depth` was `Some(0)`.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// Value that was rejected.
        max_depth: usize,
    },

    /// `min_samples_split` was below 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// Value that was rejected.
        min_samples_split: usize,
    },

    /// `min_samples_leaf` was zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// Value that was rejected.
        min_samples_leaf: usize,
    },

    /// The `max_features` strategy resolved outside `[1, n_features]`.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// Resolved count.
        max_features: usize,
        /// Columns available.
        n_features: usize,
    },

    /// `bootstrap_fraction` was outside `(0.0, 1.0]`.
    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// Value that was rejected.
        fraction: f64,
    },

    /// Cross-validation was asked for fewer than two folds.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// Value that was rejected.
        n_folds: usize,
    },

    /// A random search was configured with zero iterations.
    #[error("n_iter must be at least 1, got {n_iter}")]
    InvalidIterationCount {
        /// Value that was rejected.
        n_iter: usize,
    },

    /// A parameter grid axis has no candidate values.
    #[error("parameter grid axis `{axis}` is empty")]
    EmptyParamGrid {
        /// Name of the empty axis.
        axis: &'static str,
    },

    /// No training samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Samples carry no feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// `features` and `labels` disagree on the number of samples.
    #[error("{n_features_rows} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_features_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// A training row has the wrong number of columns.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// Column count of the first row.
        expected: usize,
        /// Column count of the offending row.
        got: usize,
        /// Zero-based row index.
        sample_index: usize,
    },

    /// A prediction input has the wrong number of columns.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// Columns the forest was trained on.
        expected: usize,
        /// Columns supplied.
        got: usize,
    },

    /// A training value was NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// Zero-based row index.
        sample_index: usize,
        /// Zero-based column index.
        feature_index: usize,
    },

    /// A class is too small to appear in every fold.
    #[error("class {class} has only {count} samples, need at least {n_folds} for stratified CV")]
    TooFewSamplesForFolds {
        /// Encoded class.
        class: usize,
        /// Samples of that class.
        count: usize,
        /// Folds requested.
        n_folds: usize,
    },

    /// OOB scoring was requested but no sample was left out of every bootstrap.
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Why the score could not be computed.
        reason: String,
    },
}
