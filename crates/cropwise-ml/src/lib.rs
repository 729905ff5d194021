//! Pipelines on top of the forest: training the served model, the
//! maturity evaluation, the multi-model comparison and per-prediction
//! explanations.

mod baseline;
mod compare;
mod error;
mod explain;
mod maturity;
mod predictor;
mod split;
mod train;

pub use baseline::{GaussianNaiveBayes, SoftmaxRegression};
pub use compare::{
    Classifier, ForestClassifier, LogisticClassifier, NaiveBayesClassifier, compare_models, default_classifiers,
};
pub use error::MlError;
pub use explain::{CropExplainer, describe_feature};
pub use maturity::{MaturityOptions, MaturityOutcome, run_maturity_evaluation};
pub use predictor::{Alternative, CropPredictor, Recommendation, Suitability, DEFAULT_REASON};
pub use split::stratified_train_test_split;
pub use train::{TrainingOptions, TrainingSummary, train_and_save, train_model};
