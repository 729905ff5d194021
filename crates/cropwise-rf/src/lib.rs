//! Random forest classification: train, evaluate, tune, predict, explain.
//!
//! CART decision trees with Gini/Entropy criteria and three split
//! strategies (exact, extremely randomized, quantile histogram), grown in
//! parallel via rayon. Includes out-of-bag and permutation importance,
//! stratified cross-validation, randomized hyperparameter search and
//! per-feature path contributions for single predictions.

mod config;
mod confusion;
mod contrib;
mod error;
mod eval;
mod forest;
mod histogram;
mod importance;
mod node;
mod oob;
mod perm_importance;
mod predict;
mod result;
mod search;
mod split;
mod tree;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::{AveragedMetrics, ClassMetrics, ConfusionMatrix};
pub use contrib::Contributions;
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult, mean_std, stratified_folds};
pub use forest::RandomForest;
pub use importance::{RankedFeature, rank};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use perm_importance::PermutationImportance;
pub use predict::ClassDistribution;
pub use result::RandomForestResult;
pub use search::{ParamGrid, ParamSet, RandomSearch, SearchResult, Trial};
pub use split::{SplitCriterion, SplitMethod};
pub use tree::{DecisionTree, DecisionTreeConfig};
