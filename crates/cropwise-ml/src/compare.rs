//! Cross-validated accuracy of the forest against alternative classifiers.

use cropwise_features::{LabelEncoder, RAW_FEATURE_NAMES};
use cropwise_io::{ComparisonReport, CropDataset, ModelScore};
use cropwise_rf::{RandomForestConfig, SplitMethod, mean_std, stratified_folds};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{info, instrument, warn};

use crate::MlError;
use crate::baseline::{GaussianNaiveBayes, SoftmaxRegression};
use crate::split::take_rows;

const N_FOLDS: usize = 5;
const N_TREES: usize = 100;

/// A model that can be trained on one fold and scored on another.
pub trait Classifier: Send + Sync {
    /// Key used in the comparison report.
    fn name(&self) -> &str;

    /// Fit on the training rows and predict the test rows.
    ///
    /// # Errors
    ///
    /// Any [`MlError`] the model raises while fitting or predicting.
    fn fit_predict(
        &self,
        train_x: &[Vec<f64>],
        train_y: &[usize],
        test_x: &[Vec<f64>],
        n_classes: usize,
    ) -> Result<Vec<usize>, MlError>;
}

/// A forest variant under a display name.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    name: String,
    config: RandomForestConfig,
}

impl ForestClassifier {
    /// Wrap `config` under `name`.
    pub fn new(name: impl Into<String>, config: RandomForestConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

impl Classifier for ForestClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_predict(
        &self,
        train_x: &[Vec<f64>],
        train_y: &[usize],
        test_x: &[Vec<f64>],
        _n_classes: usize,
    ) -> Result<Vec<usize>, MlError> {
        let names: Vec<String> = RAW_FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect();
        let result = self.config.fit(train_x, train_y, &names)?;
        Ok(result.forest().predict_batch(test_x)?)
    }
}

/// Gaussian naive Bayes refit on every fold.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveBayesClassifier;

impl Classifier for NaiveBayesClassifier {
    fn name(&self) -> &str {
        "Naive Bayes"
    }

    fn fit_predict(
        &self,
        train_x: &[Vec<f64>],
        train_y: &[usize],
        test_x: &[Vec<f64>],
        n_classes: usize,
    ) -> Result<Vec<usize>, MlError> {
        Ok(GaussianNaiveBayes::fit(train_x, train_y, n_classes)?.predict_batch(test_x))
    }
}

/// Softmax regression refit on every fold.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticClassifier;

impl Classifier for LogisticClassifier {
    fn name(&self) -> &str {
        "Logistic Regression"
    }

    fn fit_predict(
        &self,
        train_x: &[Vec<f64>],
        train_y: &[usize],
        test_x: &[Vec<f64>],
        n_classes: usize,
    ) -> Result<Vec<usize>, MlError> {
        Ok(SoftmaxRegression::fit(train_x, train_y, n_classes)?.predict_batch(test_x))
    }
}

/// The five models the comparison report covers.
///
/// # Errors
///
/// Only if a forest configuration is rejected, which the fixed settings never are.
pub fn default_classifiers(seed: u64) -> Result<Vec<Box<dyn Classifier>>, MlError> {
    let forest = |method: SplitMethod| -> Result<RandomForestConfig, MlError> {
        Ok(RandomForestConfig::new(N_TREES)?.with_seed(seed).with_split_method(method))
    };
    Ok(vec![
        Box::new(ForestClassifier::new("Random Forest", forest(SplitMethod::Exact)?)),
        Box::new(ForestClassifier::new("Extra Trees", forest(SplitMethod::ExtraTrees)?)),
        Box::new(ForestClassifier::new(
            "Histogram Random Forest",
            forest(SplitMethod::Histogram { n_bins: 32 })?,
        )),
        Box::new(NaiveBayesClassifier),
        Box::new(LogisticClassifier),
    ])
}

/// Score every classifier with stratified 5-fold accuracy on the raw
/// measurements.
///
/// A classifier that fails on any fold is recorded as
/// [`ModelScore::Failed`] and the rest still run.
///
/// # Errors
///
/// Label encoding or fold assignment failures, which abort the whole run.
#[instrument(skip_all, fields(n_samples = dataset.n_samples(), seed))]
pub fn compare_models(dataset: &CropDataset, seed: u64) -> Result<ComparisonReport, MlError> {
    compare_with(dataset, &default_classifiers(seed)?, seed)
}

pub(crate) fn compare_with(
    dataset: &CropDataset,
    classifiers: &[Box<dyn Classifier>],
    seed: u64,
) -> Result<ComparisonReport, MlError> {
    let encoder = LabelEncoder::fit(dataset.labels())?;
    let labels = encoder.encode_all(dataset.labels())?;
    let features = dataset.raw_features();
    let folds = stratified_folds(&labels, N_FOLDS, seed)?;
    let n_classes = encoder.n_classes();

    let report = classifiers
        .par_iter()
        .map(|classifier| {
            let score = match cross_validate(classifier.as_ref(), &features, &labels, &folds, n_classes) {
                Ok(scores) => {
                    let (mean_accuracy, std_accuracy) = mean_std(&scores);
                    info!(model = classifier.name(), mean_accuracy, std_accuracy, "model scored");
                    ModelScore::Scored {
                        mean_accuracy,
                        std_accuracy,
                        scores,
                    }
                }
                Err(e) => {
                    warn!(model = classifier.name(), error = %e, "model failed");
                    ModelScore::Failed { error: e.to_string() }
                }
            };
            (classifier.name().to_string(), score)
        })
        .collect::<ComparisonReport>();
    Ok(report)
}

fn cross_validate(
    classifier: &dyn Classifier,
    features: &[Vec<f64>],
    labels: &[usize],
    folds: &[usize],
    n_classes: usize,
) -> Result<Vec<f64>, MlError> {
    let n_folds = folds.iter().max().map_or(0, |&m| m + 1);
    let mut scores = Vec::with_capacity(n_folds);
    for fold in 0..n_folds {
        let (test_idx, train_idx): (Vec<usize>, Vec<usize>) = (0..labels.len()).partition(|&i| folds[i] == fold);
        if test_idx.is_empty() {
            continue;
        }
        let predicted = classifier.fit_predict(
            &take_rows(features, &train_idx),
            &take_rows(labels, &train_idx),
            &take_rows(features, &test_idx),
            n_classes,
        )?;
        let correct = test_idx.iter().zip(&predicted).filter(|&(&i, &p)| labels[i] == p).count();
        scores.push(correct as f64 / test_idx.len() as f64);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    impl Classifier for AlwaysFails {
        fn name(&self) -> &str {
            "Broken"
        }

        fn fit_predict(&self, _: &[Vec<f64>], _: &[usize], _: &[Vec<f64>], _: usize) -> Result<Vec<usize>, MlError> {
            Err(MlError::Baseline {
                model: "Broken",
                reason: "no fit".to_string(),
            })
        }
    }

    struct Majority;

    impl Classifier for Majority {
        fn name(&self) -> &str {
            "Majority"
        }

        fn fit_predict(&self, _: &[Vec<f64>], y: &[usize], x: &[Vec<f64>], n: usize) -> Result<Vec<usize>, MlError> {
            let mut counts = vec![0usize; n];
            y.iter().for_each(|&c| counts[c] += 1);
            let best = counts.iter().enumerate().max_by_key(|&(_, c)| *c).map_or(0, |(i, _)| i);
            Ok(vec![best; x.len()])
        }
    }

    #[test]
    fn default_lineup_names() {
        let names: Vec<String> = default_classifiers(42)
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["Random Forest", "Extra Trees", "Histogram Random Forest", "Naive Bayes", "Logistic Regression"]
        );
    }

    #[test]
    fn failing_model_recorded_not_fatal() {
        use std::io::Write;

        use cropwise_io::DatasetReader;

        let mut csv = String::from("N,P,K,temperature,humidity,ph,rainfall,label\n");
        for i in 0..10 {
            let x = f64::from(i);
            csv.push_str(&format!("{},40,40,20,80,6.5,{},rice\n", 80.0 + x, 200.0 + x));
            csv.push_str(&format!("{},60,20,25,40,7.0,{},maize\n", 10.0 + x, 60.0 + x));
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(csv.as_bytes()).unwrap();
        let dataset = DatasetReader::new(file.path()).read().unwrap();

        let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(Majority), Box::new(AlwaysFails)];
        let report = compare_with(&dataset, &classifiers, 42).unwrap();
        assert_eq!(report.len(), 2);
        assert!(matches!(&report["Broken"], ModelScore::Failed { error } if error.contains("no fit")));
        let ModelScore::Scored { scores, mean_accuracy, .. } = &report["Majority"] else {
            panic!("majority baseline should score");
        };
        assert_eq!(scores.len(), 5);
        assert!((scores.iter().sum::<f64>() / 5.0 - mean_accuracy).abs() < 1e-12);
    }

    #[test]
    fn fold_scores_within_unit_interval() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let folds = stratified_folds(&labels, 5, 42).unwrap();
        let scores = cross_validate(&Majority, &features, &labels, &folds, 2).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(cross_validate(&AlwaysFails, &features, &labels, &folds, 2).is_err());
    }
}
