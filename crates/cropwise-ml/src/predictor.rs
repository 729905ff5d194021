//! Crop recommendation from one set of measurements.

use cropwise_features::{CropSample, EngineeredFeatures, StandardScaler, feature_names};
use cropwise_io::CropModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::MlError;
use crate::explain::CropExplainer;

/// Reason given when no explanation is available.
pub const DEFAULT_REASON: &str = "Highly favorable conditions";

/// Alternatives below this probability are dropped.
const MIN_ALTERNATIVE_PROBABILITY: f64 = 0.01;
/// Probability above which an alternative is [`Suitability::Moderate`].
const MODERATE_THRESHOLD: f64 = 0.1;
/// Ranks 2 through 4.
const MAX_ALTERNATIVES: usize = 3;

/// How well a runner-up crop fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suitability {
    /// Probability above 0.1.
    Moderate,
    /// Probability in (0.01, 0.1].
    Low,
}

impl Suitability {
    fn from_probability(probability: f64) -> Self {
        if probability > MODERATE_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// A runner-up crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Crop name.
    pub crop: String,
    /// Forest probability.
    pub confidence: f64,
    /// Bucketed probability.
    pub suitability: Suitability,
}

/// The best crop, its runners-up and why it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Most probable crop.
    pub predicted_crop: String,
    /// Its probability.
    pub confidence: f64,
    /// Up to three runners-up, most probable first.
    pub alternatives: Vec<Alternative>,
    /// Short phrases naming the strongest supporting features.
    pub reasons: Vec<String>,
}

/// Model, scaler and optional explainer ready to serve predictions.
#[derive(Debug, Clone)]
pub struct CropPredictor {
    model: CropModel,
    scaler: StandardScaler,
    explainer: Option<CropExplainer>,
    names: Vec<String>,
}

impl CropPredictor {
    /// Serve `model` with `scaler`; explanations are off until
    /// [`CropPredictor::with_explainer`] is called.
    #[must_use]
    pub fn new(model: CropModel, scaler: StandardScaler) -> Self {
        Self {
            model,
            scaler,
            explainer: None,
            names: feature_names(),
        }
    }

    /// Attach or remove the explainer.
    #[must_use]
    pub fn with_explainer(mut self, explainer: Option<CropExplainer>) -> Self {
        self.explainer = explainer;
        self
    }

    /// Borrow the model.
    #[must_use]
    pub fn model(&self) -> &CropModel {
        &self.model
    }

    /// Borrow the scaler.
    #[must_use]
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// `true` when reasons come from the explainer.
    #[must_use]
    pub fn explainer_enabled(&self) -> bool {
        self.explainer.is_some()
    }

    /// Engineer, scale and classify `sample`.
    ///
    /// Explainer failures are logged and replaced by [`DEFAULT_REASON`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MlError::Features`] | the scaler width does not match the engineered vector |
    /// | [`MlError::Forest`] | the forest width does not match the scaler |
    #[instrument(skip_all)]
    pub fn recommend(&self, sample: &CropSample) -> Result<Recommendation, MlError> {
        let raw = EngineeredFeatures::from_sample(sample).to_vec();
        let scaled = self.scaler.transform(&raw)?;
        let distribution = self.model.forest().predict_proba(&scaled)?;
        let labels = self.model.labels();

        let best = distribution.predicted_class();
        let confidence = distribution.as_slice().get(best).copied().unwrap_or(0.0);
        let predicted_crop = labels.decode(best)?.to_string();

        let alternatives = distribution
            .top_k(MAX_ALTERNATIVES + 1)
            .iter()
            .filter(|&&(class, p)| class != best && p > MIN_ALTERNATIVE_PROBABILITY)
            .take(MAX_ALTERNATIVES)
            .map(|&(class, p)| {
                Ok(Alternative {
                    crop: labels.decode(class)?.to_string(),
                    confidence: p,
                    suitability: Suitability::from_probability(p),
                })
            })
            .collect::<Result<Vec<_>, MlError>>()?;

        let reasons = self.reasons(&scaled, &raw);
        debug!(%predicted_crop, confidence, n_alternatives = alternatives.len(), "recommendation ready");
        Ok(Recommendation {
            predicted_crop,
            confidence,
            alternatives,
            reasons,
        })
    }

    fn reasons(&self, scaled: &[f64], raw: &[f64]) -> Vec<String> {
        let fallback = || vec![DEFAULT_REASON.to_string()];
        let Some(explainer) = &self.explainer else {
            return fallback();
        };
        match explainer.explain(self.model.forest(), scaled, raw, &self.names) {
            Ok(reasons) if !reasons.is_empty() => reasons,
            Ok(_) => fallback(),
            Err(e) => {
                warn!(error = %e, "explanation failed; using default reason");
                fallback()
            }
        }
    }
}
