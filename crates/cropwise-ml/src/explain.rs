//! Human-readable reasons for a recommendation.

use cropwise_rf::RandomForest;
use tracing::debug;

use crate::MlError;

/// Ranks features by their contribution to the predicted class and phrases
/// the strongest ones.
#[derive(Debug, Clone, Copy)]
pub struct CropExplainer {
    top_k: usize,
}

impl Default for CropExplainer {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl CropExplainer {
    /// Set how many reasons to return.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Return how many reasons are returned.
    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Explain the forest's prediction for `scaled`.
    ///
    /// `raw` holds the same features before scaling; its values appear in
    /// the phrases. `names` labels both vectors.
    ///
    /// # Errors
    ///
    /// [`MlError::Forest`] when `scaled` does not match the forest's width.
    pub fn explain(
        &self,
        forest: &RandomForest,
        scaled: &[f64],
        raw: &[f64],
        names: &[String],
    ) -> Result<Vec<String>, MlError> {
        let class = forest.predict(scaled)?;
        let contributions = forest.contributions(scaled)?.for_class(class);

        let mut ranked: Vec<usize> = (0..contributions.len()).collect();
        ranked.sort_by(|&a, &b| contributions[b].total_cmp(&contributions[a]));

        let reasons: Vec<String> = ranked
            .into_iter()
            .take(self.top_k)
            .filter_map(|i| Some(describe_feature(names.get(i)?, raw.get(i).copied().unwrap_or(f64::NAN))))
            .collect();
        debug!(class, ?reasons, "prediction explained");
        Ok(reasons)
    }
}

/// Phrase one feature as a reason, quoting `value` for the raw measurements.
#[must_use]
pub fn describe_feature(name: &str, value: f64) -> String {
    match name {
        "N" => "high Nitrogen content".to_string(),
        "P" => "strong Phosphorus levels".to_string(),
        "K" => "ideal Potassium availability".to_string(),
        "temperature" => format!("optimal temperature ({value:.1}°C)"),
        "humidity" => format!("perfect humidity ({value:.1}%)"),
        "ph" => format!("suitable soil pH ({value:.1})"),
        "rainfall" => format!("ideal rainfall ({value:.1}mm)"),
        "NPK_ratio" => "balanced nutrient profiles".to_string(),
        "nutrient_balance" => "stable soil composition".to_string(),
        "temp_humidity_index" => "excellent climate balance".to_string(),
        "ph_optimality" => "near-perfect soil acidity".to_string(),
        "water_stress_index" => "favorable moisture levels".to_string(),
        "growing_degree_days" => "optimal thermal accumulation".to_string(),
        "N_P_ratio" => "proper N-P nutrient ratio".to_string(),
        "N_K_ratio" => "favorable N-K nutrient ratio".to_string(),
        other => format!("favorable {other} level"),
    }
}
