//! Derived agronomic ratios.

use serde::Serialize;

use crate::sample::CropSample;

/// Column count of the engineered vector.
pub const N_FEATURES: usize = 15;

/// Column names in vector order: the seven raw fields, then the ratios.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "N",
    "P",
    "K",
    "temperature",
    "humidity",
    "ph",
    "rainfall",
    "NPK_ratio",
    "nutrient_balance",
    "temp_humidity_index",
    "ph_optimality",
    "water_stress_index",
    "growing_degree_days",
    "N_P_ratio",
    "N_K_ratio",
];

/// [`FEATURE_NAMES`] as owned strings, the form the classifier takes.
#[must_use]
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
}

/// A sample plus its eight derived ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineeredFeatures {
    /// The measurements the ratios were derived from.
    #[serde(flatten)]
    pub sample: CropSample,
    /// Mean of N, P and K.
    #[serde(rename = "NPK_ratio")]
    pub npk_ratio: f64,
    /// Sample standard deviation of N, P and K; lower is more balanced.
    pub nutrient_balance: f64,
    /// `temperature * humidity / 100`.
    pub temp_humidity_index: f64,
    /// 1.0 at pH 6.5, falling linearly either side.
    pub ph_optimality: f64,
    /// Rainfall per degree of warmth.
    pub water_stress_index: f64,
    /// Monthly growing degree days above an 18 °C base.
    pub growing_degree_days: f64,
    /// `N / (P + 1)`.
    #[serde(rename = "N_P_ratio")]
    pub n_p_ratio: f64,
    /// `N / (K + 1)`.
    #[serde(rename = "N_K_ratio")]
    pub n_k_ratio: f64,
}

impl EngineeredFeatures {
    /// Derive every ratio from `sample`.
    #[must_use]
    pub fn from_sample(sample: &CropSample) -> Self {
        let CropSample { n, p, k, temperature, humidity, ph, rainfall } = *sample;
        let npk_ratio = (n + p + k) / 3.0;
        let nutrient_balance =
            (((n - npk_ratio).powi(2) + (p - npk_ratio).powi(2) + (k - npk_ratio).powi(2)) / 2.0).sqrt();
        Self {
            sample: *sample,
            npk_ratio,
            nutrient_balance,
            temp_humidity_index: temperature * humidity / 100.0,
            ph_optimality: 1.0 - (ph - 6.5).abs() / 6.5,
            water_stress_index: rainfall / (temperature + 1.0),
            growing_degree_days: (temperature - 18.0).max(0.0) * 30.0,
            n_p_ratio: n / (p + 1.0),
            n_k_ratio: n / (k + 1.0),
        }
    }

    /// Values in [`FEATURE_NAMES`] order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(N_FEATURES);
        row.extend(self.sample.to_array());
        row.extend([
            self.npk_ratio,
            self.nutrient_balance,
            self.temp_humidity_index,
            self.ph_optimality,
            self.water_stress_index,
            self.growing_degree_days,
            self.n_p_ratio,
            self.n_k_ratio,
        ]);
        row
    }
}
