//! Per-column standardization.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FeatureError;

/// Centres each column on its training mean and divides by its population
/// standard deviation. Constant columns keep a scale of 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics on row-major `rows`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::EmptyMatrix`] | `rows` is empty |
    /// | [`FeatureError::WidthMismatch`] | rows differ in length |
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, FeatureError> {
        let width = rows.first().ok_or(FeatureError::EmptyMatrix)?.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(FeatureError::WidthMismatch {
                expected: width,
                got: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0f64; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0f64; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }
        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();

        debug!(n_rows = rows.len(), n_columns = width, "scaler fitted");
        Ok(Self { mean, scale })
    }

    /// Standardize one row.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::WidthMismatch`] if `row` has the wrong length.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, FeatureError> {
        if row.len() != self.mean.len() {
            return Err(FeatureError::WidthMismatch {
                expected: self.mean.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardize every row.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::WidthMismatch`] on the first row of the wrong length.
    pub fn transform_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, FeatureError> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Fit on `rows` and return them standardized.
    ///
    /// # Errors
    ///
    /// As [`StandardScaler::fit`].
    pub fn fit_transform(rows: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>), FeatureError> {
        let scaler = Self::fit(rows)?;
        let scaled = scaler.transform_batch(rows)?;
        Ok((scaler, scaled))
    }

    /// Return the column means.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Return the column scales.
    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Return the fitted width.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}
