//! Crop recommendation CSV reader with input validation.

use std::path::{Path, PathBuf};

use cropwise_features::{CropSample, EngineeredFeatures, RAW_FEATURE_NAMES};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Labelled measurements loaded from the training CSV.
#[derive(Debug, Clone)]
pub struct CropDataset {
    samples: Vec<CropSample>,
    labels: Vec<String>,
}

impl CropDataset {
    pub(crate) fn new(samples: Vec<CropSample>, labels: Vec<String>) -> Self {
        Self { samples, labels }
    }

    /// Return the measurements.
    #[must_use]
    pub fn samples(&self) -> &[CropSample] {
        &self.samples
    }

    /// Return the crop labels, one per sample.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// The seven raw measurements of every row.
    #[must_use]
    pub fn raw_features(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.to_array().to_vec()).collect()
    }

    /// The 15-column engineered vector of every row.
    #[must_use]
    pub fn engineered_features(&self) -> Vec<Vec<f64>> {
        self.samples
            .iter()
            .map(|s| EngineeredFeatures::from_sample(s).to_vec())
            .collect()
    }
}

/// Reads the crop recommendation dataset.
///
/// Expected CSV format: a header naming `N,P,K,temperature,humidity,ph,rainfall,label`
/// in any order (extra columns are ignored), then one row per observation.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | file doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | malformed CSV record |
/// | [`IoError::MissingColumn`] | a required column is absent from the header |
/// | [`IoError::InconsistentRowLength`] | row has a different column count than the header |
/// | [`IoError::NonFiniteValue`] | measurement is NaN, Inf or unparseable |
/// | [`IoError::EmptyLabel`] | blank label cell |
/// | [`IoError::EmptyDataset`] | zero data rows after the header |
pub struct DatasetReader {
    path: PathBuf,
}

impl DatasetReader {
    /// Create a reader for the CSV at `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<CropDataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so the row-length check below reports the row instead of a bare CsvParse.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();
        let locate = |column: &'static str| {
            header.iter().position(|h| h == column).ok_or(IoError::MissingColumn {
                path: self.path.clone(),
                column,
            })
        };
        let mut measurement_cols = [0usize; 7];
        for (slot, name) in measurement_cols.iter_mut().zip(RAW_FEATURE_NAMES) {
            *slot = locate(name)?;
        }
        let label_col = locate("label")?;
        debug!(expected_cols, "read CSV header");

        let mut samples = Vec::new();
        let mut labels = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let mut values = [0.0f64; 7];
            for ((value, &col), column) in values.iter_mut().zip(&measurement_cols).zip(RAW_FEATURE_NAMES) {
                let raw = record.get(col).unwrap_or("");
                *value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column,
                        raw: raw.to_string(),
                    })?;
            }

            let label = record.get(label_col).unwrap_or("");
            if label.is_empty() {
                return Err(IoError::EmptyLabel {
                    path: self.path.clone(),
                    row_index,
                });
            }

            samples.push(CropSample::from_array_unchecked(values));
            labels.push(label.to_string());
        }

        if samples.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_samples = samples.len(), "crop dataset loaded");
        Ok(CropDataset::new(samples, labels))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
