//! Model and scaler persistence via bincode.

use std::fs;
use std::path::{Path, PathBuf};

use cropwise_features::{LabelEncoder, StandardScaler};
use cropwise_rf::RandomForest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Current binary format version of both artifacts.
pub const FORMAT_VERSION: u32 = 1;

/// A fitted forest together with the crop names its classes stand for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropModel {
    forest: RandomForest,
    labels: LabelEncoder,
}

impl CropModel {
    /// Pair a forest with its label encoder.
    #[must_use]
    pub fn new(forest: RandomForest, labels: LabelEncoder) -> Self {
        Self { forest, labels }
    }

    /// Borrow the forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Borrow the label encoder.
    #[must_use]
    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }
}

#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    n_trees: usize,
    n_features: usize,
    n_classes: usize,
    feature_names: Vec<String>,
    model: CropModel,
}

#[derive(Serialize, Deserialize)]
struct ScalerEnvelope {
    format_version: u32,
    n_features: usize,
    scaler: StandardScaler,
}

/// Where the model and scaler live on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl ArtifactStore {
    /// Point at a model file and a scaler file.
    pub fn new(model_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            scaler_path: scaler_path.into(),
        }
    }

    /// Return the model path.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Return the scaler path.
    #[must_use]
    pub fn scaler_path(&self) -> &Path {
        &self.scaler_path
    }

    /// `true` when both files exist.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.model_path.is_file() && self.scaler_path.is_file()
    }

    /// Write both artifacts, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::ArtifactMismatch`] | model and scaler widths differ |
    /// | [`IoError::OutputDirCreate`] | a parent directory cannot be created |
    /// | [`IoError::SerializeArtifact`] | bincode encoding failed |
    /// | [`IoError::WriteFile`] | a file write failed |
    #[instrument(skip_all, fields(model = %self.model_path.display(), scaler = %self.scaler_path.display()))]
    pub fn save(&self, model: &CropModel, scaler: &StandardScaler) -> Result<(), IoError> {
        check_widths(model, scaler)?;
        let forest = model.forest();
        let model_envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: forest.n_trees(),
            n_features: forest.n_features(),
            n_classes: forest.n_classes(),
            feature_names: forest.feature_names().to_vec(),
            model: model.clone(),
        };
        let model_bytes = write_artifact(&self.model_path, "model", &model_envelope)?;

        let scaler_envelope = ScalerEnvelope {
            format_version: FORMAT_VERSION,
            n_features: scaler.n_features(),
            scaler: scaler.clone(),
        };
        let scaler_bytes = write_artifact(&self.scaler_path, "scaler", &scaler_envelope)?;

        info!(
            model_bytes,
            scaler_bytes,
            n_trees = forest.n_trees(),
            n_classes = forest.n_classes(),
            "artifacts saved"
        );
        Ok(())
    }

    /// Read both artifacts.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::ReadFile`] | a file read failed |
    /// | [`IoError::DeserializeArtifact`] | bincode decoding failed |
    /// | [`IoError::IncompatibleVersion`] | format version mismatch |
    /// | [`IoError::ArtifactMismatch`] | model and scaler widths differ |
    #[instrument(skip_all, fields(model = %self.model_path.display(), scaler = %self.scaler_path.display()))]
    pub fn load(&self) -> Result<(CropModel, StandardScaler), IoError> {
        let model_envelope: ModelEnvelope = read_artifact(&self.model_path, "model")?;
        check_version(model_envelope.format_version, &self.model_path, "model")?;
        let scaler_envelope: ScalerEnvelope = read_artifact(&self.scaler_path, "scaler")?;
        check_version(scaler_envelope.format_version, &self.scaler_path, "scaler")?;

        check_widths(&model_envelope.model, &scaler_envelope.scaler)?;
        debug!(
            n_trees = model_envelope.n_trees,
            n_features = model_envelope.n_features,
            n_classes = model_envelope.n_classes,
            scaler_features = scaler_envelope.n_features,
            "artifacts loaded"
        );
        Ok((model_envelope.model, scaler_envelope.scaler))
    }
}

fn check_widths(model: &CropModel, scaler: &StandardScaler) -> Result<(), IoError> {
    if model.forest().n_features() != scaler.n_features() {
        return Err(IoError::ArtifactMismatch {
            model: model.forest().n_features(),
            scaler: scaler.n_features(),
        });
    }
    Ok(())
}

fn check_version(found: u32, path: &Path, artifact: &'static str) -> Result<(), IoError> {
    if found != FORMAT_VERSION {
        return Err(IoError::IncompatibleVersion {
            artifact,
            path: path.to_path_buf(),
            expected: FORMAT_VERSION,
            found,
        });
    }
    Ok(())
}

fn write_artifact<T: Serialize>(path: &Path, artifact: &'static str, value: &T) -> Result<usize, IoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| IoError::OutputDirCreate {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let bytes = bincode::serialize(value).map_err(|e| IoError::SerializeArtifact { artifact, source: e })?;
    fs::write(path, &bytes).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(bytes.len())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, artifact: &'static str) -> Result<T, IoError> {
    let bytes = fs::read(path).map_err(|e| IoError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    bincode::deserialize(&bytes).map_err(|e| IoError::DeserializeArtifact {
        artifact,
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use cropwise_rf::RandomForestConfig;
    use tempfile::TempDir;

    use super::*;

    fn simple_artifacts() -> (CropModel, StandardScaler, Vec<Vec<f64>>) {
        let features = vec![
            vec![10.0, 60.0],
            vec![12.0, 65.0],
            vec![14.0, 62.0],
            vec![80.0, 20.0],
            vec![85.0, 25.0],
            vec![90.0, 22.0],
        ];
        let names = vec!["N".to_string(), "humidity".to_string()];
        let crops: Vec<String> = ["rice", "rice", "rice", "maize", "maize", "maize"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let encoder = LabelEncoder::fit(&crops).unwrap();
        let labels = encoder.encode_all(&crops).unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&features).unwrap();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&scaled, &labels, &names)
            .unwrap()
            .into_forest();
        (CropModel::new(forest, encoder), scaler, scaled)
    }

    #[test]
    fn round_trip_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("models/model.bin"), dir.path().join("models/scaler.bin"));
        assert!(!store.exists());

        let (model, scaler, scaled) = simple_artifacts();
        store.save(&model, &scaler).unwrap();
        assert!(store.exists());

        let (loaded_model, loaded_scaler) = store.load().unwrap();
        assert_eq!(loaded_scaler, scaler);
        assert_eq!(loaded_model.labels().classes(), model.labels().classes());
        for row in &scaled {
            assert_eq!(
                loaded_model.forest().predict_proba(row).unwrap(),
                model.forest().predict_proba(row).unwrap()
            );
        }
    }

    #[test]
    fn version_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("model.bin"), dir.path().join("scaler.bin"));
        let (model, scaler, _) = simple_artifacts();
        store.save(&model, &scaler).unwrap();

        let mut bytes = fs::read(store.model_path()).unwrap();
        bytes[..4].copy_from_slice(&99u32.to_le_bytes());
        fs::write(store.model_path(), &bytes).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            IoError::IncompatibleVersion { artifact: "model", expected: 1, found: 99, .. }
        ));
    }

    #[test]
    fn corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("model.bin"), dir.path().join("scaler.bin"));
        fs::write(store.model_path(), b"not a model").unwrap();
        fs::write(store.scaler_path(), b"nor a scaler").unwrap();
        assert!(matches!(store.load().unwrap_err(), IoError::DeserializeArtifact { .. }));
    }

    #[test]
    fn missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("model.bin"), dir.path().join("scaler.bin"));
        assert!(matches!(store.load().unwrap_err(), IoError::ReadFile { .. }));
    }

    #[test]
    fn width_mismatch_refused_on_save() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("model.bin"), dir.path().join("scaler.bin"));
        let (model, _, _) = simple_artifacts();
        let wide = StandardScaler::fit(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(matches!(
            store.save(&model, &wide).unwrap_err(),
            IoError::ArtifactMismatch { model: 2, scaler: 3 }
        ));
    }
}
