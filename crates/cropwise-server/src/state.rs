//! Shared handler state and model startup.

use std::sync::Arc;

use cropwise_io::ArtifactStore;
use cropwise_ml::{CropExplainer, CropPredictor, MlError, TrainingOptions, train_and_save};
use sqlx::SqlitePool;
use tracing::{error, info, instrument, warn};

use crate::auth::TokenService;
use crate::config::ServerConfig;
use crate::db;
use crate::error::ServerError;

/// State behind every handler.
pub type SharedState = Arc<AppState>;

/// The served model, or why there is none.
#[derive(Debug, Clone)]
pub enum ModelSlot {
    /// Loaded and ready.
    Ready(Arc<CropPredictor>),
    /// Startup failed with this message.
    Unavailable(String),
}

impl ModelSlot {
    /// The predictor, if loaded.
    #[must_use]
    pub fn predictor(&self) -> Option<&Arc<CropPredictor>> {
        match self {
            Self::Ready(predictor) => Some(predictor),
            Self::Unavailable(_) => None,
        }
    }
}

/// Configuration, database pool, token service and model.
#[derive(Debug)]
pub struct AppState {
    /// Resolved settings.
    pub config: ServerConfig,
    /// SQLite pool.
    pub pool: SqlitePool,
    /// JWT issuer and verifier.
    pub tokens: TokenService,
    /// Served model.
    pub model: ModelSlot,
}

impl AppState {
    /// Assemble state from already-initialized parts.
    #[must_use]
    pub fn new(config: ServerConfig, pool: SqlitePool, model: ModelSlot) -> SharedState {
        let tokens = TokenService::new(&config.jwt_secret, config.access_token_ttl, config.refresh_token_ttl);
        Arc::new(Self {
            config,
            pool,
            tokens,
            model,
        })
    }

    /// Connect and migrate the database, then load or train the model.
    ///
    /// A model that cannot be obtained does not stop startup; predictions
    /// then fail with the recorded error.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the database cannot be opened or migrated.
    #[instrument(skip_all, fields(environment = %config.environment))]
    pub async fn initialize(config: ServerConfig) -> Result<SharedState, ServerError> {
        let pool = db::connect(&config.database_url).await?;
        db::run_migrations(&pool).await?;

        let model_config = config.clone();
        let model = match tokio::task::spawn_blocking(move || load_or_train(&model_config)).await? {
            Ok(predictor) => {
                info!(explainer = predictor.explainer_enabled(), "model ready");
                ModelSlot::Ready(Arc::new(predictor))
            }
            Err(e) => {
                error!(error = %e, "model unavailable; predictions are disabled");
                ModelSlot::Unavailable(e.to_string())
            }
        };
        Ok(Self::new(config, pool, model))
    }
}

/// Load the artifacts, training from the dataset when they are missing or unreadable.
fn load_or_train(config: &ServerConfig) -> Result<CropPredictor, MlError> {
    let store = ArtifactStore::new(&config.model_path, &config.scaler_path);
    if !store.exists() {
        info!(dataset = %config.dataset_path.display(), "artifacts missing; training");
        train_and_save(&config.dataset_path, &store, &TrainingOptions::default())?;
    }
    let (model, scaler) = match store.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(error = %e, "artifacts unreadable; retraining");
            train_and_save(&config.dataset_path, &store, &TrainingOptions::default())?;
            store.load()?
        }
    };
    let explainer = config.enable_explainer.then(CropExplainer::default);
    Ok(CropPredictor::new(model, scaler).with_explainer(explainer))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn missing_dataset_leaves_model_unavailable() {
        let dir = TempDir::new().unwrap();
        let state = AppState::initialize(ServerConfig::local(dir.path())).await.unwrap();
        let ModelSlot::Unavailable(message) = &state.model else {
            panic!("model should be unavailable");
        };
        assert!(!message.is_empty());
        assert!(state.model.predictor().is_none());
    }
}
