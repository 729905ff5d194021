//! SQLite pool, migrations and repositories.

mod predictions;
mod users;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, instrument};

pub use predictions::{CropCount, NewPrediction, PredictionRecord, PredictionRepository};
pub use users::{NewUser, User, UserRepository};

use crate::error::ServerError;

/// Open a pool for `database_url`, creating the file and its directory if needed.
///
/// An in-memory database gets a single long-lived connection so every
/// query sees the same data.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ServerError::Database`] | the URL is invalid or the database cannot be opened |
/// | [`ServerError::DatabaseDir`] | the parent directory cannot be created |
#[instrument(skip_all, fields(url = %database_url))]
pub async fn connect(database_url: &str) -> Result<SqlitePool, ServerError> {
    let db_error = |source| ServerError::Database {
        url: database_url.to_string(),
        source,
    };
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(db_error)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        if let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ServerError::DatabaseDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await.map_err(db_error)?;
    info!(in_memory, "database connected");
    Ok(pool)
}

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns [`ServerError::Migrate`] if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), ServerError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
