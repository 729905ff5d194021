use chrono::{DateTime, Utc};
use cropwise_features::CropSample;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A stored prediction.
#[derive(Debug, Clone, FromRow)]
pub struct PredictionRecord {
    /// Row id.
    pub id: i64,
    /// Owner, `None` once the account is deleted.
    pub user_id: Option<i64>,
    /// Correlates with the API response and logs.
    pub request_id: String,
    /// Soil nitrogen.
    pub nitrogen: f64,
    /// Soil phosphorus.
    pub phosphorus: f64,
    /// Soil potassium.
    pub potassium: f64,
    /// °C.
    pub temperature: f64,
    /// %.
    pub humidity: f64,
    /// Soil pH.
    pub ph: f64,
    /// mm.
    pub rainfall: f64,
    /// Recommended crop.
    pub predicted_crop: String,
    /// Its probability.
    pub confidence: f64,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// The measurements as a sample, without re-checking bounds.
    #[must_use]
    pub fn sample(&self) -> CropSample {
        CropSample::from_array_unchecked([
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ])
    }
}

/// Fields needed to insert a prediction.
#[derive(Debug)]
pub struct NewPrediction<'a> {
    /// Owner.
    pub user_id: Option<i64>,
    /// Request correlation id.
    pub request_id: &'a str,
    /// Validated measurements.
    pub sample: &'a CropSample,
    /// Recommended crop.
    pub predicted_crop: &'a str,
    /// Its probability.
    pub confidence: f64,
}

/// Number of predictions of one crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CropCount {
    /// Crop name.
    pub predicted_crop: String,
    /// Predictions.
    pub count: i64,
}

const COLUMNS: &str = "id, user_id, request_id, nitrogen, phosphorus, potassium, temperature, humidity, ph, \
                       rainfall, predicted_crop, confidence, created_at";

/// Queries on the `predictions` table.
pub struct PredictionRepository;

impl PredictionRepository {
    /// Insert a prediction and return its row id.
    ///
    /// # Errors
    ///
    /// Returns the database error.
    pub async fn insert(pool: &SqlitePool, prediction: NewPrediction<'_>) -> Result<i64, sqlx::Error> {
        let s = prediction.sample;
        let result = sqlx::query(
            "INSERT INTO predictions (user_id, request_id, nitrogen, phosphorus, potassium, temperature, \
             humidity, ph, rainfall, predicted_crop, confidence, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(prediction.user_id)
        .bind(prediction.request_id)
        .bind(s.n)
        .bind(s.p)
        .bind(s.k)
        .bind(s.temperature)
        .bind(s.humidity)
        .bind(s.ph)
        .bind(s.rainfall)
        .bind(prediction.predicted_crop)
        .bind(prediction.confidence)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The user's most recent predictions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent_for_user(
        pool: &SqlitePool,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PredictionRecord>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(&format!(
            "SELECT {COLUMNS} FROM predictions WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Total stored predictions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions").fetch_one(pool).await?;
        Ok(n)
    }

    /// Predictions owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(n)
    }

    /// Prediction counts per crop, most frequent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn crop_distribution(pool: &SqlitePool) -> Result<Vec<CropCount>, sqlx::Error> {
        sqlx::query_as::<_, CropCount>(
            "SELECT predicted_crop, COUNT(*) AS count FROM predictions \
             GROUP BY predicted_crop ORDER BY count DESC, predicted_crop",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository, connect, run_migrations};

    async fn pool() -> SqlitePool {
        let pool = connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn history_is_per_user_and_newest_first() {
        let pool = pool().await;
        let alice = UserRepository::create(
            &pool,
            NewUser {
                email: "alice@example.com",
                username: "alice",
                password_hash: "x",
            },
        )
        .await
        .unwrap();
        let sample = CropSample::new(90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9).unwrap();
        for (i, crop) in ["rice", "maize", "rice"].iter().enumerate() {
            PredictionRepository::insert(
                &pool,
                NewPrediction {
                    user_id: Some(alice.id),
                    request_id: &format!("req-{i}"),
                    sample: &sample,
                    predicted_crop: crop,
                    confidence: 0.9,
                },
            )
            .await
            .unwrap();
        }
        PredictionRepository::insert(
            &pool,
            NewPrediction {
                user_id: None,
                request_id: "anon",
                sample: &sample,
                predicted_crop: "coffee",
                confidence: 0.5,
            },
        )
        .await
        .unwrap();

        let recent = PredictionRepository::recent_for_user(&pool, alice.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].request_id, "req-2");
        assert_eq!(recent[1].request_id, "req-1");
        assert_eq!(recent[0].sample(), sample);

        assert_eq!(PredictionRepository::count(&pool).await.unwrap(), 4);
        assert_eq!(PredictionRepository::count_for_user(&pool, alice.id).await.unwrap(), 3);
        let distribution = PredictionRepository::crop_distribution(&pool).await.unwrap();
        assert_eq!(
            distribution[0],
            CropCount {
                predicted_crop: "rice".into(),
                count: 2
            }
        );
        assert_eq!(distribution.len(), 3);
    }

    #[tokio::test]
    async fn deleting_user_keeps_predictions() {
        let pool = pool().await;
        let bob = UserRepository::create(
            &pool,
            NewUser {
                email: "bob@example.com",
                username: "bob",
                password_hash: "x",
            },
        )
        .await
        .unwrap();
        let sample = CropSample::new(20.0, 60.0, 20.0, 25.0, 60.0, 6.0, 100.0).unwrap();
        PredictionRepository::insert(
            &pool,
            NewPrediction {
                user_id: Some(bob.id),
                request_id: "r",
                sample: &sample,
                predicted_crop: "maize",
                confidence: 0.7,
            },
        )
        .await
        .unwrap();
        UserRepository::delete(&pool, bob.id).await.unwrap();
        assert_eq!(PredictionRepository::count(&pool).await.unwrap(), 1);
        assert!(UserRepository::find_by_id(&pool, bob.id).await.unwrap().is_none());
    }
}
