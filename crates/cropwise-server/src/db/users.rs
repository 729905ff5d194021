use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A registered account.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Lowercased email.
    pub email: String,
    /// Unique handle.
    pub username: String,
    /// bcrypt hash; never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Inactive accounts cannot log in.
    pub is_active: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login: Option<DateTime<Utc>>,
}

/// Fields needed to insert a user.
#[derive(Debug)]
pub struct NewUser<'a> {
    /// Lowercased email.
    pub email: &'a str,
    /// Unique handle.
    pub username: &'a str,
    /// bcrypt hash.
    pub password_hash: &'a str,
}

const COLUMNS: &str = "id, email, username, password_hash, is_active, created_at, last_login";

/// Queries on the `users` table.
pub struct UserRepository;

impl UserRepository {
    /// Insert a user and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns the database error, including unique violations on email or username.
    pub async fn create(pool: &SqlitePool, user: NewUser<'_>) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, password_hash, is_active, created_at) \
             VALUES (?, ?, ?, 1, ?) RETURNING {COLUMNS}"
        ))
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Find a user by row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by lowercased email.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Find a user whose email or username equals `identifier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_login(pool: &SqlitePool, identifier: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE email = ? OR username = ? LIMIT 1"
        ))
        .bind(identifier.trim().to_lowercase())
        .bind(identifier.trim())
        .fetch_optional(pool)
        .await
    }

    /// Stamp a successful login and return the refreshed row.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("UPDATE users SET last_login = ? WHERE id = ? RETURNING {COLUMNS}"))
            .bind(Utc::now())
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Enable or disable an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Remove an account; its predictions keep a null owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(pool).await?;
        Ok(())
    }
}
