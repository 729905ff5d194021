//! Server settings from flags and environment variables.

use std::fmt;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

/// JWT secret used when neither `JWT_SECRET_KEY` nor `SECRET_KEY` is set.
pub const DEV_SECRET: &str = "dev-secret-key-change-in-production";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    /// Fast password hashing, dev secret allowed.
    Development,
    /// Strong password hashing, a real secret is required.
    Production,
}

impl Environment {
    /// Lowercase name, as reported by the index route.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    fn default_bcrypt_cost(self) -> u32 {
        match self {
            Self::Development => 4,
            Self::Production => 12,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings could not be turned into a [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Production was requested without a JWT secret.
    #[error("refusing to start in production with the development JWT secret; set JWT_SECRET_KEY")]
    DevSecretInProduction,

    /// bcrypt accepts costs 4 through 31.
    #[error("bcrypt cost {cost} outside 4..=31")]
    InvalidBcryptCost {
        /// Requested cost.
        cost: u32,
    },
}

/// Flags of the `serve` command. Every flag also reads an environment variable.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Deployment environment.
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// SQLite connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://instance/predictions.db?mode=rwc")]
    pub database_url: String,

    /// Trained model artifact.
    #[arg(long, env = "MODEL_PATH", default_value = "ml_models/crop_recommendation_model.bin")]
    pub model_path: PathBuf,

    /// Fitted scaler artifact.
    #[arg(long, env = "SCALER_PATH", default_value = "ml_models/scaler.bin")]
    pub scaler_path: PathBuf,

    /// Training CSV, used when artifacts or reports are missing.
    #[arg(long, env = "DATASET_PATH", default_value = "Data/Crop_recommendation.csv")]
    pub dataset_path: PathBuf,

    /// Directory holding the comparison and maturity reports.
    #[arg(long, env = "REPORTS_DIR", default_value = ".")]
    pub reports_dir: PathBuf,

    /// HMAC secret for tokens [default: `SECRET_KEY`, then a development value]
    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Fallback secret.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true, hide = true)]
    pub secret_key: Option<String>,

    /// Access token lifetime in seconds.
    #[arg(long, env = "JWT_ACCESS_TOKEN_EXPIRES", default_value_t = 3600)]
    pub access_token_ttl: i64,

    /// Refresh token lifetime in seconds.
    #[arg(long, env = "JWT_REFRESH_TOKEN_EXPIRES", default_value_t = 604_800)]
    pub refresh_token_ttl: i64,

    /// bcrypt cost [default: 4 in development, 12 in production]
    #[arg(long, env = "BCRYPT_LOG_ROUNDS")]
    pub bcrypt_cost: Option<u32>,

    /// Attach feature-contribution reasons to predictions.
    #[arg(
        long,
        env = "ENABLE_SHAP",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub enable_shap: bool,
}

impl ServeArgs {
    /// Resolve fallbacks and check the result.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ConfigError::DevSecretInProduction`] | production without `JWT_SECRET_KEY` or `SECRET_KEY` |
    /// | [`ConfigError::InvalidBcryptCost`] | cost outside 4..=31 |
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let jwt_secret = self
            .jwt_secret
            .or(self.secret_key)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEV_SECRET.to_string());
        if self.environment == Environment::Production && jwt_secret == DEV_SECRET {
            return Err(ConfigError::DevSecretInProduction);
        }
        let bcrypt_cost = self.bcrypt_cost.unwrap_or(self.environment.default_bcrypt_cost());
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost { cost: bcrypt_cost });
        }
        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            environment: self.environment,
            database_url: self.database_url,
            model_path: self.model_path,
            scaler_path: self.scaler_path,
            dataset_path: self.dataset_path,
            reports_dir: self.reports_dir,
            jwt_secret,
            access_token_ttl: self.access_token_ttl,
            refresh_token_ttl: self.refresh_token_ttl,
            bcrypt_cost,
            enable_explainer: self.enable_shap,
        })
    }
}

/// Resolved server settings.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Deployment environment.
    pub environment: Environment,
    /// SQLite connection URL.
    pub database_url: String,
    /// Model artifact path.
    pub model_path: PathBuf,
    /// Scaler artifact path.
    pub scaler_path: PathBuf,
    /// Training CSV path.
    pub dataset_path: PathBuf,
    /// Report directory.
    pub reports_dir: PathBuf,
    /// HMAC secret for tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl: i64,
    /// bcrypt cost factor.
    pub bcrypt_cost: u32,
    /// Whether predictions carry explainer reasons.
    pub enable_explainer: bool,
}

impl ServerConfig {
    /// Development defaults rooted at `base_dir`, with an in-memory database.
    #[must_use]
    pub fn local(base_dir: &std::path::Path) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Development,
            database_url: "sqlite::memory:".to_string(),
            model_path: base_dir.join("ml_models/crop_recommendation_model.bin"),
            scaler_path: base_dir.join("ml_models/scaler.bin"),
            dataset_path: base_dir.join("Data/Crop_recommendation.csv"),
            reports_dir: base_dir.to_path_buf(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl: 3600,
            refresh_token_ttl: 604_800,
            bcrypt_cost: 4,
            enable_explainer: true,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("model_path", &self.model_path)
            .field("scaler_path", &self.scaler_path)
            .field("dataset_path", &self.dataset_path)
            .field("reports_dir", &self.reports_dir)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("enable_explainer", &self.enable_explainer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        let mut argv = vec!["cropwise"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).serve
    }

    #[test]
    fn development_defaults() {
        let config = parse(&["--jwt-secret", "s3cret"]).into_config().unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.access_token_ttl, 3600);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert!(config.enable_explainer);
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn production_raises_cost_and_requires_secret() {
        let err = parse(&["--environment", "production", "--jwt-secret", ""]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::DevSecretInProduction));

        let config = parse(&["--environment", "production", "--jwt-secret", "prod-key"])
            .into_config()
            .unwrap();
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.environment.as_str(), "production");
    }

    #[test]
    fn explainer_can_be_disabled() {
        let config = parse(&["--jwt-secret", "k", "--enable-shap", "false"]).into_config().unwrap();
        assert!(!config.enable_explainer);
    }

    #[test]
    fn secret_not_in_debug_output() {
        let config = parse(&["--jwt-secret", "very-private"]).into_config().unwrap();
        assert!(!format!("{config:?}").contains("very-private"));
    }
}
