//! API configuration module.
//!
//! Values come from, lowest to highest precedence:
//! built-in defaults, an optional `retail.toml` next to the binary, then
//! environment variables (a `.env` file is loaded first by `main`).
//!
//! | Variable | Default |
//! |---|---|
//! | `HTTP_PORT` | 8080 |
//! | `DATABASE_PATH` | `./retail.db` |
//! | `DATABASE_MAX_CONNECTIONS` | 5 |
//! | `JWT_SECRET` | dev secret (rejected in production) |
//! | `JWT_EXPIRY_HOURS` | 24 |
//! | `CORS_ORIGINS` | empty (permissive) |
//! | `APP_ENV` | `development` |
//! | `MPESA_*` | unset (payments disabled) |

use serde::Deserialize;

use crate::mpesa::MpesaConfig;

const DEV_JWT_SECRET: &str = "retail-dev-secret-change-in-production";
const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub http_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,

    /// HMAC secret for JWT signing.
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    /// Comma-separated allowed origins; empty allows any.
    pub cors_origins: String,

    /// `development` or `production`.
    pub app_env: String,

    pub mpesa_consumer_key: Option<String>,
    pub mpesa_consumer_secret: Option<String>,
    pub mpesa_shortcode: Option<String>,
    pub mpesa_passkey: Option<String>,
    pub mpesa_callback_url: Option<String>,
    pub mpesa_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            database_path: "./retail.db".to_string(),
            database_max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24,
            cors_origins: String::new(),
            app_env: "development".to_string(),
            mpesa_consumer_key: None,
            mpesa_consumer_secret: None,
            mpesa_shortcode: None,
            mpesa_passkey: None,
            mpesa_callback_url: None,
            mpesa_base_url: SANDBOX_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `retail.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("retail").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: ApiConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::InvalidValue("HTTP_PORT".to_string()));
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }
        if self.jwt_expiry_hours <= 0 {
            return Err(ConfigError::InvalidValue("JWT_EXPIRY_HOURS".to_string()));
        }
        if self.jwt_secret.trim().is_empty()
            || (self.is_production() && self.jwt_secret == DEV_JWT_SECRET)
        {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Gateway settings, present only when every credential is set.
    pub fn mpesa(&self) -> Option<MpesaConfig> {
        Some(MpesaConfig {
            base_url: self.mpesa_base_url.trim_end_matches('/').to_string(),
            consumer_key: non_empty(&self.mpesa_consumer_key)?,
            consumer_secret: non_empty(&self.mpesa_consumer_secret)?,
            shortcode: non_empty(&self.mpesa_shortcode)?,
            passkey: non_empty(&self.mpesa_passkey)?,
            callback_url: non_empty(&self.mpesa_callback_url)?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.mpesa().is_none());
        assert!(config.cors_origin_list().is_empty());
    }

    #[test]
    fn test_production_needs_real_secret() {
        let config = ApiConfig {
            app_env: "production".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_mpesa_requires_every_credential() {
        let mut config = ApiConfig {
            mpesa_consumer_key: Some("key".to_string()),
            mpesa_consumer_secret: Some("secret".to_string()),
            mpesa_shortcode: Some("174379".to_string()),
            mpesa_passkey: Some("passkey".to_string()),
            mpesa_callback_url: Some("https://example.com/cb".to_string()),
            mpesa_base_url: "https://sandbox.safaricom.co.ke/".to_string(),
            ..Default::default()
        };
        let mpesa = config.mpesa().unwrap();
        assert_eq!(mpesa.base_url, "https://sandbox.safaricom.co.ke");

        config.mpesa_passkey = Some("  ".to_string());
        assert!(config.mpesa().is_none());
    }

    #[test]
    fn test_cors_origin_list() {
        let config = ApiConfig {
            cors_origins: "http://localhost:3000, https://shop.example.com,".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.cors_origin_list(),
            vec!["http://localhost:3000", "https://shop.example.com"]
        );
    }
}
