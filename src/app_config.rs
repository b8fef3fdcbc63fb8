use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Process configuration, read from the environment (and `.env`).
/// Nested keys use `__`, e.g. `PG__HOST`, `PG__DBNAME`.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub session_secret: String,
    #[serde(default)]
    pub pg: deadpool_postgres::Config,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Comma separated origins allowed to send credentialed requests.
    pub cors_origins: Option<String>,
}

fn default_port() -> u16 {
    8080
}

/// Signed session cookies need a 64 byte key.
pub const MIN_SECRET_LEN: usize = 64;

impl AppConfig {
    pub fn from_env() -> Result<AppConfig, ConfigError> {
        Config::builder()
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(())
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }

    /// Staff account to create at startup, when both halves are set.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}
