//! Configuration loading and validation for Parley.
//!
//! Loads configuration from `parley.toml` (path overridable via
//! `PARLEY_CONFIG`) with environment variable overrides for secrets.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `parley.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Token issuance / verification settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path or URL. `":memory:"` gives an ephemeral database.
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "parley.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Completion provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider. Prefer the environment variables
    /// `PARLEY_API_KEY` / `ANTHROPIC_API_KEY` over putting this in a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider base URL (testing, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Output token budget per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// When true, provider failures abort the send instead of substituting
    /// the fallback reply.
    #[serde(default)]
    pub strict: bool,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            strict: false,
        }
    }
}

/// Token issuance / verification settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Must be set (config or `PARLEY_JWT_SECRET`)
    /// before the server will start.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_expire_minutes")]
    pub token_expire_minutes: i64,
}

fn default_expire_minutes() -> i64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expire_minutes: default_expire_minutes(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(present: bool) -> &'static str {
    if present { "[REDACTED]" } else { "None" }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("provider", &self.provider)
            .field("auth", &self.auth)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(self.api_key.is_some()))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("strict", &self.strict)
            .finish()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &redact(!self.jwt_secret.is_empty()))
            .field("token_expire_minutes", &self.token_expire_minutes)
            .finish()
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl AppConfig {
    /// Load configuration from the default path (`parley.toml`, or the
    /// path in `PARLEY_CONFIG`), then apply environment overrides:
    ///
    /// - `PARLEY_API_KEY` / `ANTHROPIC_API_KEY`
    /// - `PARLEY_DATABASE_URL`
    /// - `PARLEY_JWT_SECRET`
    /// - `PARLEY_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PARLEY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("parley.toml"));
        let mut config = Self::load_from(&path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("PARLEY_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("PARLEY_DATABASE_URL") {
            config.database.url = url;
        }

        if let Ok(secret) = std::env::var("PARLEY_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }

        if let Ok(port) = std::env::var("PARLEY_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PARLEY_PORT not a port: {port}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }

        if self.auth.token_expire_minutes <= 0 {
            return Err(ConfigError::Validation(
                "auth.token_expire_minutes must be positive".into(),
            ));
        }

        if self.provider.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "provider.max_tokens must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Whether a signing secret is available. Required to serve.
    pub fn has_jwt_secret(&self) -> bool {
        !self.auth.jwt_secret.is_empty()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.provider.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.provider.max_tokens, 2000);
        assert!(!config.provider.strict);
        assert!(!config.has_jwt_secret());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/parley.toml")).unwrap();
        assert_eq!(config.database.url, "parley.db");
    }

    #[test]
    fn parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            port = 9001

            [provider]
            model = "claude-3-opus-20240229"
            strict = true
            "#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.provider.model, "claude-3-opus-20240229");
        assert!(config.provider.strict);
        // untouched sections keep defaults
        assert_eq!(config.auth.token_expire_minutes, 60);
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-ant-secret".into());
        config.auth.jwt_secret = "signing-secret".into();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(!debug.contains("signing-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
