//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default API base URL (can be overridden at compile time via CAMPUS_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("CAMPUS_API_URL") {
    Some(url) => url,
    None => "https://api.campus.education/api/v1/",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Number of distinct content views a guest gets before the usage-limit prompt.
pub const DEFAULT_USAGE_LIMIT_THRESHOLD: u32 = 2;

/// User agent sent with every request and mixed into the guest fingerprint.
pub const DEFAULT_USER_AGENT: &str = concat!("campus-client/", env!("CARGO_PKG_VERSION"));

/// What the HTTP client does after a `TOKEN_EXPIRED` rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenExpiryMode {
    /// Refresh, then abandon the request and ask the UI to re-authenticate.
    #[default]
    ForceReauth,
    /// Refresh, then re-issue the request exactly once.
    RetryOnce,
}

impl std::str::FromStr for TokenExpiryMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force_reauth" | "force-reauth" => Ok(Self::ForceReauth),
            "retry_once" | "retry-once" => Ok(Self::RetryOnce),
            other => Err(CoreError::Config(format!(
                "unknown token expiry mode: {}",
                other
            ))),
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL every API path is resolved against.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request timeout. `None` keeps the transport default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Behaviour after an access token is rejected as expired.
    #[serde(default)]
    pub token_expiry_mode: TokenExpiryMode,
    /// Guest content views before the usage-limit prompt opens.
    #[serde(default = "default_usage_limit_threshold")]
    pub usage_limit_threshold: u32,
    /// User agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_usage_limit_threshold() -> u32 {
    DEFAULT_USAGE_LIMIT_THRESHOLD
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: None,
            token_expiry_mode: TokenExpiryMode::default(),
            usage_limit_threshold: DEFAULT_USAGE_LIMIT_THRESHOLD,
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from the process environment.
    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// Empty values are ignored. An unparseable expiry mode is logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = lookup("CAMPUS_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = lookup("CAMPUS_API_URL") {
            self.api_base_url = url;
        }
        if let Some(mode) = lookup("CAMPUS_TOKEN_EXPIRY_MODE") {
            match mode.parse() {
                Ok(mode) => self.token_expiry_mode = mode,
                Err(e) => tracing::warn!(error = %e, "ignoring CAMPUS_TOKEN_EXPIRY_MODE"),
            }
        }
    }

    /// Check values that would otherwise fail late, at request time.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.usage_limit_threshold == 0 {
            return Err(CoreError::Config(
                "usage_limit_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The API base URL, parsed and normalized to end with `/` so that
    /// relative paths join beneath it.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_expiry_mode, TokenExpiryMode::ForceReauth);
        assert_eq!(config.usage_limit_threshold, 2);
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "token_expiry_mode": "retry_once" }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.token_expiry_mode, TokenExpiryMode::RetryOnce);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.usage_limit_threshold, DEFAULT_USAGE_LIMIT_THRESHOLD);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.api_base_url = "http://localhost:8000/api/".to_string();
        config.request_timeout_secs = Some(15);
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.api_base_url, "http://localhost:8000/api/");
        assert_eq!(loaded.request_timeout_secs, Some(15));
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.usage_limit_threshold, DEFAULT_USAGE_LIMIT_THRESHOLD);
    }

    #[test]
    fn test_overrides_apply_non_empty_values() {
        let env: HashMap<&str, &str> = [
            ("CAMPUS_LOG_LEVEL", "trace"),
            ("CAMPUS_API_URL", "   "),
            ("CAMPUS_TOKEN_EXPIRY_MODE", "retry-once"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_expiry_mode, TokenExpiryMode::RetryOnce);
    }

    #[test]
    fn test_invalid_expiry_mode_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| {
            (name == "CAMPUS_TOKEN_EXPIRY_MODE").then(|| "sometimes".to_string())
        });
        assert_eq!(config.token_expiry_mode, TokenExpiryMode::ForceReauth);
    }

    #[test]
    fn test_api_base_url_gets_trailing_slash() {
        let mut config = Config::default();
        config.api_base_url = "http://localhost:8000/api".to_string();

        let url = config.api_base_url().unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/");
        assert_eq!(
            url.join("auth/me").unwrap().as_str(),
            "http://localhost:8000/api/auth/me"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api_base_url = "not a valid url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.usage_limit_threshold = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
