use std::path::PathBuf;

use thiserror::Error;

use crate::models::ScanStrategy;
use crate::pipeline::classification::gemini::GeminiSettings;

/// Application-level constants
pub const APP_NAME: &str = "Sensiscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "sensiscan_lib=info,sensiscan=info,warn"
}

/// Get the application data directory (~/Sensiscan/).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the scan results database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("scans.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings for the scan pipeline.
#[derive(Clone)]
pub struct ScanConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub max_attempts: usize,
    pub strategy: ScanStrategy,
    pub database_path: PathBuf,
    /// Tesseract language data, used by the local strategy when built with `ocr`.
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: crate::pipeline::classification::MAX_RETRIES,
            strategy: ScanStrategy::Remote,
            database_path: default_database_path(),
            tessdata_dir: None,
        }
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy)
            .field("database_path", &self.database_path)
            .field("tessdata_dir", &self.tessdata_dir)
            .finish()
    }
}

impl ScanConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    ///
    /// `API_KEY` is accepted as a fallback for `SENSISCAN_API_KEY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("SENSISCAN_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|k| !k.trim().is_empty());

        if let Some(url) = lookup("SENSISCAN_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("SENSISCAN_MODEL") {
            config.model = model;
        }
        if let Some(raw) = lookup("SENSISCAN_TIMEOUT_SECS") {
            config.request_timeout_secs = raw.parse().map_err(|_| ConfigError::Invalid {
                key: "SENSISCAN_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("SENSISCAN_MAX_ATTEMPTS") {
            config.max_attempts = match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SENSISCAN_MAX_ATTEMPTS",
                        value: raw,
                    })
                }
            };
        }
        if let Some(raw) = lookup("SENSISCAN_STRATEGY") {
            config.strategy = raw.parse().map_err(|_| ConfigError::Invalid {
                key: "SENSISCAN_STRATEGY",
                value: raw.clone(),
            })?;
        }
        if let Some(path) = lookup("SENSISCAN_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        config.tessdata_dir = lookup("SENSISCAN_TESSDATA").map(PathBuf::from);

        Ok(config)
    }

    /// Settings for the remote classifier. Requires an API key.
    pub fn gemini_settings(&self) -> Result<GeminiSettings, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("SENSISCAN_API_KEY"))?;

        Ok(GeminiSettings {
            api_key,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.request_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with(APP_NAME));
        assert!(default_database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_without_environment() {
        let config = ScanConfig::from_lookup(|_| None).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.strategy, ScanStrategy::Remote);
    }

    #[test]
    fn reads_overrides() {
        let config = ScanConfig::from_lookup(lookup_from(&[
            ("SENSISCAN_API_KEY", "secret"),
            ("SENSISCAN_BASE_URL", "http://localhost:9000/"),
            ("SENSISCAN_MODEL", "gemini-2.0-flash"),
            ("SENSISCAN_TIMEOUT_SECS", "15"),
            ("SENSISCAN_MAX_ATTEMPTS", "5"),
            ("SENSISCAN_STRATEGY", "local"),
            ("SENSISCAN_DATABASE", "/tmp/scans.db"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.strategy, ScanStrategy::Local);
        assert_eq!(config.database_path, PathBuf::from("/tmp/scans.db"));
    }

    #[test]
    fn legacy_api_key_variable_is_accepted() {
        let config = ScanConfig::from_lookup(lookup_from(&[("API_KEY", "legacy")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("legacy"));
    }

    #[test]
    fn rejects_zero_attempts() {
        let result = ScanConfig::from_lookup(lookup_from(&[("SENSISCAN_MAX_ATTEMPTS", "0")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "SENSISCAN_MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let result = ScanConfig::from_lookup(lookup_from(&[("SENSISCAN_STRATEGY", "hybrid")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn gemini_settings_require_api_key() {
        let config = ScanConfig::default();
        assert!(matches!(
            config.gemini_settings(),
            Err(ConfigError::Missing("SENSISCAN_API_KEY"))
        ));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = ScanConfig::from_lookup(lookup_from(&[("SENSISCAN_API_KEY", "hunter2")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
