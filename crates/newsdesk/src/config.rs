use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use once_cell::sync::{Lazy, OnceCell};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub static APP_STRATEGY: Lazy<AppStrategyArgs> = Lazy::new(|| AppStrategyArgs {
    top_level_domain: "Newsdesk".to_string(),
    author: "Newsdesk".to_string(),
    app_name: "newsdesk".to_string(),
});

/// Overrides the location of `config.yaml`; `secrets.yaml` is read from the same directory.
pub const CONFIG_PATH_ENV: &str = "NEWSDESK_CONFIG_PATH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration value not found: {0}")]
    NotFound(String),
    #[error("Failed to deserialize value: {0}")]
    DeserializeError(String),
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to locate config directory: {0}")]
    DirectoryError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

/// Read-only configuration for newsdesk.
///
/// Values are loaded with the following precedence:
/// 1. Environment variables (key upper-cased)
/// 2. Configuration file (~/.config/newsdesk/config.yaml by default)
///
/// Secrets follow the same order but fall back to `secrets.yaml` instead of
/// `config.yaml`, so API keys never have to live next to ordinary settings.
///
/// Environment values are decoded as JSON when possible, so `OPENAI_TIMEOUT=30`
/// deserializes as a number and `NEWSDESK_MODEL=gpt-4o-mini` as a string.
pub struct Config {
    config_path: PathBuf,
    secrets_path: PathBuf,
}

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    /// Get the global configuration instance, resolving the default paths on first use.
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(|| match Config::from_default_location() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Falling back to working directory for config: {}", e);
                Config::new("config.yaml", "secrets.yaml")
            }
        })
    }

    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(config_path: P1, secrets_path: P2) -> Self {
        Config {
            config_path: config_path.as_ref().to_path_buf(),
            secrets_path: secrets_path.as_ref().to_path_buf(),
        }
    }

    fn from_default_location() -> Result<Self, ConfigError> {
        let config_path = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => choose_app_strategy(APP_STRATEGY.clone())
                .map_err(|e| ConfigError::DirectoryError(e.to_string()))?
                .config_dir()
                .join("config.yaml"),
        };
        let secrets_path = config_path
            .parent()
            .map(|dir| dir.join("secrets.yaml"))
            .unwrap_or_else(|| PathBuf::from("secrets.yaml"));
        Ok(Config::new(config_path, secrets_path))
    }

    pub fn path(&self) -> String {
        self.config_path.to_string_lossy().to_string()
    }

    pub fn load_values(&self) -> Result<HashMap<String, Value>, ConfigError> {
        load_yaml_map(&self.config_path)
    }

    pub fn load_secrets(&self) -> Result<HashMap<String, Value>, ConfigError> {
        load_yaml_map(&self.secrets_path)
    }

    /// Get a configuration value (non-secret).
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the key is in neither the environment nor the
    /// config file, or if the value cannot be deserialized into `T`.
    pub fn get_param<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = from_env(key) {
            return Ok(serde_json::from_value(value)?);
        }
        let values = self.load_values()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }

    /// Like [`Config::get_param`], but a key that is not set yields `None`.
    ///
    /// A value that is set but fails to deserialize is still an error.
    pub fn get_optional_param<T: for<'de> Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        match self.get_param(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a secret value from the environment or the secrets file.
    pub fn get_secret<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = from_env(key) {
            return Ok(serde_json::from_value(value)?);
        }
        let values = self.load_secrets()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }
}

fn from_env(key: &str) -> Option<Value> {
    let val = env::var(key.to_uppercase()).ok()?;
    Some(serde_json::from_str(&val).unwrap_or(Value::String(val)))
}

fn load_yaml_map(path: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content)?;
    let json_value: Value = serde_json::to_value(yaml_value)?;
    match json_value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_file_value_and_env_override() {
        let config_file = write_yaml("newsdesk_model: gpt-4.1-mini\n");
        let dir = TempDir::new().unwrap();
        let config = Config::new(config_file.path(), dir.path().join("secrets.yaml"));

        temp_env::with_var_unset("NEWSDESK_MODEL", || {
            let value: String = config.get_param("newsdesk_model").unwrap();
            assert_eq!(value, "gpt-4.1-mini");
        });

        temp_env::with_var("NEWSDESK_MODEL", Some("gpt-4o"), || {
            let value: String = config.get_param("newsdesk_model").unwrap();
            assert_eq!(value, "gpt-4o");
        });
    }

    #[test]
    #[serial]
    fn test_env_values_are_json_decoded() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));

        temp_env::with_var("OPENAI_TIMEOUT", Some("30"), || {
            let value: u64 = config.get_param("OPENAI_TIMEOUT").unwrap();
            assert_eq!(value, 30);
        });
    }

    #[test]
    #[serial]
    fn test_missing_value() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));

        temp_env::with_var_unset("NONEXISTENT_KEY", || {
            let result: Result<String, ConfigError> = config.get_param("nonexistent_key");
            assert!(matches!(result, Err(ConfigError::NotFound(_))));
        });
    }

    #[test]
    #[serial]
    fn test_optional_param_distinguishes_missing_from_malformed() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));

        temp_env::with_var_unset("NEWSDESK_FETCH_TIMEOUT", || {
            let value: Option<u64> = config.get_optional_param("NEWSDESK_FETCH_TIMEOUT").unwrap();
            assert_eq!(value, None);
        });

        temp_env::with_var("NEWSDESK_FETCH_TIMEOUT", Some("45"), || {
            let value: Option<u64> = config.get_optional_param("NEWSDESK_FETCH_TIMEOUT").unwrap();
            assert_eq!(value, Some(45));
        });

        temp_env::with_var("NEWSDESK_FETCH_TIMEOUT", Some("soon"), || {
            let result: Result<Option<u64>, ConfigError> =
                config.get_optional_param("NEWSDESK_FETCH_TIMEOUT");
            assert!(matches!(result, Err(ConfigError::DeserializeError(_))));
        });
    }

    #[test]
    #[serial]
    fn test_secrets_come_from_secrets_file() {
        let config_file = write_yaml("BRAVE_API_KEY: not-a-secret\n");
        let secrets_file = write_yaml("BRAVE_API_KEY: from-secrets\n");
        let config = Config::new(config_file.path(), secrets_file.path());

        temp_env::with_var_unset("BRAVE_API_KEY", || {
            let value: String = config.get_secret("BRAVE_API_KEY").unwrap();
            assert_eq!(value, "from-secrets");
        });
    }

    #[test]
    fn test_malformed_yaml_is_a_deserialize_error() {
        let config_file = write_yaml("key: [unterminated\n");
        let dir = TempDir::new().unwrap();
        let config = Config::new(config_file.path(), dir.path().join("secrets.yaml"));

        assert!(matches!(
            config.load_values(),
            Err(ConfigError::DeserializeError(_))
        ));
    }
}
