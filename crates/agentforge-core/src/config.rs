//! Runtime configuration
//!
//! Loaded from a TOML or YAML file (chosen by extension), then overridden by
//! environment variables. Outer surfaces may apply CLI flags on top before
//! calling [`ForgeConfig::validate`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::telemetry::LogFormat;

pub const ENV_BACKEND_URL: &str = "AGENTFORGE_BACKEND_URL";
pub const ENV_API_KEY: &str = "AGENTFORGE_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "AGENTFORGE_MODEL";
pub const ENV_LOG_FORMAT: &str = "AGENTFORGE_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format '{0}' (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generative backend connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible API, without the `/v1` suffix
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Transport timeout for a single generation
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// api_key stays out of Debug output
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Fallback filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub backend: BackendConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl ForgeConfig {
    /// Parse a config file, picking the format from its extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "toml" => Ok(toml::from_str(&raw)?),
            "yaml" | "yml" => Ok(serde_yaml::from_str(&raw)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Defaults or file contents, then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// Blank values are ignored. The API key falls back to `OPENAI_API_KEY`
    /// when neither the file nor `AGENTFORGE_API_KEY` supplies one.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BACKEND_URL) {
            self.backend.base_url = url;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.backend.api_key = Some(key);
        } else if self.backend.api_key.is_none() {
            self.backend.api_key = get(ENV_OPENAI_API_KEY);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.backend.model = model;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            match format.parse() {
                Ok(format) => self.logging.format = format,
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", ENV_LOG_FORMAT),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = &self.backend;
        if backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.base_url must not be empty".into()));
        }
        if !(backend.base_url.starts_with("http://") || backend.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                backend.base_url
            )));
        }
        if backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.model must not be empty".into()));
        }
        if backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid("backend.timeout_secs must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&backend.temperature) {
            return Err(ConfigError::Invalid(format!(
                "backend.temperature must be within 0..=2, got {}",
                backend.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ForgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.backend.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "http://localhost:11434"
model = "llama3"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ForgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:11434");
        assert_eq!(config.backend.model, "llama3");
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  port: 9090\nbackend:\n  temperature: 0.2").unwrap();

        let config = ForgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert!((config.backend.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ForgeConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ForgeConfig::from_file("/nonexistent/agentforge.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ForgeConfig::default();
        config.apply_overrides_from(env(&[
            (ENV_BACKEND_URL, "http://127.0.0.1:9999"),
            (ENV_MODEL, "  "),
            (ENV_OPENAI_API_KEY, "sk-openai"),
            (ENV_LOG_FORMAT, "json"),
        ]));

        assert_eq!(config.backend.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.backend.model, "gpt-4o-mini");
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_api_key_precedence() {
        let mut config = ForgeConfig::default();
        config.apply_overrides_from(env(&[
            (ENV_API_KEY, "sk-forge"),
            (ENV_OPENAI_API_KEY, "sk-openai"),
        ]));
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-forge"));

        let mut from_file = ForgeConfig::default();
        from_file.backend.api_key = Some("sk-file".to_string());
        from_file.apply_overrides_from(env(&[(ENV_OPENAI_API_KEY, "sk-openai")]));
        assert_eq!(from_file.backend.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ForgeConfig::default();
        config.backend.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ForgeConfig::default();
        config.backend.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = ForgeConfig::default();
        config.backend.base_url = "localhost:8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let mut config = BackendConfig::default();
        config.api_key = Some("sk-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
    }
}
