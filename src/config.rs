//! Process configuration.
//!
//! Built once at startup (from the environment or a TOML file) and shared
//! read-only through an `Arc`. Business logic never reads the environment.

use crate::llm::{Credentials, GatewayError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_FREE_MODEL: &str = "gemini-1.0-pro";
pub const DEFAULT_PAID_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// One model slot: which model to call and with which key.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: Some(model_id.into()),
            api_key: Some(api_key.into()),
        }
    }

    /// Resolves both fields or reports which one is missing.
    pub fn credentials(&self) -> Result<Credentials, GatewayError> {
        let api_key = present(&self.api_key).ok_or(GatewayError::MissingCredential)?;
        let model_id = present(&self.model_id).ok_or(GatewayError::MissingModel)?;
        Ok(Credentials {
            model_id: model_id.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub free_chat: ModelConfig,
    #[serde(default)]
    pub paid_chat: ModelConfig,
    /// Schedule generation and recommendation reformatting.
    #[serde(default)]
    pub accessory: ModelConfig,
    /// Recommendation analysis.
    #[serde(default)]
    pub recommendations: ModelConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Reads the process environment, loading `.env` first when present.
    pub fn from_env() -> Self {
        if dotenv::dotenv().is_ok() {
            info!("Loaded variables from .env");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let free_model = var("FREE_CHAT_MODEL_NAME").unwrap_or_else(|| DEFAULT_FREE_MODEL.into());
        let accessory_model =
            var("FREE_ACCESSORY_MODEL_NAME").unwrap_or_else(|| DEFAULT_FREE_MODEL.into());
        let paid_model = var("PAID_MODEL_NAME").unwrap_or_else(|| DEFAULT_PAID_MODEL.into());

        let timeout = match var("GENERATIVE_API_TIMEOUT_SECONDS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Ignoring unparseable GENERATIVE_API_TIMEOUT_SECONDS");
                DEFAULT_TIMEOUT_SECONDS
            }),
            None => DEFAULT_TIMEOUT_SECONDS,
        };

        Self {
            free_chat: ModelConfig {
                model_id: Some(free_model),
                api_key: var("GOOGLE_API_KEY_FREE_CHAT"),
            },
            paid_chat: ModelConfig {
                model_id: Some(paid_model.clone()),
                api_key: var("GOOGLE_API_KEY_PAID"),
            },
            accessory: ModelConfig {
                model_id: Some(accessory_model),
                api_key: var("GOOGLE_API_KEY_FREE_ACCESSORY"),
            },
            recommendations: ModelConfig {
                model_id: Some(paid_model),
                api_key: var("GOOGLE_API_KEY_RECOMMENDATIONS")
                    .or_else(|| var("GOOGLE_API_KEY_RECOMENDATIONS")),
            },
            backend: BackendConfig {
                base_url: var("GENERATIVE_API_BASE_URL").unwrap_or_else(default_base_url),
                request_timeout_seconds: timeout,
            },
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// TOML file when a path is given, the environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config = Self::from_toml_str(&raw)?;
                info!(path = %path.display(), "Loaded configuration file");
                Ok(config)
            }
            None => Ok(Self::from_env()),
        }
    }

    pub fn chat_model(&self, use_paid_tier: bool) -> &ModelConfig {
        if use_paid_tier {
            &self.paid_chat
        } else {
            &self.free_chat
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        free_chat: ModelConfig::new("free-model", "free-key"),
        paid_chat: ModelConfig::new("paid-model", "paid-key"),
        accessory: ModelConfig::new("accessory-model", "accessory-key"),
        recommendations: ModelConfig::new("paid-model", "recommendations-key"),
        backend: BackendConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn environment_defaults_models_and_leaves_keys_empty() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.free_chat.model_id.as_deref(), Some(DEFAULT_FREE_MODEL));
        assert_eq!(config.paid_chat.model_id.as_deref(), Some(DEFAULT_PAID_MODEL));
        assert_eq!(config.recommendations.model_id.as_deref(), Some(DEFAULT_PAID_MODEL));
        assert_eq!(config.free_chat.api_key, None);
        assert_eq!(config.backend, BackendConfig::default());
        assert!(matches!(
            config.free_chat.credentials(),
            Err(GatewayError::MissingCredential)
        ));
    }

    #[test]
    fn legacy_recommendation_key_and_empty_values() {
        let config = Config::from_lookup(lookup(&[
            ("GOOGLE_API_KEY_RECOMENDATIONS", "legacy"),
            ("GOOGLE_API_KEY_PAID", "  "),
            ("PAID_MODEL_NAME", "gemini-pro-x"),
            ("GENERATIVE_API_TIMEOUT_SECONDS", "15"),
        ]));
        assert_eq!(config.recommendations.api_key.as_deref(), Some("legacy"));
        assert_eq!(config.paid_chat.api_key, None);
        assert_eq!(config.paid_chat.model_id.as_deref(), Some("gemini-pro-x"));
        assert_eq!(config.backend.request_timeout_seconds, 15);
    }

    #[test]
    fn missing_model_is_reported_after_key() {
        let slot = ModelConfig {
            model_id: Some(" ".into()),
            api_key: Some("key".into()),
        };
        assert!(matches!(slot.credentials(), Err(GatewayError::MissingModel)));
    }

    #[test]
    fn debug_output_redacts_key() {
        let rendered = format!("{:?}", ModelConfig::new("m", "super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[free_chat]
model_id = "gemini-1.0-pro"
api_key = "abc"

[backend]
base_url = "http://localhost:8080"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.free_chat.credentials().unwrap().api_key, "abc");
        assert_eq!(config.paid_chat, ModelConfig::default());
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.request_timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.chat_model(false), &config.free_chat);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("free_chat = 3"),
            Err(ConfigError::Toml(_))
        ));
    }
}
