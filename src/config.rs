//! Configuration types and environment loading.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Default model when `CLINIC_ASSIST_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default path to the schedule data file.
pub const DEFAULT_DATA_PATH: &str = "./data/appointments.json";

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Which LLM backend to use.
    pub backend: LlmBackend,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Path to the JSON schedule data file.
    pub data_path: PathBuf,
    /// Maximum LLM calls allowed per workflow run.
    pub max_llm_calls: u32,
    /// Port for the optional HTTP front end (None = disabled).
    pub http_port: Option<u16>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Anthropic,
            model: DEFAULT_MODEL.to_string(),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            max_llm_calls: 5,
            http_port: None,
        }
    }
}

impl AssistantConfig {
    /// Build configuration from `CLINIC_ASSIST_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("CLINIC_ASSIST_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "anthropic" => LlmBackend::Anthropic,
                "openai" => LlmBackend::OpenAi,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "CLINIC_ASSIST_BACKEND".into(),
                        message: format!("unknown backend '{other}' (expected anthropic or openai)"),
                    });
                }
            };
        }

        if let Ok(model) = std::env::var("CLINIC_ASSIST_MODEL") {
            config.model = model;
        }

        if let Ok(path) = std::env::var("CLINIC_ASSIST_DATA") {
            config.data_path = PathBuf::from(path);
        }

        if let Ok(raw) = std::env::var("CLINIC_ASSIST_MAX_LLM_CALLS") {
            config.max_llm_calls = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLINIC_ASSIST_MAX_LLM_CALLS".into(),
                message: format!("'{raw}' is not a positive integer"),
            })?;
        }

        if let Ok(raw) = std::env::var("CLINIC_ASSIST_HTTP_PORT") {
            let port = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CLINIC_ASSIST_HTTP_PORT".into(),
                message: format!("'{raw}' is not a valid port"),
            })?;
            config.http_port = Some(port);
        }

        Ok(config)
    }

    /// Read the provider API key from the environment.
    ///
    /// Anthropic reads `ANTHROPIC_API_KEY`, OpenAI reads `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        let var = match self.backend {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };
        std::env::var(var)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AssistantConfig::default();
        assert_eq!(config.max_llm_calls, 5);
        assert_eq!(config.backend, LlmBackend::Anthropic);
        assert!(config.http_port.is_none());
        assert!(config.data_path.to_string_lossy().contains("appointments"));
    }
}
