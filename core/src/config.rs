use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::{
    completion::CompletionError,
    providers::completions::{OpenAICompatible, Provider},
    tools::AvailabilityTool,
};

/// Names a JSON config file to load instead of the defaults
pub const CONFIG_ENV_VAR: &str = "SLOTDESK_CONFIG";

const DEFAULT_DATA_PATH: &str = "data/doctor_availability.csv";
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a medical assistant. If user asks about doctor availability, you MUST call the tool.";
const DEFAULT_PROMPT: &str = "What are the available slots for general dentist on 7-8-2024?";
const DEFAULT_TEMP: f64 = 1.0;
const DEFAULT_TOKENS: usize = 2400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to deserialize json config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No tools selected")]
    NoTools,
}

/// Everything the assistant binary needs, all fields optional in the JSON form.
///
/// ```json
/// {
///   "provider": "groq",
///   "model": "openai/gpt-oss-20b",
///   "data_path": "data/doctor_availability.csv",
///   "tools": ["check_availability_by_specialization"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AssistantConfig {
    pub provider: Provider,
    /// Model id, the provider's default when unset
    pub model: Option<String>,
    /// Environment variable holding the API key, the provider's default when unset
    pub api_key_var: Option<String>,
    pub api_url: Option<String>,
    pub data_path: PathBuf,
    pub tools: Vec<AvailabilityTool>,
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            api_key_var: None,
            api_url: None,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            tools: AvailabilityTool::ALL.to_vec(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            temperature: DEFAULT_TEMP,
            max_tokens: DEFAULT_TOKENS,
        }
    }
}

impl AssistantConfig {
    /// Parses a JSON config, missing fields keep their defaults
    ///
    /// # Errors
    /// On malformed JSON, unknown fields or an empty tool list
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    /// # Errors
    /// If the file can't be read or doesn't hold a valid config
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Loads the file named by `SLOTDESK_CONFIG`, or the defaults when it isn't set
    ///
    /// # Errors
    /// Whatever `from_file` fails with
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                info!(path = ?path, "Loading config file");
                Self::from_file(PathBuf::from(path))
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.tools.is_empty() {
            return Err(ConfigError::NoTools);
        }
        Ok(self)
    }

    /// Builds the completion model this config describes
    ///
    /// # Errors
    /// If the API key variable isn't set
    pub fn completion_model(&self) -> Result<OpenAICompatible, CompletionError> {
        OpenAICompatible::new(
            self.provider,
            self.api_key_var.as_deref(),
            self.api_url.clone(),
            self.model.clone(),
        )
    }
}
