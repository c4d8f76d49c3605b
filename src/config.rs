//! Configuration file and connection settings.
//!
//! The optional YAML file (`~/.llm-playground/config.yaml` by default) holds the
//! starting values of the settings panel and the connection details. Every
//! field is optional:
//!
//! ```yaml
//! model: gpt-4o-mini
//! chain: high-temperature
//! temperature: 1.2
//! top_p: 0.3
//! write_memory: true
//! read_only_memory: false
//! system: You are a helpful assistant.
//! reasoning_effort: medium
//! base_url: https://api.openai.com/v1/
//! timeout_seconds: 60
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{chat::ReasoningEffort, error::LLMError, models::Models, settings::{Chain, Settings}};

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Where and how to reach the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Connection {
    /// Connection using the API key from the environment (after `.env` is loaded).
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaygroundConfig {
    pub model: Option<Models>,
    pub chain: Option<Chain>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub write_memory: Option<bool>,
    pub read_only_memory: Option<bool>,
    pub system: Option<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl PlaygroundConfig {
    /// `~/.llm-playground/config.yaml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".llm-playground").join("config.yaml"))
    }

    pub fn from_yaml(contents: &str) -> Result<Self, LLMError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LLMError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LLMError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        log::debug!("loaded config from {}", path.display());
        Self::from_yaml(&contents)
    }

    /// Loads the default file; a missing file yields an empty config.
    pub fn load_default() -> Result<Self, LLMError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Builds settings from defaults overlaid with this config.
    ///
    /// The chain is applied first so that temperature/top_p are checked
    /// against the right ranges.
    pub fn to_settings(&self) -> Result<Settings, LLMError> {
        let mut settings = Settings::default();
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(chain) = self.chain {
            settings.set_chain(chain);
        }
        if let Some(temperature) = self.temperature {
            settings.set_temperature(temperature)?;
        }
        if let Some(top_p) = self.top_p {
            settings.set_top_p(top_p)?;
        }
        settings.write_memory = self.write_memory.unwrap_or(false);
        settings.read_only_memory = self.read_only_memory.unwrap_or(false);
        if let Some(system) = &self.system {
            settings.set_system_message(system.clone());
        }
        if let Some(effort) = self.reasoning_effort {
            settings.reasoning_effort = effort;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Connection details from this config; the API key comes from `api_key`.
    pub fn connection(&self, api_key: Option<String>) -> Connection {
        Connection {
            api_key,
            base_url: self.base_url.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_gives_defaults() {
        let config = PlaygroundConfig::from_yaml("").unwrap();
        assert_eq!(config.to_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
model: o3-mini
chain: high-temperature
temperature: 1.5
top_p: 0.3
write_memory: true
system: Be terse.
reasoning_effort: medium
base_url: http://localhost:1234/v1
timeout_seconds: 30
"#;
        let config = PlaygroundConfig::from_yaml(yaml).unwrap();
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.model, Models::O3Mini);
        assert_eq!(settings.chain(), Chain::HighTemperature);
        assert_eq!(settings.temperature(), 1.5);
        assert_eq!(settings.top_p(), 0.3);
        assert!(settings.write_memory);
        assert_eq!(settings.system(), Some("Be terse."));
        assert_eq!(settings.reasoning_effort, ReasoningEffort::Medium);

        let connection = config.connection(Some("sk".into()));
        assert_eq!(connection.base_url.as_deref(), Some("http://localhost:1234/v1"));
        assert_eq!(connection.timeout_seconds, Some(30));
    }

    #[test]
    fn test_temperature_outside_chain_is_rejected() {
        let config = PlaygroundConfig::from_yaml("temperature: 1.5\n").unwrap();
        assert!(matches!(config.to_settings(), Err(LLMError::InvalidRequest(_))));
    }

    #[test]
    fn test_unknown_fields_and_models_are_errors() {
        assert!(matches!(
            PlaygroundConfig::from_yaml("colour: blue\n"),
            Err(LLMError::ConfigError(_))
        ));
        assert!(PlaygroundConfig::from_yaml("model: gpt-2\n").is_err());
    }

    #[test]
    fn test_connection_from_env() {
        std::env::set_var(API_KEY_ENV, "sk-from-env");
        let connection = Connection::from_env();
        std::env::remove_var(API_KEY_ENV);
        assert_eq!(connection.api_key.as_deref(), Some("sk-from-env"));
        assert_eq!(connection.base_url, None);
        assert_eq!(connection.timeout_seconds, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: develop-debugging").unwrap();
        let config = PlaygroundConfig::load(file.path()).unwrap();
        assert_eq!(config.model, Some(Models::DevelopDebugging));

        assert!(PlaygroundConfig::load("/definitely/not/here.yaml").is_err());
    }
}
