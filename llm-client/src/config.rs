use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{LlmError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Preset used when no --model flag is provided
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Named model presets for quick access
    #[serde(default)]
    pub presets: HashMap<String, ModelPreset>,

    /// Provider-specific configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_preset() -> String {
    "gemini-2.5-flash".to_string()
}

/// A named model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreset {
    /// Provider identifier (gemini, anthropic, openai, openrouter)
    pub provider: String,

    /// Model name/identifier for the provider
    pub model: String,
}

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            log::debug!(
                "No LLM config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the configuration file path: ~/.config/librarian/llm.toml
    pub fn config_path() -> Result<PathBuf> {
        let home =
            std::env::var("HOME").map_err(|_| LlmError::ConfigError("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/librarian/llm.toml"))
    }

    /// Get a preset by name
    pub fn get_preset(&self, name: &str) -> Result<&ModelPreset> {
        self.presets
            .get(name)
            .ok_or_else(|| LlmError::InvalidPreset(name.to_string()))
    }

    /// Resolve an optional preset name, falling back to `default_preset`
    pub fn resolve_preset<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a ModelPreset)> {
        let name = name.unwrap_or(&self.default_preset);
        let preset = self.get_preset(name)?;
        Ok((name, preset))
    }

    /// Get provider config by provider name
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut presets = HashMap::new();

        presets.insert(
            "gemini-2.5-flash".to_string(),
            ModelPreset {
                provider: "gemini".to_string(),
                model: "gemini-2.5-flash".to_string(),
            },
        );
        presets.insert(
            "gemini-2.5-pro".to_string(),
            ModelPreset {
                provider: "gemini".to_string(),
                model: "gemini-2.5-pro".to_string(),
            },
        );
        presets.insert(
            "claude-sonnet".to_string(),
            ModelPreset {
                provider: "anthropic".to_string(),
                model: "claude-sonnet-4-5".to_string(),
            },
        );
        presets.insert(
            "gpt-4o-mini".to_string(),
            ModelPreset {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
        );

        Self {
            default_preset: default_preset(),
            presets,
            providers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_preset, "gemini-2.5-flash");

        let preset = config.get_preset("gemini-2.5-flash").unwrap();
        assert_eq!(preset.provider, "gemini");
        assert_eq!(preset.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_invalid_preset() {
        let config = Config::default();
        let result = config.get_preset("nonexistent");
        assert!(matches!(result, Err(LlmError::InvalidPreset(name)) if name == "nonexistent"));
    }

    #[test]
    fn test_resolve_preset() {
        let config = Config::default();

        let (name, preset) = config.resolve_preset(None).unwrap();
        assert_eq!(name, "gemini-2.5-flash");
        assert_eq!(preset.provider, "gemini");

        let (name, preset) = config.resolve_preset(Some("claude-sonnet")).unwrap();
        assert_eq!(name, "claude-sonnet");
        assert_eq!(preset.provider, "anthropic");
    }

    #[test]
    fn test_resolve_preset_with_owned_name() {
        let config = Config::default();
        let requested = String::from("gpt-4o-mini");

        let (name, preset) = config.resolve_preset(Some(requested.as_str())).unwrap();
        assert_eq!(name, requested);
        assert_eq!(preset.provider, "openai");

        let missing = String::from("no-such-preset");
        assert!(matches!(
            config.resolve_preset(Some(&missing)),
            Err(LlmError::InvalidPreset(n)) if n == missing
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_preset, config.default_preset);
        assert_eq!(parsed.presets.len(), config.presets.len());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
default_preset = "local"

[presets.local]
provider = "openai"
model = "llama3"

[providers.openai]
base_url = "http://localhost:11434/v1"
api_key = "unused"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let (_, preset) = config.resolve_preset(None).unwrap();
        assert_eq!(preset.model, "llama3");

        let provider = config.get_provider_config("openai").unwrap();
        assert_eq!(
            provider.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path().unwrap();
        assert!(path.to_string_lossy().contains(".config/librarian/llm.toml"));
    }
}
