//! librarian configuration: extraction tuning and retry policy.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LibrarianError, Result};

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TOP_P: f32 = 0.95;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarianConfig {
    /// Model preset from the LLM config. None means the LLM config default.
    pub preset: Option<String>,

    /// Publisher table separator: tab, comma, or a single character
    pub separator: String,

    /// Sampling temperature (0.0-2.0); lower is more consistent
    pub temperature: f32,

    /// Nucleus sampling threshold (0.0-1.0)
    pub top_p: f32,

    /// Upper bound on generated tokens per request
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            preset: None,
            separator: "tab".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first; 1 disables retries
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay that follows `delay` in the backoff sequence
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f32(
            (delay.as_secs_f32() * self.backoff_factor).min(self.max_delay().as_secs_f32()),
        )
    }
}

/// Validated knobs for a single extraction request
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        LibrarianConfig::default().extraction_settings()
    }
}

impl LibrarianConfig {
    /// Get the config file path: ~/.config/librarian/librarian.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| LibrarianError::Config("HOME not set".into()))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("librarian")
            .join("librarian.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| LibrarianError::io(&path, e))?;
        toml::from_str(&content)
            .map_err(|e| LibrarianError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LibrarianError::io(parent, e))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| LibrarianError::Config(e.to_string()))?;
        fs::write(&path, content).map_err(|e| LibrarianError::io(&path, e))?;
        Ok(())
    }

    /// Clamp every knob into its valid range
    pub fn extraction_settings(&self) -> ExtractionSettings {
        let retry = RetryConfig {
            max_attempts: self.retry.max_attempts.clamp(1, 10),
            initial_delay_ms: self.retry.initial_delay_ms,
            max_delay_ms: self.retry.max_delay_ms.max(self.retry.initial_delay_ms),
            backoff_factor: self.retry.backoff_factor.max(1.0),
        };

        ExtractionSettings {
            temperature: self.temperature.clamp(0.0, 2.0),
            top_p: self.top_p.clamp(0.0, 1.0),
            max_output_tokens: self.max_output_tokens.max(1),
            request_timeout: Duration::from_secs(self.timeout_secs.max(1)),
            retry,
        }
    }
}
