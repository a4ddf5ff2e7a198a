//! LLM completion client for librarian
//!
//! Provides a unified interface for multiple LLM providers:
//! - Google Gemini (direct)
//! - Anthropic API (direct)
//! - OpenAI and OpenRouter (OpenAI-compatible chat completions)
//!
//! Requests can carry a JSON schema (see [`StructuredOutput`]) which each
//! provider maps onto its native structured-output feature.

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;
pub mod schema;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, ResponseSchema, TokenUsage};
pub use providers::{MockProvider, ProviderKind, get_provider};
pub use schema::StructuredOutput;
