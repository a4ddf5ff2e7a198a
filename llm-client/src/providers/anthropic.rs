//! Anthropic API provider
//!
//! Direct HTTP implementation for the Anthropic Messages API. The Messages
//! API has no response-schema parameter, so a requested schema is appended to
//! the system prompt and the caller validates the reply.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{retry_after_secs, status_error};
use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Provider for direct Anthropic API calls
pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(model: &str, api_key: String, base_url: Option<&str>) -> Result<Self> {
        let client = Client::new();

        Ok(Self {
            model: model.to_string(),
            api_key,
            base_url: base_url
                .unwrap_or(ANTHROPIC_API_URL)
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }

    fn build_request(&self, request: &LlmRequest) -> MessagesRequest {
        let system = match (&request.system_prompt, &request.response_schema) {
            (system, Some(schema)) => {
                let instruction = format!(
                    "Respond with a single JSON object and nothing else. It must validate against this JSON schema:\n{}",
                    schema.schema
                );
                Some(match system {
                    Some(system) => format!("{}\n\n{}", system, instruction),
                    None => instruction,
                })
            }
            (system, None) => system.clone(),
        };

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: request.temperature,
            top_p: request.top_p,
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        }
    }
}

// Anthropic API request/response types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let api_request = self.build_request(&request);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::ApiError {
                message: format!("Request failed: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            return Err(status_error(status.as_u16(), message, retry_after));
        }

        let api_response: MessagesResponse =
            response.json().await.map_err(|e| LlmError::ApiError {
                message: format!("Failed to parse response: {}", e),
                status_code: None,
            })?;

        let content = api_response
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        let usage = Some(TokenUsage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        });

        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "Anthropic API"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> Result<()> {
        // API key was provided in constructor
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResponseSchema;
    use serde_json::json;

    #[test]
    fn test_schema_appended_to_system_prompt() {
        let provider = AnthropicProvider::new("claude-sonnet-4-5", "key".into(), None).unwrap();
        let request = LlmRequest::new("text")
            .with_system_prompt("you are a librarian")
            .with_response_schema(ResponseSchema {
                name: "Thing".into(),
                schema: json!({"type": "object"}),
            });

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        let system = body["system"].as_str().unwrap();

        assert!(system.starts_with("you are a librarian"));
        assert!(system.contains("\"type\":\"object\""));
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_sampling_parameters_forwarded() {
        let provider = AnthropicProvider::new("claude-sonnet-4-5", "key".into(), None).unwrap();
        let request = LlmRequest::new("text")
            .with_temperature(0.2)
            .with_top_p(0.95)
            .with_max_tokens(300);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 300);
        assert!((body["top_p"].as_f64().unwrap() - 0.95).abs() < 1e-6);
        assert_eq!(body["messages"][0]["content"], "text");
    }
}
