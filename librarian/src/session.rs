//! Completion-service session.
//!
//! A session owns one provider for the length of a run. Requests through a
//! session are serialized: at most one is in flight at a time. The session is
//! released by [`ExtractionSession::close`] or, on any other exit path, when
//! it is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use llm_client::{Config, LlmProvider, LlmRequest, LlmResponse, get_provider};
use tokio::sync::Mutex;

use crate::error::Result;

pub struct ExtractionSession {
    provider: Arc<dyn LlmProvider>,
    gate: Mutex<()>,
    requests: AtomicUsize,
}

impl ExtractionSession {
    /// Open a session for `preset_name`, or the config's default preset
    pub fn open(config: &Config, preset_name: Option<&str>) -> Result<Self> {
        let (name, preset) = config.resolve_preset(preset_name)?;
        let provider = get_provider(preset, config.get_provider_config(&preset.provider))?;

        log::info!(
            "Opened {} session (preset: {}, model: {})",
            provider.name(),
            name,
            provider.model()
        );

        Ok(Self::from_provider(Arc::from(provider)))
    }

    /// Wrap an already constructed provider
    pub fn from_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            gate: Mutex::new(()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Number of requests sent through this session
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Send one request, waiting for any in-flight request to finish first
    pub async fn complete(&self, request: LlmRequest) -> llm_client::Result<LlmResponse> {
        let _guard = self.gate.lock().await;
        self.requests.fetch_add(1, Ordering::SeqCst);

        let response = self.provider.complete(request).await?;

        if let Some(usage) = &response.usage {
            log::debug!(
                "Tokens: {} in, {} out",
                usage.input_tokens,
                usage.output_tokens
            );
        }

        Ok(response)
    }

    /// Release the session
    pub fn close(self) {
        log::info!(
            "Closing {} session after {} request(s)",
            self.provider.name(),
            self.request_count()
        );
    }
}

impl Drop for ExtractionSession {
    fn drop(&mut self) {
        log::debug!("Released {} session", self.provider.name());
    }
}
