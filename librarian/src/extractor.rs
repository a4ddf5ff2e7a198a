//! Content extraction through the completion service.
//!
//! Each book costs one schema-constrained request. Transient failures,
//! timeouts and responses that fail validation are retried with exponential
//! backoff up to the configured attempt limit.

use std::time::Duration;

use llm_client::{LlmError, LlmRequest, StructuredOutput};
use tokio_util::sync::CancellationToken;

use crate::config::ExtractionSettings;
use crate::content::{ContentRecord, parse_content_record};
use crate::error::{LibrarianError, Result};
use crate::prompt::{SYSTEM_PROMPT, build_prompt};
use crate::session::ExtractionSession;

pub struct ContentExtractor<'a> {
    session: &'a ExtractionSession,
    settings: ExtractionSettings,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(session: &'a ExtractionSession, settings: ExtractionSettings) -> Self {
        Self { session, settings }
    }

    /// Build the request sent for `content`
    pub fn build_request(&self, content: &str) -> LlmRequest {
        LlmRequest::new(build_prompt(content))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_response_schema(ContentRecord::response_schema())
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_output_tokens)
    }

    /// Extract a content record from plain-text book content
    pub async fn extract_content(&self, content: &str) -> Result<ContentRecord> {
        self.extract_content_with_cancel(content, &CancellationToken::new())
            .await
    }

    /// Extract a content record, aborting as soon as `cancel` fires
    pub async fn extract_content_with_cancel(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<ContentRecord> {
        if content.is_empty() {
            log::debug!("Requesting content record for an empty document");
        }

        let request = self.build_request(content);
        let retry = &self.settings.retry;
        let mut attempt = 0;
        let mut delay = retry.initial_delay();

        loop {
            attempt += 1;

            match self.attempt(request.clone(), cancel).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let wait = retry_after(&e).map_or(delay, |d| d.min(retry.max_delay()));
                    log::warn!(
                        "Extraction attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        retry.max_attempts,
                        e,
                        wait
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LibrarianError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }

                    delay = retry.next_delay(delay);
                }
                Err(e) => {
                    if attempt > 1 {
                        log::error!("Extraction failed after {} attempts: {}", attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// One request, bounded by the request timeout and the cancellation token
    async fn attempt(
        &self,
        request: LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<ContentRecord> {
        let timeout = self.settings.request_timeout;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LibrarianError::Cancelled),
            result = tokio::time::timeout(timeout, self.session.complete(request)) => {
                result.map_err(|_| LibrarianError::Timeout(timeout))??
            }
        };

        parse_content_record(&response.content)
    }
}

/// Server-requested wait, when the service sent one
fn retry_after(error: &LibrarianError) -> Option<Duration> {
    match error {
        LibrarianError::Service(LlmError::RateLimited {
            retry_after: Some(secs),
        }) => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}
