//! LLM client: one [`TextGenerator`] over every supported backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use seg_core::config::LlmConfig;
use seg_core::prompt::CONNECTION_PROBE;
use seg_core::{ChatMessage, GeneratorReply, TextGenerator};

use crate::error::LlmError;
use crate::types::{
    GenerationParams, LlmProvider, WireRequest, build_request, extract_content,
    extract_token_count, with_system_prompt,
};

/// Routes generation requests to the configured backend.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    params: GenerationParams,
    http: Client,
}

impl LlmClient {
    /// Create a client for `provider`.
    #[must_use]
    pub fn new(provider: LlmProvider, params: GenerationParams) -> Self {
        Self {
            provider,
            params,
            http: Client::new(),
        }
    }

    /// Create a client from the `[llm]` configuration section.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = Self::new(
            LlmProvider::from_config(config),
            GenerationParams::from_config(config),
        );
        info!(
            provider = client.provider.name(),
            model = %client.params.model,
            "LLM client configured"
        );
        client
    }

    /// A client with no backend: every call fails and callers fall back.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, GenerationParams::default())
    }

    /// The resolved backend.
    #[must_use]
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Generate text for `messages`, with `system_prompt` sent first.
    ///
    /// Retries transport and HTTP failures up to the configured count.
    ///
    /// # Errors
    ///
    /// Configuration problems immediately; otherwise
    /// [`LlmError::RetriesExhausted`] once every attempt has failed.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        let all = with_system_prompt(messages, system_prompt);
        let request = build_request(&self.provider, &self.params, &all)?;

        let attempts = self.params.max_retries + 1;
        let mut last_error = String::new();
        for attempt in 0..attempts {
            if attempt > 0 {
                debug!(
                    provider = self.provider.name(),
                    "Retrying LLM call (attempt {}/{})",
                    attempt + 1,
                    attempts
                );
            }

            let start = Instant::now();
            match self.send(&request).await {
                Ok(body) => {
                    let text = extract_content(&self.provider, &body);
                    debug!(
                        provider = self.provider.name(),
                        model = %self.params.model,
                        latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        tokens = extract_token_count(&self.provider, &body).unwrap_or(0),
                        chars = text.len(),
                        "LLM call complete"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    warn!(provider = self.provider.name(), error = %e, "LLM request failed");
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts,
            last_error,
        })
    }

    async fn send(&self, request: &WireRequest) -> Result<Value, LlmError> {
        let mut builder = self
            .http
            .post(&request.url)
            .json(&request.body)
            .timeout(Duration::from_millis(self.params.timeout_ms));
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.params.timeout_ms)
            } else {
                LlmError::from(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("HTTP {status}: {body}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))
    }

    /// Send a short probe and report whether a non-empty reply came back.
    pub async fn test_connection(&self) -> bool {
        let reply = self
            .generate_response(&[ChatMessage::user(CONNECTION_PROBE)], None)
            .await;
        let ok = reply.error.is_none() && !reply.content.is_empty();
        info!(provider = self.provider.name(), ok, "LLM connection test");
        ok
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> GeneratorReply {
        match self.generate(messages, system_prompt).await {
            Ok(text) => GeneratorReply::ok(text),
            Err(e) => GeneratorReply::failed(e.to_string()),
        }
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams {
            model: "m".into(),
            temperature: 0.7,
            max_tokens: 32,
            timeout_ms: 2000,
            max_retries: 0,
        }
    }

    #[tokio::test]
    async fn no_provider_reports_error() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let reply = client
            .generate_response(&[ChatMessage::user("hi")], Some("sys"))
            .await;
        assert!(reply.content.is_empty());
        assert!(reply.error.expect("error").contains("unavailable"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let client = LlmClient::new(
            LlmProvider::OpenAi {
                base_url: "http://127.0.0.1:1".into(),
                api_key: None,
            },
            params(),
        );
        let reply = client.generate_response(&[ChatMessage::user("hi")], None).await;
        assert_eq!(reply.error.as_deref(), Some("OpenAI API key is required"));
        assert!(!client.test_connection().await);
    }

    #[tokio::test]
    async fn unreachable_server_exhausts_retries() {
        let client = LlmClient::new(
            LlmProvider::Ollama {
                base_url: "http://127.0.0.1:1".into(),
            },
            GenerationParams {
                max_retries: 1,
                ..params()
            },
        );
        let err = client
            .generate(&[ChatMessage::user("hi")], None)
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 2, .. }));
    }
}
