//! Provider descriptions and the pure halves of each wire format.
//!
//! Building request bodies and pulling text out of responses never touches
//! the network, so both live here and are tested directly.

use serde_json::{Value, json};

use seg_core::config::{LlmConfig, ProviderKind};
use seg_core::{ChatMessage, Role};

use crate::error::LlmError;

/// A resolved backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// LM Studio's OpenAI-compatible local server.
    LmStudio {
        /// Server root, e.g. `http://localhost:1234`.
        base_url: String,
    },
    /// OpenAI chat completions.
    OpenAi {
        /// API root including `/v1`.
        base_url: String,
        /// Bearer token.
        api_key: Option<String>,
    },
    /// Google Gemini.
    Gemini {
        /// API root including the version segment.
        base_url: String,
        /// Query-string key.
        api_key: Option<String>,
    },
    /// No generator; every call fails and the engine uses templates.
    None,
}

impl LlmProvider {
    /// Resolve from configuration, filling provider default URLs.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let base_url = config.resolved_base_url().trim_end_matches('/').to_string();
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
        match config.provider {
            ProviderKind::None => Self::None,
            ProviderKind::Ollama => Self::Ollama { base_url },
            ProviderKind::LmStudio => Self::LmStudio { base_url },
            ProviderKind::OpenAi => Self::OpenAi { base_url, api_key },
            ProviderKind::Gemini => Self::Gemini { base_url, api_key },
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::LmStudio { .. } => "lmstudio",
            Self::OpenAi { .. } => "openai",
            Self::Gemini { .. } => "gemini",
            Self::None => "none",
        }
    }
}

/// Per-request knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Hard timeout per attempt in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
}

impl GenerationParams {
    /// Take model, sampling and retry settings from configuration.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.resolved_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_ms: config.request_timeout_ms,
            max_retries: config.max_retries,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// An HTTP call ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// Full URL, query string included.
    pub url: String,
    /// JSON body.
    pub body: Value,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
}

/// Prepend the system prompt, if any, as a system message.
#[must_use]
pub fn with_system_prompt(messages: &[ChatMessage], system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let mut all = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        all.push(ChatMessage::system(system));
    }
    all.extend_from_slice(messages);
    all
}

/// Flatten chat messages into one prompt for completion-style backends.
///
/// Each message becomes `Human: `, `Assistant: ` or `System: ` plus its
/// content; messages are separated by a blank line.
#[must_use]
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let prefix = match m.role {
                Role::User => "Human: ",
                Role::Assistant => "Assistant: ",
                Role::System => "System: ",
            };
            format!("{prefix}{}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the HTTP call for `provider`.
///
/// `messages` already include the system message.
///
/// # Errors
///
/// [`LlmError::MissingApiKey`] for OpenAI or Gemini without a key;
/// [`LlmError::Unavailable`] for [`LlmProvider::None`].
pub fn build_request(
    provider: &LlmProvider,
    params: &GenerationParams,
    messages: &[ChatMessage],
) -> Result<WireRequest, LlmError> {
    match provider {
        LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
        LlmProvider::Ollama { base_url } => Ok(WireRequest {
            url: format!("{base_url}/api/generate"),
            body: json!({
                "model": params.model,
                "prompt": flatten_messages(messages),
                "stream": false,
                "options": {
                    "temperature": params.temperature,
                    "num_predict": params.max_tokens,
                }
            }),
            bearer: None,
        }),
        LlmProvider::LmStudio { base_url } => Ok(WireRequest {
            url: format!("{base_url}/v1/chat/completions"),
            body: chat_body(params, messages),
            bearer: None,
        }),
        LlmProvider::OpenAi { base_url, api_key } => {
            let key = api_key.as_ref().ok_or(LlmError::MissingApiKey("OpenAI"))?;
            Ok(WireRequest {
                url: format!("{base_url}/chat/completions"),
                body: chat_body(params, messages),
                bearer: Some(key.clone()),
            })
        }
        LlmProvider::Gemini { base_url, api_key } => {
            let key = api_key.as_ref().ok_or(LlmError::MissingApiKey("Gemini"))?;
            Ok(WireRequest {
                url: format!("{base_url}/models/{}:generateContent?key={key}", params.model),
                body: json!({
                    "contents": [{ "parts": [{ "text": flatten_messages(messages) }] }]
                }),
                bearer: None,
            })
        }
    }
}

fn chat_body(params: &GenerationParams, messages: &[ChatMessage]) -> Value {
    json!({
        "model": params.model,
        "messages": messages,
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
    })
}

/// Pull the generated text out of a response body.
///
/// A missing field yields an empty string, which the engine treats as
/// unusable and answers from its templates instead.
#[must_use]
pub fn extract_content(provider: &LlmProvider, body: &Value) -> String {
    let text = match provider {
        LlmProvider::Ollama { .. } => body["response"].as_str(),
        LlmProvider::LmStudio { .. } | LlmProvider::OpenAi { .. } => {
            body["choices"][0]["message"]["content"].as_str()
        }
        LlmProvider::Gemini { .. } => body["candidates"][0]["content"]["parts"][0]["text"].as_str(),
        LlmProvider::None => None,
    };
    text.unwrap_or_default().to_string()
}

/// Completion-token count, when the backend reports one.
#[must_use]
pub fn extract_token_count(provider: &LlmProvider, body: &Value) -> Option<u64> {
    match provider {
        LlmProvider::Ollama { .. } => body["eval_count"].as_u64(),
        LlmProvider::LmStudio { .. } | LlmProvider::OpenAi { .. } => {
            body["usage"]["completion_tokens"].as_u64()
        }
        LlmProvider::Gemini { .. } => body["usageMetadata"]["candidatesTokenCount"].as_u64(),
        LlmProvider::None => None,
    }
}
