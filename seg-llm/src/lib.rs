//! # seg-llm: text generation backends for SEG
//!
//! One client, four wire formats:
//!   - **Ollama** `/api/generate` (local, flattened prompt)
//!   - **LM Studio** OpenAI-compatible `/v1/chat/completions` (local)
//!   - **OpenAI** `/chat/completions` (API key)
//!   - **Gemini** `models/{model}:generateContent` (API key, flattened prompt)
//!
//! [`LlmClient`] implements [`seg_core::TextGenerator`], so the engine sees
//! only a [`seg_core::GeneratorReply`]. Transport, HTTP and parse failures
//! end up in the reply's `error` field and the engine falls back to its
//! template replies.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use types::{GenerationParams, LlmProvider};
