//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over LLM providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs. Built-in implementations: [`OpenAiBackend`], [`OllamaBackend`],
//! and [`MockBackend`] for tests.
//!
//! ## Architecture
//!
//! ```text
//! Generator ──► LlmRequest ──► Backend::complete() ──► LlmResponse
//!                                     │
//!                          ┌──────────┴──────────┐
//!                     OpenAiBackend         OllamaBackend
//!                  /v1/chat/completions       /api/chat
//!                     SSE streaming        NDJSON streaming
//! ```
//!
//! A backend makes exactly one attempt per call. Retrying is left to the
//! human running the tool.

pub mod mock;
pub mod ndjson;
pub mod ollama;
pub mod openai;
pub mod sse;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::Result;
use crate::ScaffoldError;

/// A normalized LLM request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4"`, `"llama3.2:3b"`).
    pub model: String,

    /// System instruction. `None` or empty means a prompt-only call.
    pub system_prompt: Option<String>,

    /// The user prompt text.
    pub prompt: String,

    /// Sampling and format options.
    pub config: LlmConfig,

    /// Whether to use the streaming endpoint.
    pub stream: bool,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, timing, model info).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over LLM providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API, in non-streaming or streaming mode.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming LLM call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Execute a streaming LLM call.
    ///
    /// `on_token` is called for each fragment as it arrives, in order. If the
    /// stream breaks, the fragments already delivered stay delivered and an
    /// `Err` is returned; callers keep their own copy of the partial text.
    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Which hosted or local provider to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI or any OpenAI-compatible server.
    #[default]
    OpenAi,
    /// A local Ollama server.
    Ollama,
}

impl ProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4",
            ProviderKind::Ollama => "llama3.2:3b",
        }
    }

    /// Whether calls to this provider need an API key.
    pub fn requires_api_key(self) -> bool {
        matches!(self, ProviderKind::OpenAi)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        })
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider '{}' (expected 'openai' or 'ollama')",
                other
            )),
        }
    }
}

/// Build the backend for `kind`.
///
/// The OpenAI provider refuses to start without an API key so the failure
/// happens before any network call.
pub fn make_backend(
    kind: ProviderKind,
    api_key: Option<String>,
    organization: Option<String>,
) -> Result<Arc<dyn Backend>> {
    match kind {
        ProviderKind::OpenAi => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                ScaffoldError::InvalidConfig(
                    "missing OpenAI API key; set OPENAI_API_KEY or provider.api_key".into(),
                )
            })?;
            let mut backend = OpenAiBackend::new().with_api_key(key);
            if let Some(org) = organization {
                backend = backend.with_organization(org);
            }
            Ok(Arc::new(backend))
        }
        ProviderKind::Ollama => Ok(Arc::new(OllamaBackend)),
    }
}

/// Parse a provider error out of a JSON body or stream line, if present.
///
/// OpenAI uses `{"error": {"message": "..."}}`, Ollama uses `{"error": "..."}`.
pub(crate) fn provider_error(value: &serde_json::Value) -> Option<String> {
    let err = value.get("error")?;
    match err {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => Some(
            obj.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
        ),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Turn a non-success HTTP response into [`ScaffoldError::HttpError`].
pub(crate) async fn http_error(resp: reqwest::Response) -> ScaffoldError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ScaffoldError::HttpError { status, body }
}
