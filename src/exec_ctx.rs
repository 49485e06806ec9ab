//! Execution context for a generation run.
//!
//! [`ExecCtx`] carries the HTTP client, LLM backend, endpoint, cancellation
//! token, invocation timeout, and optional event handler. Build it once per
//! process and pass it by reference to [`Generator`](crate::Generator).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, OllamaBackend};
use crate::error::Result;
use crate::events::EventHandler;

/// Shared execution context for generation runs.
///
/// # Example
///
/// ```
/// use llm_scaffold::ExecCtx;
/// use std::time::Duration;
///
/// let ctx = ExecCtx::builder("http://localhost:11434/api")
///     .timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(ctx.base_url, "http://localhost:11434");
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL for the LLM provider, without any API path suffix.
    pub base_url: String,
    /// LLM backend. Default: [`OllamaBackend`].
    pub backend: Arc<dyn Backend>,
    /// Cancelled on Ctrl-C; an in-flight run ends as `Aborted`.
    pub cancellation: CancellationToken,
    /// Limit for one whole invocation, stream included.
    pub invocation_timeout: Option<Duration>,
    /// Optional event handler for fragments and lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("invocation_timeout", &self.invocation_timeout)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    cancellation: Option<CancellationToken>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the LLM backend. Default: [`OllamaBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl-C watcher).
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the invocation timeout. Default: none.
    ///
    /// Applies to the whole call, streamed body included. If no custom
    /// `Client` is provided, the built client also uses it as its request
    /// timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };
        Ok(ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(OllamaBackend)),
            cancellation: self.cancellation.unwrap_or_default(),
            invocation_timeout: self.timeout,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// This prevents double-pathing when backends append their own paths.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
/// e.g., "http://localhost:11434/api" -> "http://localhost:11434"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // Longest first.
    for suffix in &[
        "/v1/chat/completions",
        "/v1/chat",
        "/v1",
        "/api/generate",
        "/api/chat",
        "/api",
    ] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_normalize_base_url_strips_v1() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
    }

    #[test]
    fn test_normalize_base_url_strips_api() {
        assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/api/chat"), "http://localhost:11434");
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_base_url("https://api.openai.com"), "https://api.openai.com");
    }

    #[test]
    fn test_normalize_base_url_strips_full_path() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/chat/completions"),
            "https://api.openai.com"
        );
    }

    #[test]
    fn test_builder_defaults() {
        let ctx = ExecCtx::builder("http://localhost:11434/").build().unwrap();
        assert_eq!(ctx.base_url, "http://localhost:11434");
        assert_eq!(ctx.backend.name(), "ollama");
        assert!(ctx.invocation_timeout.is_none());
        assert!(ctx.event_handler.is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_shared_cancellation_token() {
        let token = CancellationToken::new();
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(MockBackend::fixed("{}")))
            .cancellation(token.clone())
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.invocation_timeout, Some(Duration::from_secs(5)));

        let debug = format!("{:?}", ctx);
        assert!(debug.contains("mock"));
        assert!(debug.contains("cancelled: true"));
    }
}
