//! Chat-completions provider.
//!
//! [`OpenAiBackend`] covers OpenAI itself and any server exposing the same
//! chat-completions surface (vLLM, llama.cpp server, LM Studio, Groq,
//! Ollama's `/v1/` endpoint, ...).
//!
//! Requests go to `{base_url}/v1/chat/completions`. Streamed replies are SSE
//! events whose `choices[0].delta.content` holds the next fragment; the
//! stream must end with `data: [DONE]` or a `finish_reason`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::sse::SseDecoder;
use super::{http_error, provider_error, Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::ScaffoldError;

/// Talks to any server that speaks the chat-completions protocol.
///
/// # Example
///
/// ```
/// use llm_scaffold::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(backend.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Bearer token; omitted for local servers that need none.
    pub(crate) api_key: Option<String>,
    /// Sent as the `OpenAI-Organization` header when present.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| match k.get(..6) {
                    Some(prefix) if k.len() > 6 => format!("{}***", prefix),
                    _ => "***".to_string(),
                }),
            )
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// No key, no organization.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the messages array: system instruction first, then the user text.
    fn build_messages(request: &LlmRequest) -> Vec<Value> {
        let mut messages = Vec::new();

        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        messages
    }

    /// JSON body; sampling fields appear only when configured.
    ///
    /// Sampling options left unset are omitted so the provider defaults apply.
    fn build_body(request: &LlmRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": Self::build_messages(request),
            "stream": stream,
        });

        if let Some(temperature) = request.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    fn build_http_request(&self, client: &Client, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);

        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }

    async fn send(&self, client: &Client, base_url: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let resp = self
            .build_http_request(client, &url, body)
            .send()
            .await
            .map_err(|e| ScaffoldError::Other(format!("Failed to connect to LLM at {}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(http_error(resp).await);
        }
        Ok(resp)
    }

    /// Usage and finish reason, kept for debug logging.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "model", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }

    /// Content and finish reason of one streamed chunk.
    fn delta(json_val: &Value) -> (Option<&str>, Option<&str>) {
        let choice = json_val.get("choices").and_then(|c| c.get(0));
        let content = choice
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str());
        let finish = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(|v| v.as_str());
        (content, finish)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let body = Self::build_body(request, false);
        let resp = self.send(client, base_url, &body).await?;
        let status = resp.status().as_u16();

        let json_resp: Value = resp.json().await?;
        if let Some(message) = provider_error(&json_resp) {
            return Err(ScaffoldError::Provider(message));
        }

        let choice = json_resp.get("choices").and_then(|c| c.get(0));
        if let Some("length") = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(|v| v.as_str())
        {
            tracing::warn!("response hit the max_tokens limit; output is probably truncated");
        }
        let text = choice
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(LlmResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let body = Self::build_body(request, true);
        let resp = self.send(client, base_url, &body).await?;
        let status = resp.status().as_u16();

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();
        let mut finished = false;

        let mut handle = |json_val: Value, accumulated: &mut String, finished: &mut bool| -> Result<()> {
            if let Some(message) = provider_error(&json_val) {
                return Err(ScaffoldError::Provider(message));
            }
            let (content, finish) = Self::delta(&json_val);
            if let Some(content) = content {
                if !content.is_empty() {
                    accumulated.push_str(content);
                    on_token(content.to_string());
                }
            }
            if let Some(reason) = finish {
                if reason == "length" {
                    tracing::warn!("stream hit the max_tokens limit; output is probably truncated");
                }
                *finished = true;
            }
            Ok(())
        };

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ScaffoldError::Request)?;
            for json_val in decoder.decode(&chunk) {
                handle(json_val, &mut accumulated, &mut finished)?;
            }
        }
        for json_val in decoder.flush() {
            handle(json_val, &mut accumulated, &mut finished)?;
        }

        if !(finished || decoder.is_done()) {
            return Err(ScaffoldError::Provider(
                "stream closed before the completion finished".into(),
            ));
        }

        Ok(LlmResponse {
            text: accumulated,
            status,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn test_request() -> LlmRequest {
        LlmRequest {
            model: "gpt-4".into(),
            system_prompt: None,
            prompt: "A todo app".into(),
            config: LlmConfig::default(),
            stream: false,
        }
    }

    #[test]
    fn test_openai_backend_chat_payload() {
        let mut request = test_request();
        request.system_prompt = Some("You are an expert developer.".into());

        let body = OpenAiBackend::build_body(&request, false);

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["stream"], false);

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are an expert developer.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "A todo app");

        // Unset sampling options and json mode are omitted
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_openai_backend_sampling_options() {
        let mut request = test_request();
        request.config = LlmConfig::default()
            .with_temperature(0.2)
            .with_max_tokens(8000)
            .with_json_mode(true);

        let body = OpenAiBackend::build_body(&request, true);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 8000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_openai_backend_empty_system_skipped() {
        let mut request = test_request();
        request.system_prompt = Some(String::new());
        let body = OpenAiBackend::build_body(&request, false);

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_openai_backend_auth_header() {
        let backend = OpenAiBackend::new()
            .with_api_key("sk-test123")
            .with_organization("org-abc");

        let client = Client::new();
        let body = json!({"test": true});
        let req = backend
            .build_http_request(&client, "https://api.openai.com/v1/chat/completions", &body)
            .build()
            .expect("build request");

        assert_eq!(req.headers().get("Authorization").unwrap(), "Bearer sk-test123");
        assert_eq!(req.headers().get("OpenAI-Organization").unwrap(), "org-abc");
    }

    #[test]
    fn test_openai_backend_no_auth() {
        let backend = OpenAiBackend::new();

        let client = Client::new();
        let body = json!({"test": true});
        let req = backend
            .build_http_request(&client, "https://api.openai.com/v1/chat/completions", &body)
            .build()
            .expect("build request");

        assert!(req.headers().get("Authorization").is_none());
        assert!(req.headers().get("OpenAI-Organization").is_none());
    }

    #[test]
    fn test_delta_extraction() {
        let chunk = json!({"choices": [{"delta": {"content": "Hi"}, "finish_reason": null}]});
        assert_eq!(OpenAiBackend::delta(&chunk), (Some("Hi"), None));

        let last = json!({"choices": [{"delta": {}, "finish_reason": "stop"}]});
        assert_eq!(OpenAiBackend::delta(&last), (None, Some("stop")));
    }

    #[test]
    fn test_metadata_extraction() {
        let resp = json!({"id": "chatcmpl-1", "model": "gpt-4", "usage": {"total_tokens": 10}});
        let meta = OpenAiBackend::extract_metadata(&resp).unwrap();
        assert_eq!(meta["usage"]["total_tokens"], 10);
        assert!(OpenAiBackend::extract_metadata(&json!({})).is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = OpenAiBackend::new().with_api_key("sk-1234567890abcdef");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("1234567890abcdef"));
        assert!(debug_output.contains("sk-123***"));
    }

    #[test]
    fn test_debug_short_key_fully_redacted() {
        let backend = OpenAiBackend::new().with_api_key("abc");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("abc"));
        assert!(debug_output.contains("***"));
    }
}
