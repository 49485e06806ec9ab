//! Local models through Ollama's native endpoints.
//!
//! Streamed replies are newline-delimited JSON, one object per line; the
//! last line has `"done": true`. A reply that stops short of it is a failure.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::ndjson::NdjsonDecoder;
use super::{http_error, provider_error, Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::ScaffoldError;

/// Ollama provider over `/api/chat`. Stateless; the server URL comes from
/// [`ExecCtx`](crate::ExecCtx).
#[derive(Debug, Clone)]
pub struct OllamaBackend;

impl OllamaBackend {
    /// `temperature` and `num_predict`, only when set.
    fn build_options(request: &LlmRequest) -> Value {
        let mut opts = serde_json::Map::new();
        if let Some(temperature) = request.config.temperature {
            opts.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = request.config.max_tokens {
            opts.insert("num_predict".into(), json!(max_tokens));
        }
        Value::Object(opts)
    }

    /// Build the JSON body for `/api/chat`.
    fn build_chat_body(request: &LlmRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
            "options": Self::build_options(request),
        });
        if request.config.json_mode {
            body["format"] = json!("json");
        }
        body
    }

    /// Endpoint URL and body for a request.
    fn endpoint(base_url: &str, request: &LlmRequest, stream: bool) -> (String, Value) {
        (
            format!("{}/api/chat", base_url.trim_end_matches('/')),
            Self::build_chat_body(request, stream),
        )
    }

    async fn send(client: &Client, url: &str, body: &Value) -> Result<reqwest::Response> {
        let resp = client.post(url).json(body).send().await.map_err(|e| {
            ScaffoldError::Other(format!("Failed to connect to LLM at {}: {}", url, e))
        })?;

        if !resp.status().is_success() {
            return Err(http_error(resp).await);
        }
        Ok(resp)
    }

    /// `message.content` of one response object.
    fn token(json_val: &Value) -> Option<&str> {
        json_val
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
    }

    fn is_done(json_val: &Value) -> bool {
        json_val.get("done").and_then(|v| v.as_bool()) == Some(true)
    }

    /// Extract metadata fields from an Ollama response.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in [
            "total_duration",
            "eval_count",
            "eval_duration",
            "prompt_eval_count",
            "model",
            "done_reason",
        ] {
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
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let (url, body) = Self::endpoint(base_url, request, false);
        let resp = Self::send(client, &url, &body).await?;
        let status = resp.status().as_u16();

        let json_resp: Value = resp.json().await?;
        if let Some(message) = provider_error(&json_resp) {
            return Err(ScaffoldError::Provider(message));
        }

        Ok(LlmResponse {
            text: Self::token(&json_resp).unwrap_or("").to_string(),
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
        let (url, body) = Self::endpoint(base_url, request, true);
        let resp = Self::send(client, &url, &body).await?;
        let status = resp.status().as_u16();

        let mut stream = resp.bytes_stream();
        let mut decoder = NdjsonDecoder::new();
        let mut accumulated = String::new();
        let mut last_metadata = None;

        let mut handle = |json_val: Value, accumulated: &mut String| -> Result<Option<Value>> {
            if let Some(message) = provider_error(&json_val) {
                return Err(ScaffoldError::Provider(message));
            }
            if let Some(t) = Self::token(&json_val) {
                if !t.is_empty() {
                    accumulated.push_str(t);
                    on_token(t.to_string());
                }
            }
            if Self::is_done(&json_val) {
                return Ok(Some(Self::extract_metadata(&json_val).unwrap_or(Value::Null)));
            }
            Ok(None)
        };

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ScaffoldError::Request)?;
            for json_val in decoder.decode(&chunk) {
                if let Some(meta) = handle(json_val, &mut accumulated)? {
                    last_metadata = Some(meta);
                }
            }
        }
        if let Some(json_val) = decoder.flush() {
            if let Some(meta) = handle(json_val, &mut accumulated)? {
                last_metadata = Some(meta);
            }
        }

        if last_metadata.is_none() {
            return Err(ScaffoldError::Provider(
                "stream closed before the final \"done\" message".into(),
            ));
        }

        Ok(LlmResponse {
            text: accumulated,
            status,
            metadata: last_metadata.filter(|m| !m.is_null()),
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
