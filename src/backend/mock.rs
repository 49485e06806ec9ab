//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns pre-configured responses in order, optionally
//! split into fragments, optionally breaking mid-stream, so the pipeline's
//! failure paths can be exercised deterministically.
//!
//! # Example
//!
//! ```
//! use llm_scaffold::backend::MockBackend;
//!
//! let mock = MockBackend::fragments(["{\"codeFiles\":", "{}}"]);
//! let broken = MockBackend::fragments(["{\"code"]).failing_after(1, "connection reset");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::ScaffoldError;

/// A test backend that returns canned responses in order.
///
/// Each response is a list of fragments. Non-streaming calls return the
/// fragments joined; streaming calls deliver them one by one. Cycles back to
/// the first response when all have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<Vec<String>>,
    index: AtomicUsize,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
    last_request: Mutex<Option<LlmRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses, one fragment each.
    ///
    /// # Panics
    ///
    /// Panics if `responses` is empty.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockBackend requires at least one response");
        Self::from_fragments(responses.into_iter().map(|r| vec![r]).collect())
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock whose single response streams as the given fragments.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_fragments(vec![fragments.into_iter().map(Into::into).collect()])
    }

    fn from_fragments(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses,
            index: AtomicUsize::new(0),
            fail_after: None,
            delay: None,
            last_request: Mutex::new(None),
        }
    }

    /// Break every call after `count` fragments have been delivered.
    pub fn failing_after(mut self, count: usize, reason: impl Into<String>) -> Self {
        self.fail_after = Some((count, reason.into()));
        self
    }

    /// Sleep before each streamed fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The most recent request seen by this backend.
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn next_response(&self, request: &LlmRequest) -> Vec<String> {
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request.clone());
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let fragments = self.next_response(request);
        if let Some((_, reason)) = &self.fail_after {
            return Err(ScaffoldError::Other(reason.clone()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(LlmResponse {
            text: fragments.concat(),
            status: 200,
            metadata: None,
        })
    }

    async fn complete_streaming(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let fragments = self.next_response(request);
        for (i, fragment) in fragments.iter().enumerate() {
            if let Some((count, reason)) = &self.fail_after {
                if i == *count {
                    return Err(ScaffoldError::Other(reason.clone()));
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            on_token(fragment.clone());
        }
        if let Some((count, reason)) = &self.fail_after {
            if *count >= fragments.len() {
                return Err(ScaffoldError::Other(reason.clone()));
            }
        }
        Ok(LlmResponse {
            text: fragments.concat(),
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
