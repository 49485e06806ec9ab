//! Lossless accumulation of streamed model fragments.
//!
//! The accumulator concatenates fragments in arrival order and optionally
//! forwards each one as an [`Event::Fragment`] for live display. Display is
//! a subscriber concern; the buffer is never trimmed or rewritten.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::events::{emit, Event, EventHandler};
use crate::extract::error::GenerationError;

/// The complete text of one model response, plus how many fragments built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    text: String,
    fragments: usize,
}

impl RawModelOutput {
    /// Wrap a non-streaming response (a stream of exactly one fragment).
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fragments: 1,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of fragments that were concatenated.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Collects fragments into a [`RawModelOutput`].
///
/// # Example
///
/// ```
/// use llm_scaffold::extract::StreamAccumulator;
///
/// let mut acc = StreamAccumulator::new();
/// acc.push("{\"codeFiles\":");
/// acc.push("");
/// acc.push("{}}");
/// let raw = acc.finish();
/// assert_eq!(raw.text(), "{\"codeFiles\":{}}");
/// assert_eq!(raw.fragment_count(), 3);
/// ```
#[derive(Default)]
pub struct StreamAccumulator {
    buffer: String,
    fragments: usize,
    handler: Option<Arc<dyn EventHandler>>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every pushed fragment to `handler` as an [`Event::Fragment`].
    pub fn with_handler(mut self, handler: Option<Arc<dyn EventHandler>>) -> Self {
        self.handler = handler;
        self
    }

    /// Append one fragment. Empty fragments are counted but not emitted.
    pub fn push(&mut self, fragment: &str) {
        self.fragments += 1;
        if fragment.is_empty() {
            return;
        }
        self.buffer.push_str(fragment);
        emit(
            &self.handler,
            Event::Fragment {
                chunk: fragment.to_string(),
            },
        );
    }

    /// Total bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// The text accumulated so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// End of stream reached normally.
    pub fn finish(self) -> RawModelOutput {
        RawModelOutput {
            text: self.buffer,
            fragments: self.fragments,
        }
    }

    /// The fragment source broke; keep the partial text for diagnostics.
    pub fn fail(self, reason: impl Into<String>) -> GenerationError {
        GenerationError::StreamFailed {
            reason: reason.into(),
            partial: self.buffer,
        }
    }

    /// The invocation was cancelled or timed out; keep the partial text.
    pub fn abort(self, reason: impl Into<String>) -> GenerationError {
        GenerationError::Aborted {
            reason: reason.into(),
            partial: self.buffer,
        }
    }
}

impl std::fmt::Debug for StreamAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAccumulator")
            .field("bytes", &self.buffer.len())
            .field("fragments", &self.fragments)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Drain a fragment stream into a [`RawModelOutput`].
///
/// The first `Err` item ends collection with [`GenerationError::StreamFailed`],
/// carrying everything received before it.
pub async fn collect_fragments<S, E>(
    stream: S,
    handler: Option<Arc<dyn EventHandler>>,
) -> Result<RawModelOutput, GenerationError>
where
    S: Stream<Item = Result<String, E>>,
    E: std::fmt::Display,
{
    let mut acc = StreamAccumulator::new().with_handler(handler);
    futures::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => acc.push(&fragment),
            Err(e) => return Err(acc.fail(e.to_string())),
        }
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnEventHandler;
    use std::sync::Mutex;

    #[test]
    fn concatenation_matches_literal_join() {
        let fragments = ["Here", "", " you go:\n", "```json\n{", "\"a\":1}", "\n```", ""];
        let mut acc = StreamAccumulator::new();
        for f in fragments {
            acc.push(f);
        }
        let raw = acc.finish();
        assert_eq!(raw.text(), fragments.concat());
        assert_eq!(raw.fragment_count(), fragments.len());
    }

    #[test]
    fn whitespace_fragments_are_not_trimmed() {
        let mut acc = StreamAccumulator::new();
        acc.push("  ");
        acc.push("{ }");
        acc.push("\n\n");
        assert_eq!(acc.text(), "  { }\n\n");
        assert_eq!(acc.len(), 7);
    }

    #[test]
    fn fail_keeps_partial_text() {
        let mut acc = StreamAccumulator::new();
        acc.push("{\"codeFiles\": ");
        acc.push("{\"a.js\"");
        let err = acc.fail("connection reset");
        assert_eq!(
            err,
            GenerationError::StreamFailed {
                reason: "connection reset".into(),
                partial: "{\"codeFiles\": {\"a.js\"".into(),
            }
        );
    }

    #[test]
    fn abort_keeps_partial_text() {
        let mut acc = StreamAccumulator::new();
        acc.push("partial");
        let err = acc.abort("cancelled");
        assert_eq!(err.raw_text(), "partial");
        assert_eq!(err.kind(), crate::extract::FailureKind::Aborted);
    }

    #[test]
    fn handler_sees_fragments_in_order() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |event: Event| {
            if let Event::Fragment { chunk } = event {
                sink.lock().unwrap().push_str(&chunk);
            }
        }));

        let mut acc = StreamAccumulator::new().with_handler(Some(handler));
        for f in ["a", "b", "", "c"] {
            acc.push(f);
        }
        assert_eq!(*seen.lock().unwrap(), "abc");
        assert_eq!(acc.finish().text(), "abc");
    }

    #[test]
    fn single_is_one_fragment() {
        let raw = RawModelOutput::single("{}");
        assert_eq!(raw.fragment_count(), 1);
        assert_eq!(raw.into_text(), "{}");
    }

    #[test]
    fn collect_fragments_joins_stream() {
        let items: Vec<Result<String, String>> =
            vec![Ok("{\"x\"".into()), Ok(String::new()), Ok(":1}".into())];
        let raw = tokio_test::block_on(collect_fragments(futures::stream::iter(items), None))
            .expect("stream completes");
        assert_eq!(raw.text(), "{\"x\":1}");
        assert_eq!(raw.fragment_count(), 3);
    }

    #[tokio::test]
    async fn collect_fragments_surfaces_stream_failure() {
        let items: Vec<Result<String, String>> = vec![
            Ok("one ".into()),
            Ok("two ".into()),
            Err("socket closed".into()),
            Ok("never".into()),
        ];
        let err = collect_fragments(futures::stream::iter(items), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::StreamFailed {
                reason: "socket closed".into(),
                partial: "one two ".into(),
            }
        );
    }
}
