//! The generation pipeline: invoke the model, collect its text, extract the
//! JSON payload, validate it.
//!
//! Each run walks a fixed state machine:
//!
//! ```text
//! Collecting ──► Extracting ──► Parsing ──► Validated
//!     │              │             │
//!     ├► StreamFailed└► ExtractionFailed
//!     └► Aborted                   ├► ParseFailed
//!                                  └► SchemaInvalid
//! ```
//!
//! [`PipelineRun`] is consumed by its terminal transitions, so a run cannot
//! be restarted or re-enter an earlier state. The extraction half is pure
//! ([`process`]); only [`Generator`] touches the network.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::LlmRequest;
use crate::config::LlmConfig;
use crate::events::{emit, Event, EventHandler};
use crate::exec_ctx::ExecCtx;
use crate::extract::{
    validate, Extractor, FailureKind, GenerationError, ProjectOutput, RawModelOutput,
    StreamAccumulator,
};
use crate::ScaffoldError;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Receiving model text.
    Collecting,
    /// Locating the JSON payload in the complete text.
    Extracting,
    /// Parsing and shape-checking the candidate.
    Parsing,
    /// A [`ProjectOutput`] was produced.
    Validated,
    /// The fragment source broke mid-stream.
    StreamFailed,
    /// Cancelled or timed out.
    Aborted,
    /// No JSON-shaped region in the text.
    ExtractionFailed,
    /// The candidate is not valid JSON.
    ParseFailed,
    /// The JSON lacks a valid `codeFiles` mapping.
    SchemaInvalid,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            PipelineState::Collecting | PipelineState::Extracting | PipelineState::Parsing
        )
    }

    /// The terminal state a failure kind ends in.
    pub fn for_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::StreamFailed => PipelineState::StreamFailed,
            FailureKind::Aborted => PipelineState::Aborted,
            FailureKind::Extraction => PipelineState::ExtractionFailed,
            FailureKind::Parse => PipelineState::ParseFailed,
            FailureKind::Schema => PipelineState::SchemaInvalid,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Collecting => "collecting",
            PipelineState::Extracting => "extracting",
            PipelineState::Parsing => "parsing",
            PipelineState::Validated => "validated",
            PipelineState::StreamFailed => "stream-failed",
            PipelineState::Aborted => "aborted",
            PipelineState::ExtractionFailed => "extraction-failed",
            PipelineState::ParseFailed => "parse-failed",
            PipelineState::SchemaInvalid => "schema-invalid",
        };
        f.write_str(s)
    }
}

/// One pass through the state machine.
///
/// Created in [`PipelineState::Collecting`]. [`complete`](Self::complete)
/// and [`fail`](Self::fail) take `self` by value, so every run ends exactly
/// once.
pub struct PipelineRun {
    state: PipelineState,
    handler: Option<Arc<dyn EventHandler>>,
}

impl PipelineRun {
    /// Start a run in `Collecting`, reporting transitions to `handler`.
    pub fn start(handler: Option<Arc<dyn EventHandler>>) -> Self {
        let run = Self {
            state: PipelineState::Collecting,
            handler,
        };
        run.announce();
        run
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(from = %self.state, to = %state, "pipeline transition");
        self.state = state;
        self.announce();
    }

    fn announce(&self) {
        emit(&self.handler, Event::StateChanged { state: self.state });
    }

    /// Collection ended normally; extract, parse and validate `text`.
    pub fn complete(
        mut self,
        text: &str,
        extractor: &Extractor,
    ) -> Result<ProjectOutput, GenerationError> {
        self.enter(PipelineState::Extracting);
        let Some(candidate) = extractor.extract(text) else {
            return Err(self.fail(GenerationError::Extraction {
                raw: text.to_string(),
            }));
        };
        debug!(
            strategy = candidate.strategy,
            len = candidate.text.len(),
            "JSON candidate located"
        );
        emit(
            &self.handler,
            Event::StrategyMatched {
                strategy: candidate.strategy,
            },
        );

        self.enter(PipelineState::Parsing);
        match validate(candidate.text, text) {
            Ok(project) => {
                self.enter(PipelineState::Validated);
                Ok(project)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// End the run in the terminal state matching `error` and hand it back.
    pub fn fail(mut self, error: GenerationError) -> GenerationError {
        self.enter(PipelineState::for_failure(error.kind()));
        error
    }
}

impl std::fmt::Debug for PipelineRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRun")
            .field("state", &self.state)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Extract and validate a complete model response.
///
/// Pure: the same text always gives the same result.
pub fn process(text: &str, extractor: &Extractor) -> Result<ProjectOutput, GenerationError> {
    PipelineRun::start(None).complete(text, extractor)
}

/// A successful run: the validated project plus the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub project: ProjectOutput,
    pub raw: RawModelOutput,
}

/// How a backend call was cut short.
enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

/// Sends one system instruction plus user text to the backend and runs the
/// result through the pipeline.
///
/// # Example
///
/// ```no_run
/// use llm_scaffold::{ExecCtx, Generator, LlmConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = ExecCtx::builder("http://localhost:11434").build()?;
/// let generator = Generator::new("llama3.2:3b")
///     .with_config(LlmConfig::default().with_temperature(0.2))
///     .with_streaming(true);
///
/// let generated = generator
///     .generate(&ctx, "Return a JSON object with codeFiles.", "A todo app")
///     .await?;
/// for (path, _) in generated.project.files() {
///     println!("{}", path);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Generator {
    model: String,
    config: LlmConfig,
    streaming: bool,
    extractor: Extractor,
}

impl Generator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            config: LlmConfig::default(),
            streaming: false,
            extractor: Extractor::default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    fn build_request(&self, system: &str, prompt: &str) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            system_prompt: Some(system.to_string()),
            prompt: prompt.to_string(),
            config: self.config.clone(),
            stream: self.streaming,
        }
    }

    /// Invoke the backend, feeding every fragment into `acc`.
    async fn call_backend(
        &self,
        ctx: &ExecCtx,
        request: &LlmRequest,
        acc: &mut StreamAccumulator,
    ) -> crate::Result<()> {
        let response = if self.streaming {
            let mut on_token = |token: String| acc.push(&token);
            ctx.backend
                .complete_streaming(&ctx.client, &ctx.base_url, request, &mut on_token)
                .await?
        } else {
            let response = ctx
                .backend
                .complete(&ctx.client, &ctx.base_url, request)
                .await?;
            acc.push(&response.text);
            response
        };
        debug!(
            status = response.status,
            metadata = ?response.metadata,
            "backend call finished"
        );
        Ok(())
    }

    /// Collect the model's complete text, or fail with `StreamFailed` /
    /// `Aborted` carrying whatever arrived first.
    async fn collect(
        &self,
        ctx: &ExecCtx,
        system: &str,
        prompt: &str,
    ) -> Result<RawModelOutput, GenerationError> {
        let mut acc = StreamAccumulator::new().with_handler(ctx.event_handler.clone());
        if ctx.is_cancelled() {
            return Err(acc.abort(ScaffoldError::Cancelled.to_string()));
        }

        let request = self.build_request(system, prompt);
        let outcome = {
            let call = self.call_backend(ctx, &request, &mut acc);
            let limited = async {
                match ctx.invocation_timeout {
                    Some(limit) => tokio::time::timeout(limit, call)
                        .await
                        .map_err(|_| Interrupt::TimedOut(limit)),
                    None => Ok(call.await),
                }
            };
            tokio::select! {
                biased;
                _ = ctx.cancellation.cancelled() => Err(Interrupt::Cancelled),
                result = limited => result,
            }
        };

        match outcome {
            Ok(Ok(())) => Ok(acc.finish()),
            Ok(Err(err)) => {
                warn!(error = %err, received = acc.len(), "model call failed");
                Err(acc.fail(err.to_string()))
            }
            Err(Interrupt::Cancelled) => {
                warn!(received = acc.len(), "model call cancelled");
                Err(acc.abort(ScaffoldError::Cancelled.to_string()))
            }
            Err(Interrupt::TimedOut(limit)) => {
                warn!(?limit, received = acc.len(), "model call timed out");
                Err(acc.abort(format!("timed out after {:?}", limit)))
            }
        }
    }

    /// Invoke the model and return its raw text without extracting anything.
    pub async fn invoke(
        &self,
        ctx: &ExecCtx,
        system: &str,
        prompt: &str,
    ) -> Result<RawModelOutput, GenerationError> {
        self.collect(ctx, system, prompt).await
    }

    /// Invoke the model and run the full pipeline on its response.
    pub async fn generate(
        &self,
        ctx: &ExecCtx,
        system: &str,
        prompt: &str,
    ) -> Result<Generated, GenerationError> {
        info!(
            backend = ctx.backend.name(),
            model = %self.model,
            stream = self.streaming,
            "generation started"
        );
        emit(
            &ctx.event_handler,
            Event::InvocationStart {
                backend: ctx.backend.name(),
                model: self.model.clone(),
                stream: self.streaming,
            },
        );

        let run = PipelineRun::start(ctx.event_handler.clone());
        let result = match self.collect(ctx, system, prompt).await {
            Ok(raw) => run
                .complete(raw.text(), &self.extractor)
                .map(|project| Generated { project, raw }),
            Err(err) => Err(run.fail(err)),
        };

        match &result {
            Ok(generated) => info!(
                files = generated.project.len(),
                fragments = generated.raw.fragment_count(),
                "generation finished"
            ),
            Err(err) => warn!(kind = %err.kind(), "generation failed: {}", err),
        }
        emit(
            &ctx.event_handler,
            Event::InvocationEnd { ok: result.is_ok() },
        );
        result
    }
}
