//! Event system for generation lifecycle and streaming hooks.
//!
//! Provides an optional, non-intrusive way to observe a generation run.
//! The pipeline emits events when the invocation starts, when fragments
//! arrive, and on every state transition. Display code (spinners, live
//! token echo) subscribes through [`EventHandler`]; the pipeline itself
//! never writes to a terminal.

use std::sync::Arc;

use crate::pipeline::PipelineState;

/// Events emitted during a generation run.
#[derive(Debug, Clone)]
pub enum Event {
    /// The backend call is about to be made.
    InvocationStart {
        /// Backend name (e.g. `"openai"`, `"ollama"`).
        backend: &'static str,
        /// Model identifier sent to the backend.
        model: String,
        /// Whether the streaming endpoint is used.
        stream: bool,
    },
    /// A fragment of model text arrived.
    Fragment {
        /// The fragment text, exactly as received.
        chunk: String,
    },
    /// The pipeline moved to a new state.
    StateChanged {
        /// The state just entered.
        state: PipelineState,
    },
    /// An extraction strategy produced the JSON candidate.
    StrategyMatched {
        /// Strategy name (e.g. `"fenced-json"`, `"outer-braces"`).
        strategy: &'static str,
    },
    /// The run reached a terminal state.
    InvocationEnd {
        /// Whether a validated project was produced.
        ok: bool,
    },
}

/// Handler for generation lifecycle events.
///
/// This is entirely optional -- generation works without an event handler.
///
/// # Example
///
/// ```
/// use llm_scaffold::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::Fragment { chunk } => print!("{}", chunk),
///             Event::InvocationEnd { ok } => println!("\n[done] ok={}", ok),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_scaffold::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Fragment { chunk } = event {
///         print!("{}", chunk);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
