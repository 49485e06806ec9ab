//! # llm-scaffold
//!
//! Generate a multi-file project from a plain-language description by asking
//! an LLM for a JSON document of files, then writing those files to disk.
//!
//! The interesting part is the response pipeline: model output arrives as
//! free text, possibly streamed, possibly wrapped in prose or markdown,
//! possibly cut off. The pipeline collects it, locates the JSON payload,
//! parses it, and checks its shape before anything touches the filesystem.
//!
//! ## Core Concepts
//!
//! - **[`Backend`]**: object-safe trait over providers ([`OpenAiBackend`],
//!   [`OllamaBackend`], [`MockBackend`] for tests).
//! - **[`ExecCtx`]**: HTTP client, backend, endpoint, cancellation token,
//!   timeout, optional [`EventHandler`].
//! - **[`Generator`]**: runs one invocation, system instruction plus user text in,
//!   [`ProjectOutput`] or a [`GenerationError`] out.
//! - **[`Extractor`]**: ordered [`ExtractStrategy`] list that finds the JSON
//!   in free text.
//! - **[`materialize`]**: writes a validated project under a base directory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_scaffold::{materialize, AppType, ExecCtx, Generator, OllamaBackend};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecCtx::builder("http://localhost:11434")
//!         .backend(Arc::new(OllamaBackend))
//!         .build()?;
//!
//!     let generated = Generator::new("llama3.2:3b")
//!         .with_streaming(true)
//!         .generate(&ctx, AppType::SimpleCode.system_instruction(), "FizzBuzz in Python")
//!         .await?;
//!
//!     let report = materialize(&generated.project, Path::new("output/fizzbuzz"))?;
//!     println!("wrote {} files", report.files.len());
//!     Ok(())
//! }
//! ```
//!
//! Failures keep the model text collected so far:
//!
//! ```
//! use llm_scaffold::{process, Extractor, FailureKind};
//!
//! let err = process("Sorry, I cannot do that.", &Extractor::default()).unwrap_err();
//! assert_eq!(err.kind(), FailureKind::Extraction);
//! assert_eq!(err.raw_text(), "Sorry, I cannot do that.");
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod extract;
pub mod materialize;
pub mod pipeline;
pub mod templates;

pub use backend::{
    make_backend, Backend, LlmRequest, LlmResponse, MockBackend, OllamaBackend, OpenAiBackend,
    ProviderKind,
};
pub use config::{CliOverrides, LlmConfig, ResolvedConfig, Settings};
pub use error::{Result, ScaffoldError};
pub use events::{Event, EventHandler, FnEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use extract::{
    collect_fragments, validate, BraceFallback, ExtractStrategy, Extractor, FailureKind,
    GenerationError, ProjectOutput, RawModelOutput, StreamAccumulator,
};
pub use materialize::{
    materialize, save_raw_output, MaterializeError, MaterializeReport, WrittenFile,
};
pub use pipeline::{process, Generated, Generator, PipelineRun, PipelineState};
pub use templates::AppType;
