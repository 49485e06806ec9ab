//! # Response extraction and validation
//!
//! Turns unstructured, possibly streamed model text into a validated
//! [`ProjectOutput`].
//!
//! | Step | Item |
//! |------|------|
//! | Accumulate fragments | [`StreamAccumulator`], [`collect_fragments`] |
//! | Locate the JSON payload | [`Extractor`] over [`ExtractStrategy`] values |
//! | Parse and shape-check | [`validate`] |
//! | Failure taxonomy | [`GenerationError`], [`FailureKind`] |

pub mod accumulator;
pub mod error;
pub mod strategy;
pub mod validate;

pub use accumulator::{collect_fragments, RawModelOutput, StreamAccumulator};
pub use error::{FailureKind, GenerationError};
pub use strategy::{
    BalancedBraces, BraceFallback, Candidate, ExtractStrategy, Extractor, FencedJson, OuterBraces,
};
pub use validate::{validate, ProjectOutput};
