//! Terminal failures of a generation run.

use std::fmt;

/// Why a generation run stopped without producing a
/// [`ProjectOutput`](crate::extract::ProjectOutput).
///
/// Every variant carries the text collected so far so the caller can show
/// it to a human. Nothing here is retried or recovered automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The fragment source broke before signalling end of stream.
    #[error("model stream failed: {reason}")]
    StreamFailed {
        /// Transport or provider error description.
        reason: String,
        /// Every fragment received before the failure, concatenated.
        partial: String,
    },

    /// The invocation was cancelled or timed out.
    #[error("model invocation aborted: {reason}")]
    Aborted {
        /// What stopped the invocation (e.g. `"cancelled"`, `"timed out after 300s"`).
        reason: String,
        /// Every fragment received before the abort, concatenated.
        partial: String,
    },

    /// No JSON-shaped region exists in the complete response.
    #[error("no JSON found in the model response")]
    Extraction {
        /// The complete model response.
        raw: String,
    },

    /// A JSON candidate was found but is not valid JSON.
    #[error("model response is not valid JSON: {reason}")]
    Parse {
        /// The serde error message.
        reason: String,
        /// The complete model response (before extraction).
        raw: String,
    },

    /// The JSON parsed but lacks a valid `codeFiles` mapping.
    #[error("missing or invalid codeFiles: {reason}")]
    Schema {
        /// Which part of the shape check failed.
        reason: String,
        /// The complete model response (before extraction).
        raw: String,
    },
}

/// Discriminant of [`GenerationError`], convenient for matching in tests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    StreamFailed,
    Aborted,
    Extraction,
    Parse,
    Schema,
}

impl GenerationError {
    /// The raw or partial model text attached to this failure.
    pub fn raw_text(&self) -> &str {
        match self {
            GenerationError::StreamFailed { partial, .. }
            | GenerationError::Aborted { partial, .. } => partial,
            GenerationError::Extraction { raw }
            | GenerationError::Parse { raw, .. }
            | GenerationError::Schema { raw, .. } => raw,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::StreamFailed { .. } => FailureKind::StreamFailed,
            GenerationError::Aborted { .. } => FailureKind::Aborted,
            GenerationError::Extraction { .. } => FailureKind::Extraction,
            GenerationError::Parse { .. } => FailureKind::Parse,
            GenerationError::Schema { .. } => FailureKind::Schema,
        }
    }

    /// Whether the model finished responding (the failure is about its content,
    /// not about the transport).
    pub fn response_complete(&self) -> bool {
        !matches!(
            self.kind(),
            FailureKind::StreamFailed | FailureKind::Aborted
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::StreamFailed => "stream failed",
            FailureKind::Aborted => "invocation aborted",
            FailureKind::Extraction => "extraction failed",
            FailureKind::Parse => "parse failed",
            FailureKind::Schema => "schema invalid",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_returns_partial_for_transport_failures() {
        let err = GenerationError::StreamFailed {
            reason: "connection reset".into(),
            partial: "{\"codeFi".into(),
        };
        assert_eq!(err.raw_text(), "{\"codeFi");
        assert_eq!(err.kind(), FailureKind::StreamFailed);
        assert!(!err.response_complete());
    }

    #[test]
    fn raw_text_returns_full_response_for_content_failures() {
        let err = GenerationError::Schema {
            reason: "codeFiles is an array".into(),
            raw: "{\"codeFiles\":[]}".into(),
        };
        assert_eq!(err.raw_text(), "{\"codeFiles\":[]}");
        assert!(err.response_complete());
    }

    #[test]
    fn display_names_the_failure() {
        let err = GenerationError::Parse {
            reason: "EOF while parsing".into(),
            raw: String::new(),
        };
        assert_eq!(err.to_string(), "model response is not valid JSON: EOF while parsing");
        assert_eq!(FailureKind::Schema.to_string(), "schema invalid");
    }
}
