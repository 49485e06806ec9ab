use thiserror::Error;

/// Errors produced by backends and configuration.
#[derive(Error, Debug)]
pub enum ScaffoldError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization or parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code and response body.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The provider reported an error inside an otherwise successful stream.
    #[error("provider error: {0}")]
    Provider(String),

    /// The invocation was cancelled before it started.
    #[error("generation was cancelled")]
    Cancelled,

    /// Invalid configuration detected before any network call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScaffoldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_includes_status_and_body() {
        let err = ScaffoldError::HttpError {
            status: 401,
            body: "invalid api key".into(),
        };
        assert_eq!(err.to_string(), "HTTP 401: invalid api key");
    }

    #[test]
    fn cancelled_message() {
        assert_eq!(
            ScaffoldError::Cancelled.to_string(),
            "generation was cancelled"
        );
    }
}
