use thiserror::Error;

/// Errors surfaced by the benchmark library.
///
/// Configuration and output plumbing use `anyhow::Result`; the variants here
/// are the transport failures callers are expected to match on.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// The payload request could not be completed (connect, timeout, decode).
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The event stream ended or could not be opened.
    #[error("event stream error: {0}")]
    Stream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchmarkError::HttpStatus {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "server returned HTTP 503: unavailable");

        let err = BenchmarkError::Stream("connection closed".to_string());
        assert_eq!(err.to_string(), "event stream error: connection closed");
    }
}
