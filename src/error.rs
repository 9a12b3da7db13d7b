use std::time::Duration;
use thiserror::Error;

/// Errors produced while connecting to, reading from, or parsing an SSE stream.
///
/// Distinguishes exactly the fault kinds a [`crate::client::StreamClient`] can
/// encounter, so an [`crate::error_strategy::ErrorStrategy`] can make an
/// informed throw-or-continue decision and a [`crate::events::Event::Fault`]
/// carries enough context to diagnose the cause.
#[derive(Error, Debug)]
pub enum SseError {
    /// The server responded with a non-2xx status, or with 204 (treated as an
    /// error per the SSE spec).
    #[error("HTTP error status: {status}")]
    HttpErrorStatus {
        /// The response status code.
        status: u16,
    },

    /// The response's `Content-Type` was not `text/event-stream`, or declared
    /// a non-UTF-8 charset.
    #[error("unexpected content type: {content_type}")]
    ContentTypeError {
        /// The `Content-Type` header value as received (or `"<missing>"`).
        content_type: String,
    },

    /// `response_start_timeout` elapsed before headers arrived.
    #[error("timed out waiting for the response to start")]
    ConnectionTimeout,

    /// `read_timeout` elapsed between two reads on a live connection.
    #[error("timed out waiting for data on an open connection")]
    ReadTimeout,

    /// A transport-level I/O or request failure.
    #[error("transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    /// The server closed the connection cleanly, with no explicit error.
    #[error("connection closed by the server")]
    ClosedByServer,

    /// In streaming-data mode, the connection ended before the event's
    /// terminating blank line was observed.
    #[error("connection closed mid-event, message body incomplete")]
    IncompleteMessage,

    /// `interrupt()` or `close()` aborted an in-flight read. Always bypasses
    /// the error strategy and fails the current read directly.
    #[error("closed by caller")]
    ClosedByCaller,

    /// Configuration could not be built (empty origin URI).
    #[error("invalid configuration: {0}")]
    Build(String),

    /// Escape hatch for custom `ConnectStrategy`/`ErrorStrategy` implementations.
    #[error("{0}")]
    Other(String),
}

impl SseError {
    /// Whether this error kind is, in principle, recoverable by reconnecting.
    /// `ClosedByCaller` is the sole exception: it always bypasses the error
    /// strategy and fails the current read directly.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SseError::ClosedByCaller)
    }

    /// `Retry-After`-style hint, when the failure carries one. None of the
    /// built-in variants populate this; kept as a hook for custom
    /// `ConnectStrategy` implementations layered with their own hints.
    pub fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<anyhow::Error> for SseError {
    fn from(err: anyhow::Error) -> Self {
        SseError::Other(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_status_display() {
        let err = SseError::HttpErrorStatus { status: 500 };
        assert_eq!(err.to_string(), "HTTP error status: 500");
    }

    #[test]
    fn anyhow_conversion() {
        let anyhow_err = anyhow::anyhow!("boom");
        let err: SseError = anyhow_err.into();
        assert!(matches!(err, SseError::Other(msg) if msg == "boom"));
    }

    #[test]
    fn closed_by_caller_is_not_recoverable() {
        assert!(!SseError::ClosedByCaller.is_recoverable());
        assert!(SseError::ClosedByServer.is_recoverable());
    }

    #[test]
    fn retry_after_defaults_to_none() {
        assert!(SseError::ClosedByServer.retry_after().is_none());
    }
}
