//! Validated, immutable parameter bundle consumed by the stream client on
//! construction.
//!
//! Follows the `ExecCtxBuilder` pattern already in this codebase: owned
//! builder methods returning `Self`, a terminal `.build()` that clamps
//! out-of-range numeric inputs instead of panicking or returning a `Result`.
//! The only construction failure this builder recognizes is an empty origin
//! URI.

use crate::connect::{ConnectStrategy, ReqwestConnectStrategy};
use crate::error::{Result, SseError};
use crate::error_strategy::{AlwaysContinue, ErrorStrategy};
use crate::logger::{FacadeLogger, Logger};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_RESET_THRESHOLD: Duration = Duration::from_secs(60);
const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Immutable configuration for a [`crate::client::StreamClient`].
pub struct StreamConfig {
    pub(crate) uri: String,
    pub(crate) initial_retry_delay: Duration,
    pub(crate) max_retry_delay: Duration,
    pub(crate) backoff_reset_threshold: Duration,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) response_start_timeout: Option<Duration>,
    pub(crate) last_event_id: Option<String>,
    pub(crate) error_strategy: Arc<dyn ErrorStrategy>,
    pub(crate) connect_strategy: Arc<dyn ConnectStrategy>,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) read_buffer_size: usize,
    pub(crate) stream_event_data: bool,
}

impl StreamConfig {
    /// Start building a configuration targeting `uri`.
    pub fn builder(uri: impl Into<String>) -> StreamConfigBuilder {
        StreamConfigBuilder {
            uri: uri.into(),
            initial_retry_delay: None,
            max_retry_delay: None,
            backoff_reset_threshold: None,
            read_timeout: None,
            response_start_timeout: None,
            last_event_id: None,
            error_strategy: None,
            connect_strategy: None,
            logger: None,
            read_buffer_size: None,
            stream_event_data: false,
        }
    }

    /// The origin URI this configuration connects to.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("uri", &self.uri)
            .field("initial_retry_delay", &self.initial_retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("backoff_reset_threshold", &self.backoff_reset_threshold)
            .field("read_timeout", &self.read_timeout)
            .field("response_start_timeout", &self.response_start_timeout)
            .field("last_event_id", &self.last_event_id)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("stream_event_data", &self.stream_event_data)
            .field("connect_strategy", &self.connect_strategy.name())
            .finish()
    }
}

/// Builder for [`StreamConfig`].
pub struct StreamConfigBuilder {
    uri: String,
    initial_retry_delay: Option<Duration>,
    max_retry_delay: Option<Duration>,
    backoff_reset_threshold: Option<Duration>,
    read_timeout: Option<Duration>,
    response_start_timeout: Option<Duration>,
    last_event_id: Option<String>,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
    connect_strategy: Option<Arc<dyn ConnectStrategy>>,
    logger: Option<Arc<dyn Logger>>,
    read_buffer_size: Option<usize>,
    stream_event_data: bool,
}

impl StreamConfigBuilder {
    /// Initial reconnect delay. Default 1s.
    pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = Some(delay);
        self
    }

    /// Upper bound on reconnect delay. Default 30s.
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    /// How long a connection must stay `Open` before the backoff attempt
    /// counter resets. Default 60s.
    pub fn backoff_reset_threshold(mut self, threshold: Duration) -> Self {
        self.backoff_reset_threshold = Some(threshold);
        self
    }

    /// Maximum gap between reads on a live connection before it is
    /// considered dead. Unset by default (no read timeout).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Maximum time to wait for response headers. Unset by default.
    pub fn response_start_timeout(mut self, timeout: Duration) -> Self {
        self.response_start_timeout = Some(timeout);
        self
    }

    /// Seed the `Last-Event-ID` sent on the very first request.
    pub fn last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }

    /// Set the error-handling policy. Default [`AlwaysContinue`].
    pub fn error_strategy(mut self, strategy: Arc<dyn ErrorStrategy>) -> Self {
        self.error_strategy = Some(strategy);
        self
    }

    /// Override the transport. Default [`ReqwestConnectStrategy`] built from
    /// this configuration's `uri`.
    pub fn connect_strategy(mut self, strategy: Arc<dyn ConnectStrategy>) -> Self {
        self.connect_strategy = Some(strategy);
        self
    }

    /// Set the logging capability. Default [`FacadeLogger`].
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Initial capacity of the parser's line buffer. Default ≈4 KiB. Zero is
    /// clamped up to 1.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = Some(size);
        self
    }

    /// Stream `data:` as an incremental byte sequence rather than buffering
    /// to a string. Default `false`.
    pub fn stream_event_data(mut self, enabled: bool) -> Self {
        self.stream_event_data = enabled;
        self
    }

    /// Build the configuration. Fails only if `uri` is empty.
    pub fn build(self) -> Result<StreamConfig> {
        if self.uri.trim().is_empty() {
            return Err(SseError::Build("origin URI must not be empty".to_string()));
        }

        let initial_retry_delay = self
            .initial_retry_delay
            .unwrap_or(DEFAULT_INITIAL_RETRY_DELAY);
        let max_retry_delay = self
            .max_retry_delay
            .unwrap_or(DEFAULT_MAX_RETRY_DELAY)
            .max(initial_retry_delay);
        let read_buffer_size = self.read_buffer_size.unwrap_or(DEFAULT_READ_BUFFER_SIZE).max(1);

        let connect_strategy = self
            .connect_strategy
            .unwrap_or_else(|| Arc::new(ReqwestConnectStrategy::new(self.uri.clone())));

        Ok(StreamConfig {
            uri: self.uri,
            initial_retry_delay,
            max_retry_delay,
            backoff_reset_threshold: self
                .backoff_reset_threshold
                .unwrap_or(DEFAULT_BACKOFF_RESET_THRESHOLD),
            read_timeout: self.read_timeout,
            response_start_timeout: self.response_start_timeout,
            last_event_id: self.last_event_id,
            error_strategy: self.error_strategy.unwrap_or_else(|| Arc::new(AlwaysContinue)),
            connect_strategy,
            logger: self.logger.unwrap_or_else(|| Arc::new(FacadeLogger)),
            read_buffer_size,
            stream_event_data: self.stream_event_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uri_fails_construction() {
        let err = StreamConfig::builder("   ").build().unwrap_err();
        assert!(matches!(err, SseError::Build(_)));
    }

    #[test]
    fn defaults_are_applied() {
        let config = StreamConfig::builder("http://example.test/stream")
            .build()
            .unwrap();
        assert_eq!(config.initial_retry_delay, DEFAULT_INITIAL_RETRY_DELAY);
        assert_eq!(config.max_retry_delay, DEFAULT_MAX_RETRY_DELAY);
        assert_eq!(
            config.backoff_reset_threshold,
            DEFAULT_BACKOFF_RESET_THRESHOLD
        );
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert!(!config.stream_event_data);
    }

    #[test]
    fn max_retry_delay_is_clamped_up_to_initial() {
        let config = StreamConfig::builder("http://example.test")
            .initial_retry_delay(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(config.max_retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn zero_read_buffer_size_is_clamped_to_one() {
        let config = StreamConfig::builder("http://example.test")
            .read_buffer_size(0)
            .build()
            .unwrap();
        assert_eq!(config.read_buffer_size, 1);
    }

    #[test]
    fn last_event_id_is_carried_into_config() {
        let config = StreamConfig::builder("http://example.test")
            .last_event_id("seed-id")
            .build()
            .unwrap();
        assert_eq!(config.last_event_id.as_deref(), Some("seed-id"));
    }
}
