//! The transport capability consumed by the stream client.
//!
//! [`ConnectStrategy`] abstracts over "open one HTTP response to the event
//! stream," the same way [`crate::backend::Backend`] abstracts over "call one
//! LLM provider" in this codebase's lineage: a single async method, object-safe,
//! used as `Arc<dyn ConnectStrategy>`. [`ReqwestConnectStrategy`] is the default,
//! built on `reqwest::Client` exactly as [`crate::backend::ollama::OllamaBackend`]
//! is built on it.

use crate::error::{Result, SseError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{header, Client, Method};
use std::collections::HashMap;
use std::time::Duration;

/// Everything a [`ConnectStrategy`] needs to open one connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// The `Last-Event-ID` to send, if one is known.
    pub last_event_id: Option<String>,
}

impl ConnectParams {
    /// Build params carrying the given last-event-id seed.
    pub fn new(last_event_id: Option<String>) -> Self {
        Self { last_event_id }
    }
}

/// A live connection's response body plus a releaser for its resources.
pub struct Connection {
    /// The response body as a stream of byte chunks.
    pub body: BoxStream<'static, Result<Bytes>>,
    /// The origin URI this connection was opened against.
    pub origin: String,
    /// Releases the underlying socket/response when dropped or called
    /// explicitly. `reqwest` already releases the connection back to its
    /// pool on drop, so this is a no-op hook for strategies layered over a
    /// transport that needs explicit teardown.
    pub closer: Box<dyn FnOnce() + Send>,
}

/// Opens one HTTP response to the event stream.
///
/// A single operation, matching this codebase's established shape for
/// pluggable collaborators (compare [`crate::backend::Backend::complete`]).
/// The core never inspects a strategy's internal configuration; it only
/// calls [`ConnectStrategy::connect`] and consumes the resulting
/// [`Connection`].
#[async_trait]
pub trait ConnectStrategy: Send + Sync {
    /// Attempt to open one connection. Errors surface as a `Fault` (subject
    /// to the configured [`crate::error_strategy::ErrorStrategy`]).
    async fn connect(&self, params: &ConnectParams) -> Result<Connection>;

    /// A short name for diagnostics/logging.
    fn name(&self) -> &'static str {
        "connect-strategy"
    }
}

/// The default [`ConnectStrategy`], built on `reqwest::Client`.
///
/// Constructed once per [`crate::client::StreamClient`] and reused across
/// reconnects: the underlying connection pool is shared, only the response
/// body and its closer are per-connection.
pub struct ReqwestConnectStrategy {
    client: Client,
    uri: String,
    method: Method,
    body: Option<(String, Bytes)>,
    headers: HashMap<String, String>,
    response_start_timeout: Option<Duration>,
}

impl ReqwestConnectStrategy {
    /// Build a strategy targeting `uri` with a fresh `reqwest::Client`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_client(Client::new(), uri)
    }

    /// Build a strategy targeting `uri`, reusing a caller-supplied client
    /// (so its connection pool can be shared across multiple stream clients).
    pub fn with_client(client: Client, uri: impl Into<String>) -> Self {
        Self {
            client,
            uri: uri.into(),
            method: Method::GET,
            body: None,
            headers: HashMap::new(),
            response_start_timeout: None,
        }
    }

    /// Override the request method (default `GET`).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Attach a request body with the given content-type. The `;`-delimited
    /// suffix of `content_type`, if any, is stripped.
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let content_type = content_type.into();
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or(&content_type)
            .to_string();
        self.body = Some((content_type, body.into()));
        self
    }

    /// Add a header sent on every request. `accept`, `cache-control`, and
    /// `last-event-id` are reserved and silently ignored here (the strategy
    /// sets them itself); `content-type` is ignored when a body is set via
    /// [`Self::body`].
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let reserved = matches!(
            name.to_ascii_lowercase().as_str(),
            "accept" | "cache-control" | "last-event-id"
        );
        if !reserved {
            self.headers.insert(name, value.into());
        }
        self
    }

    /// Bound the time to wait for response headers.
    pub fn response_start_timeout(mut self, timeout: Duration) -> Self {
        self.response_start_timeout = Some(timeout);
        self
    }

    fn build_request(&self, params: &ConnectParams) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(self.method.clone(), &self.uri)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache");

        if let Some(id) = &params.last_event_id {
            req = req.header("Last-Event-ID", id);
        }

        for (name, value) in &self.headers {
            if self.body.is_some() && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            req = req.header(name, value);
        }

        if let Some((content_type, body)) = &self.body {
            req = req.header(header::CONTENT_TYPE, content_type).body(body.clone());
        }

        req
    }
}

#[async_trait]
impl ConnectStrategy for ReqwestConnectStrategy {
    async fn connect(&self, params: &ConnectParams) -> Result<Connection> {
        let request = self.build_request(params);

        let send = request.send();
        let response = match self.response_start_timeout {
            Some(timeout) => tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| SseError::ConnectionTimeout)?
                .map_err(SseError::TransportError)?,
            None => send.await.map_err(SseError::TransportError)?,
        };

        let status = response.status();
        if status.as_u16() == 204 || !status.is_success() {
            return Err(SseError::HttpErrorStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>")
            .to_string();

        let mut parts = content_type.split(';');
        let media_type = parts.next().unwrap_or("").trim();
        if media_type != "text/event-stream" {
            return Err(SseError::ContentTypeError { content_type });
        }
        let charset = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim().eq_ignore_ascii_case("charset").then(|| {
                value.trim().trim_matches('"').to_string()
            })
        });
        if let Some(charset) = charset {
            if !charset.eq_ignore_ascii_case("utf-8") {
                return Err(SseError::ContentTypeError { content_type });
            }
        }

        let origin = response.url().to_string();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(SseError::TransportError))
            .boxed();

        Ok(Connection {
            body,
            origin,
            closer: Box::new(|| {}),
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_strips_parameters_from_content_type() {
        let strategy =
            ReqwestConnectStrategy::new("http://example.test").body("application/json; charset=utf-8", Bytes::from_static(b"{}"));
        let (content_type, _) = strategy.body.as_ref().unwrap();
        assert_eq!(content_type, "application/json");
    }

    #[test]
    fn reserved_headers_are_ignored() {
        let strategy = ReqwestConnectStrategy::new("http://example.test")
            .header("Accept", "application/json")
            .header("X-Custom", "value");
        assert!(!strategy.headers.contains_key("Accept"));
        assert_eq!(strategy.headers.get("X-Custom").unwrap(), "value");
    }

    #[test]
    fn default_method_is_get() {
        let strategy = ReqwestConnectStrategy::new("http://example.test");
        assert_eq!(strategy.method, Method::GET);
    }

    fn charset_is_acceptable(content_type: &str) -> bool {
        let mut parts = content_type.split(';');
        let media_type = parts.next().unwrap_or("").trim();
        if media_type != "text/event-stream" {
            return false;
        }
        let charset = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        charset.map(|c| c.eq_ignore_ascii_case("utf-8")).unwrap_or(true)
    }

    #[test]
    fn missing_charset_is_accepted() {
        assert!(charset_is_acceptable("text/event-stream"));
    }

    #[test]
    fn utf8_charset_is_accepted() {
        assert!(charset_is_acceptable("text/event-stream; charset=utf-8"));
        assert!(charset_is_acceptable("text/event-stream; charset=\"UTF-8\""));
    }

    #[test]
    fn non_utf8_charset_is_rejected() {
        assert!(!charset_is_acceptable(
            "text/event-stream; charset=iso-8859-1"
        ));
    }
}
