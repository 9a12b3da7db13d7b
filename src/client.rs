//! The stream client state machine: the core read loop wiring the backoff
//! policy, connect strategy, event parser, and error strategy together.
//!
//! One logical reader per client, same concurrency contract as every other
//! `&self`-async-method type in this codebase (compare
//! [`crate::backend::Backend`]): callers must not invoke
//! [`StreamClient::read_any_event`] concurrently from two contexts, while
//! [`StreamClient::interrupt`], [`StreamClient::restart`], and
//! [`StreamClient::close`] are safe from any context at any time.

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::connect::{Connection, ConnectParams};
use crate::error::{Result, SseError};
use crate::error_strategy::Disposition;
use crate::events::{Event, Message, ReadyState};
use crate::logger::{log_at, Level};
use crate::parser::EventParser;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

impl ReadyState {
    fn to_u8(self) -> u8 {
        match self {
            ReadyState::Raw => 0,
            ReadyState::Connecting => 1,
            ReadyState::Open => 2,
            ReadyState::Closed => 3,
            ReadyState::Shutdown => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Raw,
            1 => ReadyState::Connecting,
            2 => ReadyState::Open,
            3 => ReadyState::Closed,
            _ => ReadyState::Shutdown,
        }
    }
}

#[derive(Default)]
struct Inner {
    parser: Option<EventParser>,
    body: Option<BoxStream<'static, Result<Bytes>>>,
    closer: Option<Box<dyn FnOnce() + Send>>,
    pending: VecDeque<Event>,
    opened_at: Option<Instant>,
    first_attempt: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            first_attempt: true,
            ..Default::default()
        }
    }

    fn release(&mut self) {
        self.parser = None;
        self.body = None;
        self.pending.clear();
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

enum ChunkOutcome {
    Data(Bytes),
    Eof,
}

/// The stream client. Owns the reconnect loop and exposes the pull API.
pub struct StreamClient {
    config: StreamConfig,
    state: AtomicU8,
    root_token: CancellationToken,
    child_token: Mutex<CancellationToken>,
    force_immediate: AtomicBool,
    backoff: tokio::sync::Mutex<BackoffPolicy>,
    last_event_id: Mutex<Option<String>>,
    inner: tokio::sync::Mutex<Inner>,
}

impl StreamClient {
    /// Build a client from a validated configuration. Starts in `Raw`.
    pub fn new(config: StreamConfig) -> Self {
        let root_token = CancellationToken::new();
        let child_token = root_token.child_token();
        let backoff = BackoffPolicy::new(config.initial_retry_delay, config.max_retry_delay);
        let last_event_id = config.last_event_id.clone();
        Self {
            config,
            state: AtomicU8::new(ReadyState::Raw.to_u8()),
            root_token,
            child_token: Mutex::new(child_token),
            force_immediate: AtomicBool::new(false),
            backoff: tokio::sync::Mutex::new(backoff),
            last_event_id: Mutex::new(last_event_id),
            inner: tokio::sync::Mutex::new(Inner::new()),
        }
    }

    /// The client's current lifecycle state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The most recently observed `id:`, if any.
    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.lock().unwrap().clone()
    }

    /// Transition `Raw -> Connecting` without consuming an event. Idempotent;
    /// a no-op if the client is already past `Raw`.
    pub fn start(&self) {
        let _ = self.state.compare_exchange(
            ReadyState::Raw.to_u8(),
            ReadyState::Connecting.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Force the current connection closed. The next read reconnects,
    /// subject to the ordinary backoff schedule. Safe to call from any
    /// context at any time.
    pub fn interrupt(&self) {
        self.child_token.lock().unwrap().cancel();
    }

    /// Like [`Self::interrupt`], but the next connect attempt runs with zero
    /// delay instead of the ordinary backoff schedule.
    pub fn restart(&self) {
        self.force_immediate.store(true, Ordering::SeqCst);
        self.interrupt();
    }

    /// Transition to `Shutdown`. Cancels any outstanding read and releases
    /// the current connection. Terminal: the client never reconnects after
    /// this call.
    pub fn close(&self) {
        self.state.store(ReadyState::Shutdown.to_u8(), Ordering::SeqCst);
        self.root_token.cancel();
    }

    fn set_state(&self, state: ReadyState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Sets the state unless the client has already been shut down, so a
    /// cancelled in-flight read can't resurrect a closed client out of
    /// `Shutdown`.
    fn set_state_unless_shutdown(&self, state: ReadyState) {
        if self.ready_state() != ReadyState::Shutdown {
            self.set_state(state);
        }
    }

    fn current_child(&self) -> CancellationToken {
        self.child_token.lock().unwrap().clone()
    }

    /// The primitive pull API. Yields `Started`, `Message`, `Comment`,
    /// `SetRetryDelay`, and `Fault`.
    pub async fn read_any_event(&self) -> Result<Event> {
        loop {
            if self.root_token.is_cancelled() {
                self.set_state(ReadyState::Shutdown);
                return Err(SseError::ClosedByCaller);
            }

            match self.ready_state() {
                ReadyState::Shutdown => return Err(SseError::ClosedByCaller),
                ReadyState::Open => {
                    if let Some(event) = self.next_open_event().await? {
                        return Ok(event);
                    }
                    // No event and no error: more bytes were buffered but
                    // produced no complete event yet. Loop and try again.
                }
                ReadyState::Raw | ReadyState::Connecting | ReadyState::Closed => {
                    if let Some(outcome) = self.attempt_connect().await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Convenience wrapper over [`Self::read_any_event`] that skips
    /// everything but `Message`.
    pub async fn read_message(&self) -> Result<Message> {
        loop {
            if let Event::Message(message) = self.read_any_event().await? {
                return Ok(message);
            }
        }
    }

    /// Drives one pass of the connecting state: sleeps the backoff delay
    /// (unless this is the first attempt or a restart forced immediacy),
    /// opens a connection, and either returns `Started` or a `Fault`/error.
    async fn attempt_connect(&self) -> Result<Option<Event>> {
        self.set_state(ReadyState::Connecting);
        let child = self.root_token.child_token();
        *self.child_token.lock().unwrap() = child.clone();

        let mut inner = self.inner.lock().await;
        inner.release();

        let force = self.force_immediate.swap(false, Ordering::SeqCst);
        if inner.first_attempt || force {
            inner.first_attempt = false;
            if force {
                self.backoff.lock().await.reset();
            }
        } else {
            let delay = self.backoff.lock().await.next_delay();
            log_at!(self.config.logger, Level::Debug, "sleeping {:?} before reconnect", delay);
            tokio::select! {
                biased;
                _ = child.cancelled() => {
                    self.set_state_unless_shutdown(ReadyState::Closed);
                    return Err(SseError::ClosedByCaller);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let last_id = self.last_event_id.lock().unwrap().clone();
        let params = ConnectParams::new(last_id.clone());

        log_at!(self.config.logger, Level::Debug, "connecting to {}", self.config.uri);

        let connect_fut = self.config.connect_strategy.connect(&params);
        let connect_result: Result<Connection> = match self.config.response_start_timeout {
            Some(timeout) => {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => Err(SseError::ClosedByCaller),
                    res = tokio::time::timeout(timeout, connect_fut) => {
                        res.map_err(|_| SseError::ConnectionTimeout).and_then(|r| r)
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => Err(SseError::ClosedByCaller),
                    res = connect_fut => res,
                }
            }
        };

        match connect_result {
            Ok(conn) => {
                inner.parser = Some(EventParser::new(conn.origin, last_id));
                inner.body = Some(conn.body);
                inner.closer = Some(conn.closer);
                inner.opened_at = Some(Instant::now());
                self.set_state(ReadyState::Open);
                log_at!(self.config.logger, Level::Debug, "connection opened");
                Ok(Some(Event::Started))
            }
            Err(SseError::ClosedByCaller) => {
                self.set_state_unless_shutdown(ReadyState::Closed);
                Err(SseError::ClosedByCaller)
            }
            Err(err) => {
                self.set_state_unless_shutdown(ReadyState::Closed);
                log_at!(self.config.logger, Level::Warn, "connect failed: {}", err);
                self.resolve_fault(err).await.map(Some)
            }
        }
    }

    /// Drives one pass of the open state: returns the next buffered event,
    /// or reads more bytes and feeds the parser if none are buffered.
    /// Returns `Ok(None)` when bytes were read but produced no complete
    /// event yet, so the caller should loop.
    async fn next_open_event(&self) -> Result<Option<Event>> {
        let child = self.current_child();
        let mut inner = self.inner.lock().await;

        if let Some(event) = inner.pending.pop_front() {
            drop(inner);
            self.observe_outgoing(&event).await;
            return Ok(Some(event));
        }

        if child.is_cancelled() {
            inner.release();
            drop(inner);
            self.set_state_unless_shutdown(ReadyState::Closed);
            return Err(SseError::ClosedByCaller);
        }

        match self.read_next_chunk(&mut inner, &child).await {
            Ok(ChunkOutcome::Data(bytes)) => {
                let events = {
                    let parser = inner.parser.as_mut().expect("open state implies a parser");
                    let events = parser.feed(&bytes);
                    if let Some(id) = parser.last_event_id() {
                        *self.last_event_id.lock().unwrap() = Some(id.to_string());
                    }
                    events
                };
                inner.pending.extend(events);
                Ok(None)
            }
            Ok(ChunkOutcome::Eof) => {
                // `IncompleteMessage` only applies to streaming-data mode,
                // where a caller observes a partially delivered event body.
                // This crate always buffers `data:` to a string, so a clean
                // EOF is reported as a plain server close regardless of
                // whether a trailing blank line was ever seen.
                let err = if self.config.stream_event_data {
                    let finish_ok = inner
                        .parser
                        .as_ref()
                        .map(|p| p.finish().is_ok())
                        .unwrap_or(true);
                    if finish_ok {
                        SseError::ClosedByServer
                    } else {
                        SseError::IncompleteMessage
                    }
                } else {
                    SseError::ClosedByServer
                };
                self.close_open_connection(&mut inner).await;
                drop(inner);
                self.resolve_fault(err).await.map(Some)
            }
            Err(SseError::ClosedByCaller) => {
                inner.release();
                drop(inner);
                self.set_state_unless_shutdown(ReadyState::Closed);
                Err(SseError::ClosedByCaller)
            }
            Err(err) => {
                self.close_open_connection(&mut inner).await;
                drop(inner);
                log_at!(self.config.logger, Level::Warn, "connection faulted: {}", err);
                self.resolve_fault(err).await.map(Some)
            }
        }
    }

    async fn read_next_chunk(
        &self,
        inner: &mut Inner,
        child: &CancellationToken,
    ) -> Result<ChunkOutcome> {
        let body = inner.body.as_mut().expect("open state implies a response body");
        let fut = body.next();

        let outcome = match self.config.read_timeout {
            Some(timeout) => {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => return Err(SseError::ClosedByCaller),
                    res = tokio::time::timeout(timeout, fut) => {
                        res.map_err(|_| SseError::ReadTimeout)?
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => return Err(SseError::ClosedByCaller),
                    opt = fut => opt,
                }
            }
        };

        match outcome {
            Some(Ok(bytes)) => Ok(ChunkOutcome::Data(bytes)),
            Some(Err(err)) => Err(err),
            None => Ok(ChunkOutcome::Eof),
        }
    }

    /// Resets the backoff counter if the connection earned it, releases
    /// connection resources, and transitions `Closed`.
    async fn close_open_connection(&self, inner: &mut Inner) {
        let stayed_open_long_enough = inner
            .opened_at
            .map(|since| since.elapsed() >= self.config.backoff_reset_threshold)
            .unwrap_or(false);
        if stayed_open_long_enough {
            self.backoff.lock().await.reset();
        }
        inner.release();
        self.set_state_unless_shutdown(ReadyState::Closed);
    }

    /// Consults the error strategy and turns the outcome into either a
    /// `Fault` event (continue reconnecting) or a failed read (throw).
    async fn resolve_fault(&self, error: SseError) -> Result<Event> {
        match self.config.error_strategy.apply(&error).await {
            Disposition::Continue => Ok(Event::Fault {
                error: Arc::new(error),
            }),
            Disposition::Throw => Err(error),
        }
    }

    /// Side effects that accompany delivering an event to the caller: folding
    /// a `SetRetryDelay` into the backoff base. `last_event_id` tracking
    /// happens as soon as the parser sees an `id:` field (in
    /// `next_open_event`), independent of whether that field ends up
    /// attached to a dispatched `Message`.
    async fn observe_outgoing(&self, event: &Event) {
        if let Event::SetRetryDelay { duration } = event {
            self.backoff.lock().await.set_base_delay(*duration);
        }
    }
}
