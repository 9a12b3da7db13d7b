//! The event sum type and the client's lifecycle tag.
//!
//! Both the [`crate::parser::EventParser`] and the [`crate::client::StreamClient`]
//! deal exclusively in [`Event`]; [`ReadyState`] is the four-valued tag describing
//! where the client sits in its connect/read/reconnect lifecycle.

use crate::error::SseError;
use std::sync::Arc;
use std::time::Duration;

/// The client's high-level lifecycle state.
///
/// Legal transitions: `Raw -> Connecting -> {Open, Closed}`, `Open -> Closed`,
/// and `{Raw, Connecting, Open, Closed} -> Shutdown`. `Shutdown` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Constructed, never started.
    Raw,
    /// Attempting to open (or re-open) a connection.
    Connecting,
    /// A response has been received and the parser is producing events.
    Open,
    /// Between attempts, after a fault and before the next connect.
    Closed,
    /// Terminal. The client has been disposed and will never reconnect.
    Shutdown,
}

/// A single dispatched SSE event, or a stream-client-level notification.
///
/// The parser yields `Message`, `Comment`, and `SetRetryDelay`; the stream
/// client additionally synthesizes `Started` and `Fault` around each
/// connection's lifetime.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new connection transitioned to `Open`. Always the first event
    /// observed after every transition into `ReadyState::Open`.
    Started,

    /// A dispatched SSE event.
    Message(Message),

    /// A line beginning with `:`; the leading colon has been stripped.
    Comment {
        /// The remainder of the comment line.
        text: String,
    },

    /// A server-supplied `retry:` directive with a valid non-negative
    /// integer millisecond value.
    SetRetryDelay {
        /// The new base reconnect delay.
        duration: Duration,
    },

    /// The active connection terminated, normally or abnormally. Always the
    /// last event observed for the connection it pertains to.
    Fault {
        /// The error that ended the connection.
        error: Arc<SseError>,
    },
}

/// A single dispatched SSE `message` event (or a named custom event).
#[derive(Debug, Clone)]
pub struct Message {
    /// The event name. Defaults to `"message"` when the stream omits `event:`.
    pub name: String,
    /// The concatenation of `data:` lines, joined by `\n`, trailing newline
    /// stripped.
    pub data: String,
    /// The most recently observed `id:`, carried over from prior events in
    /// this connection (or `None` if no `id:` has ever been seen).
    pub last_event_id: Option<String>,
    /// The origin URI of the connection that produced this event.
    pub origin: String,
}

