//! Incremental SSE line/event parser.
//!
//! Implements the WHATWG SSE "process the field" and "dispatch the event"
//! algorithm byte-for-byte, including case-sensitive field-name comparison
//! (a deliberate fix over naive case-insensitive matching), `id:` carry-over
//! across events, and `retry:` directives. Operates over arbitrary chunk
//! boundaries the way [`crate::streaming::StreamingDecoder`] in this
//! codebase's lineage buffers partial JSON lines across TCP reads, except the
//! unit here is complete SSE lines rather than complete JSON values, and a
//! `\r\n` terminator split exactly at a chunk boundary must still count as
//! one line ending, not two.

use crate::events::{Event, Message};

const INITIAL_LINE_CAPACITY: usize = 1024;

/// Incrementally decodes a byte stream into [`Event`]s.
///
/// Feed raw bytes with [`EventParser::feed`], which returns every event fully
/// dispatched by the new bytes. The parser is per-connection: construct a
/// fresh one for every new connection, and call [`EventParser::finish`] when
/// the underlying stream ends to detect a truncated trailing event.
pub struct EventParser {
    origin: String,
    pending_line: Vec<u8>,
    saw_cr: bool,
    event_name: String,
    data_buffer: String,
    last_event_id: Option<String>,
    has_data: bool,
}

impl EventParser {
    /// Create a parser for a connection to `origin`, seeded with the
    /// `last_event_id` known before this connection (so it is carried
    /// forward even if this connection never sees an `id:` line).
    pub fn new(origin: impl Into<String>, last_event_id: Option<String>) -> Self {
        Self {
            origin: origin.into(),
            pending_line: Vec::with_capacity(INITIAL_LINE_CAPACITY),
            saw_cr: false,
            event_name: String::new(),
            data_buffer: String::new(),
            last_event_id,
            has_data: false,
        }
    }

    /// The last `id:` value observed by this parser so far, if any.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Feed a chunk of raw bytes and return every event dispatched as a
    /// result. Handles `\n`, `\r`, and `\r\n` line terminators identically;
    /// a `\r\n` pair split across two calls to `feed` still counts as a
    /// single terminator.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.saw_cr {
                self.saw_cr = false;
                if byte == b'\n' {
                    // Second half of a \r\n terminator already dispatched
                    // when the \r was seen. Swallow it.
                    continue;
                }
                // The \r was a standalone terminator; `byte` starts the next
                // line and falls through to normal handling below.
            }

            match byte {
                b'\n' => {
                    if let Some(event) = self.end_line() {
                        events.push(event);
                    }
                }
                b'\r' => {
                    self.saw_cr = true;
                    if let Some(event) = self.end_line() {
                        events.push(event);
                    }
                }
                other => {
                    if self.pending_line.len() < INITIAL_LINE_CAPACITY * 1024 {
                        self.pending_line.push(other);
                    }
                    // Lines far beyond any realistic field are dropped
                    // rather than grown unboundedly; the field they belong
                    // to is, in practice, already unrecognisable at this
                    // length.
                }
            }
        }

        events
    }

    /// Call when the underlying stream has ended. Returns an error if a
    /// partially-dispatched event was discarded (no trailing blank line ever
    /// arrived to dispatch it).
    pub fn finish(&self) -> Result<(), ()> {
        if self.has_data || !self.event_name.is_empty() {
            return Err(());
        }
        Ok(())
    }

    fn end_line(&mut self) -> Option<Event> {
        let line_bytes = std::mem::replace(
            &mut self.pending_line,
            Vec::with_capacity(INITIAL_LINE_CAPACITY),
        );
        let line = String::from_utf8_lossy(&line_bytes);
        self.process_line(&line)
    }

    fn process_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch();
        }

        if let Some(text) = line.strip_prefix(':') {
            return Some(Event::Comment {
                text: text.to_string(),
            });
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event_name = value.to_string();
                None
            }
            "data" => {
                self.data_buffer.push_str(value);
                self.data_buffer.push('\n');
                self.has_data = true;
                None
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
                None
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(millis) = value.parse::<u64>() {
                        return Some(Event::SetRetryDelay {
                            duration: std::time::Duration::from_millis(millis),
                        });
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn dispatch(&mut self) -> Option<Event> {
        if !self.has_data {
            self.event_name.clear();
            return None;
        }

        let mut data = std::mem::take(&mut self.data_buffer);
        if data.ends_with('\n') {
            data.pop();
        }

        let name = if self.event_name.is_empty() {
            "message".to_string()
        } else {
            std::mem::take(&mut self.event_name)
        };

        self.event_name.clear();
        self.has_data = false;

        Some(Event::Message(Message {
            name,
            data,
            last_event_id: self.last_event_id.clone(),
            origin: self.origin.clone(),
        }))
    }
}
