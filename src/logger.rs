//! The logging capability the stream client reports through.
//!
//! Mirrors the shape of this codebase's `events::EventHandler`: a single
//! synchronous method, object-safe, with a default no-op so logging is
//! entirely optional. Unlike `EventHandler`, which carries a closed set of
//! domain events, [`Logger`] takes a level and a pre-formatted message,
//! matching how the `log` facade itself is shaped.

use std::fmt;

/// Severity of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Routine state transitions (connecting, backoff sleep, reconnect).
    Debug,
    /// A fault occurred but the client is continuing (policy-dependent).
    Warn,
    /// An unexpected internal condition.
    Error,
}

/// Receives log messages emitted by the stream client.
///
/// The core never writes to stdout/stderr directly and never depends on a
/// specific subscriber; it reports through this capability instead, the same
/// way it consumes [`crate::connect::ConnectStrategy`] instead of hard-coding
/// `reqwest`.
pub trait Logger: Send + Sync {
    /// Record one message at the given level.
    fn log(&self, level: Level, message: fmt::Arguments<'_>);
}

/// The default [`Logger`], forwarding to the `log` crate's global facade so a
/// host application wires up its own subscriber exactly as it would for any
/// other `log`-based dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeLogger;

impl Logger for FacadeLogger {
    fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        match level {
            Level::Debug => log::debug!("{}", message),
            Level::Warn => log::warn!("{}", message),
            Level::Error => log::error!("{}", message),
        }
    }
}

/// A [`Logger`] that discards everything, for embedders that want silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _message: fmt::Arguments<'_>) {}
}

/// Log through a `dyn Logger` using `format_args!`, the way `log::debug!`
/// etc. are invoked.
macro_rules! log_at {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format_args!($($arg)+))
    };
}

pub(crate) use log_at;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingLogger {
        messages: Mutex<Vec<(Level, String)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: Level, message: fmt::Arguments<'_>) {
            self.messages
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    #[test]
    fn noop_logger_discards_everything() {
        let logger = NoopLogger;
        log_at!(logger, Level::Error, "should vanish: {}", 1);
    }

    #[test]
    fn log_at_macro_formats_and_records() {
        let logger = Arc::new(RecordingLogger {
            messages: Mutex::new(Vec::new()),
        });
        log_at!(logger, Level::Warn, "fault on attempt {}", 3);
        let recorded = logger.messages.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, Level::Warn);
        assert_eq!(recorded[0].1, "fault on attempt 3");
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Debug < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }
}
