//! The policy that decides, per fault, whether to surface it to the caller
//! or keep reconnecting transparently.
//!
//! Same shape as [`crate::connect::ConnectStrategy`]: a single method,
//! object-safe, used as `Arc<dyn ErrorStrategy>`.

use crate::error::SseError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

/// What a [`StreamClient`](crate::client::StreamClient) should do about a
/// given fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fail the current read with this error.
    Throw,
    /// Wrap the error in a `Fault` event and keep reconnecting.
    Continue,
}

/// Decides, per fault, whether to surface it to the caller or continue
/// reconnecting.
#[async_trait]
pub trait ErrorStrategy: Send + Sync {
    /// Judge a single fault. `ClosedByCaller` never reaches this method; the
    /// stream client handles it directly.
    async fn apply(&self, error: &SseError) -> Disposition;
}

/// Every fault surfaces to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysThrow;

#[async_trait]
impl ErrorStrategy for AlwaysThrow {
    async fn apply(&self, _error: &SseError) -> Disposition {
        Disposition::Throw
    }
}

/// Every fault becomes a `Fault` event; the client reconnects.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysContinue;

#[async_trait]
impl ErrorStrategy for AlwaysContinue {
    async fn apply(&self, _error: &SseError) -> Disposition {
        Disposition::Continue
    }
}

/// Continues for the first `threshold` faults observed, then throws on every
/// fault after that. The counter is per-instance, mirroring
/// [`crate::backoff::BackoffPolicy`]'s per-client counter discipline.
pub struct ContinueThenThrow {
    threshold: u32,
    seen: AtomicU32,
}

impl ContinueThenThrow {
    /// Build a strategy that continues for the first `threshold` faults.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            seen: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ErrorStrategy for ContinueThenThrow {
    async fn apply(&self, _error: &SseError) -> Disposition {
        let count = self.seen.fetch_add(1, Ordering::Relaxed);
        if count < self.threshold {
            Disposition::Continue
        } else {
            Disposition::Throw
        }
    }
}
