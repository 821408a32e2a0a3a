//! Lifetime tracking for relayed upstream bodies.
//!
//! A guard travels inside each response body stream. It is dropped when the
//! body finishes, fails, or is abandoned by a disconnecting caller, so the
//! active count returns to zero on every exit path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Relaxed ordering suffices: IDs only need to be unique.
static STREAM_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a relayed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl StreamId {
    pub fn new() -> Self {
        Self(STREAM_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Counts upstream bodies currently being relayed.
#[derive(Debug, Clone, Default)]
pub struct StreamTracker {
    active: Arc<AtomicU64>,
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new stream. The count drops when the guard does.
    pub fn track(&self) -> StreamGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = StreamGuard {
            active: Arc::clone(&self.active),
            id: StreamId::new(),
        };
        tracing::trace!(stream_id = %guard.id, "Upstream stream opened");
        guard
    }

    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Held by a response body for as long as it may still read upstream.
#[derive(Debug)]
pub struct StreamGuard {
    active: Arc<AtomicU64>,
    id: StreamId,
}

impl StreamGuard {
    pub fn id(&self) -> StreamId {
        self.id
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(stream_id = %self.id, "Upstream stream released");
    }
}
