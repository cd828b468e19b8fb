/// Outbound snapshot throttling
use std::time::Duration;

use tokio::time::Instant;

use crate::sync::Snapshot;

/// Timer-driven coalescing state machine
///
/// The first offer while idle arms the window and parks the draft in the
/// pending slot. Offers inside the window replace the pending draft (older
/// ones are absorbed into it). When the window expires the pending draft is
/// released for transmission and the throttle goes idle again.
#[derive(Debug)]
pub struct OutboundThrottle<S> {
    window: Duration,
    pending: Option<S>,
    deadline: Option<Instant>,
}

impl<S: Snapshot> OutboundThrottle<S> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    /// Queue a draft for the current window, arming it if idle
    pub fn offer(&mut self, now: Instant, draft: S) {
        self.pending = Some(match self.pending.take() {
            Some(older) => draft.absorb(older),
            None => draft,
        });
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// Window expiry instant, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the pending draft if the window has expired
    pub fn poll(&mut self, now: Instant) -> Option<S> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Bypass the window: absorb anything pending into `draft` and return it
    ///
    /// Used for the final game-over snapshot, which must never wait or be
    /// replaced.
    pub fn flush(&mut self, draft: S) -> S {
        self.deadline = None;
        match self.pending.take() {
            Some(older) => draft.absorb(older),
            None => draft,
        }
    }
}
