//! # Acknowledgment handles for synchronous sends.
//!
//! A synchronous [`Group::send`](crate::Group::send) shares one [`AckState`] between the
//! waiting sender and every recipient's copy of the envelope.
//!
//! ## Architecture
//! ```text
//! send(v) ──► AckPool::acquire() ──► AckState { pending = 1 (dispatch guard) }
//!                                         │
//! owner loop: for each member ──► AckToken::issue()   pending += 1
//!             after fan-out   ──► DispatchGuard::finish()   pending -= 1
//!                                         │
//! consumer:   msg.ack()       ──► acked += 1,    pending -= 1
//!             drop(msg)       ──► released += 1, pending -= 1
//!                                         │
//!                       pending == 0 ──► Notify ──► send(v) returns Receipt
//! ```
//!
//! ## Rules
//! - Every token settles **exactly once** (ack or drop), so a double-ack can never hang.
//! - The dispatch guard keeps `pending >= 1` until fan-out completes; the sender can
//!   never observe a premature zero.
//! - A guard dropped without `finish` means the command never reached the owner loop
//!   (group closed); the sender reports [`GroupError::Closed`](crate::GroupError::Closed).
//! - States return to the pool only when nobody else holds a reference.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Outcome of a completed synchronous send.
///
/// `recipients == acked + released` always holds for a returned receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Members the value was dispatched to (the sender's own echo excluded).
    pub recipients: usize,
    /// Copies explicitly acknowledged (by a consumer or a rejecting filter).
    pub acked: usize,
    /// Copies dropped without acknowledgment (member left, queue full, echo, ...).
    pub released: usize,
}

impl Receipt {
    /// Returns `true` if every recipient acknowledged the value.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.acked == self.recipients
    }
}

/// Shared completion state of one synchronous send.
#[derive(Debug)]
pub(crate) struct AckState {
    pending: AtomicUsize,
    acked: AtomicUsize,
    released: AtomicUsize,
    recipients: AtomicUsize,
    dispatched: AtomicBool,
    notify: Notify,
}

impl AckState {
    pub(crate) fn new() -> Self {
        Self {
            pending: AtomicUsize::new(1),
            acked: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            recipients: AtomicUsize::new(0),
            dispatched: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Rearms the state for a new send (one pending unit for the dispatch guard).
    fn reset(&self) {
        self.acked.store(0, Ordering::Relaxed);
        self.released.store(0, Ordering::Relaxed);
        self.recipients.store(0, Ordering::Relaxed);
        self.dispatched.store(false, Ordering::Relaxed);
        self.pending.store(1, Ordering::Release);
    }

    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_one();
        }
    }

    #[inline]
    fn is_settled(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    /// Waits until every issued token and the dispatch guard have settled.
    ///
    /// Cancel-safe: dropping the future leaves the state untouched.
    pub(crate) async fn settled(&self) {
        loop {
            if self.is_settled() {
                return;
            }
            // A stale permit from a previous use only costs one extra iteration.
            self.notify.notified().await;
        }
    }

    /// Units not settled yet (outstanding recipients, plus the guard before dispatch).
    pub(crate) fn outstanding(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Returns `false` if the send never reached the owner loop.
    pub(crate) fn was_dispatched(&self) -> bool {
        self.dispatched.load(Ordering::Acquire)
    }

    pub(crate) fn receipt(&self) -> Receipt {
        Receipt {
            recipients: self.recipients.load(Ordering::Acquire),
            acked: self.acked.load(Ordering::Acquire),
            released: self.released.load(Ordering::Acquire),
        }
    }
}

/// One recipient's obligation to settle a synchronous send.
#[derive(Debug)]
pub(crate) struct AckToken {
    state: Option<Arc<AckState>>,
}

impl AckToken {
    /// Registers one more recipient on `state`.
    pub(crate) fn issue(state: &Arc<AckState>) -> Self {
        state.pending.fetch_add(1, Ordering::AcqRel);
        state.recipients.fetch_add(1, Ordering::AcqRel);
        Self {
            state: Some(Arc::clone(state)),
        }
    }

    /// Settles the token as acknowledged.
    pub(crate) fn ack(mut self) {
        if let Some(state) = self.state.take() {
            state.acked.fetch_add(1, Ordering::AcqRel);
            state.settle();
        }
    }
}

impl Drop for AckToken {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.released.fetch_add(1, Ordering::AcqRel);
            state.settle();
        }
    }
}

/// Holds the sender's pending unit until the owner loop finished fanning out.
#[derive(Debug)]
pub(crate) struct DispatchGuard {
    state: Option<Arc<AckState>>,
}

impl DispatchGuard {
    pub(crate) fn new(state: &Arc<AckState>) -> Self {
        Self {
            state: Some(Arc::clone(state)),
        }
    }

    /// Shared state used to issue per-recipient tokens during fan-out.
    pub(crate) fn state(&self) -> Option<&Arc<AckState>> {
        self.state.as_ref()
    }

    /// Marks the send as dispatched and releases the guard unit.
    pub(crate) fn finish(mut self) {
        if let Some(state) = self.state.take() {
            state.dispatched.store(true, Ordering::Release);
            state.settle();
        }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.settle();
        }
    }
}

/// Free list of reusable [`AckState`]s (fungible, keyed by availability only).
#[derive(Debug)]
pub(crate) struct AckPool {
    free: Mutex<Vec<Arc<AckState>>>,
    capacity: usize,
}

impl AckPool {
    /// Creates a pool retaining at most `capacity` idle states (`0` disables pooling).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Takes an idle state or allocates a new one; either way it is armed and ready.
    pub(crate) fn acquire(&self) -> Arc<AckState> {
        let reused = self.free.lock().ok().and_then(|mut free| free.pop());
        match reused {
            Some(state) => {
                state.reset();
                state
            }
            None => Arc::new(AckState::new()),
        }
    }

    /// Returns a settled state to the pool.
    ///
    /// Dropped instead if another reference is still alive (e.g. an un-acked
    /// envelope from a cancelled send) or the pool is full.
    pub(crate) fn release(&self, state: Arc<AckState>) {
        if self.capacity == 0 || Arc::strong_count(&state) != 1 || !state.is_settled() {
            return;
        }
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.capacity {
                free.push(state);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_alone_settles_with_empty_receipt() {
        let pool = AckPool::new(4);
        let state = pool.acquire();
        DispatchGuard::new(&state).finish();

        state.settled().await;
        assert!(state.was_dispatched());
        assert_eq!(state.receipt(), Receipt::default());
    }

    #[tokio::test]
    async fn waits_for_every_token() {
        let state = Arc::new(AckState::new());
        let guard = DispatchGuard::new(&state);
        let a = AckToken::issue(&state);
        let b = AckToken::issue(&state);
        guard.finish();

        a.ack();
        let pending = tokio::time::timeout(Duration::from_millis(20), state.settled()).await;
        assert!(pending.is_err(), "one token is still outstanding");

        drop(b);
        state.settled().await;
        assert_eq!(
            state.receipt(),
            Receipt {
                recipients: 2,
                acked: 1,
                released: 1
            }
        );
    }

    #[tokio::test]
    async fn dropped_guard_is_not_dispatched() {
        let state = Arc::new(AckState::new());
        drop(DispatchGuard::new(&state));
        state.settled().await;
        assert!(!state.was_dispatched());
    }

    #[test]
    fn pool_reuses_only_unshared_states() {
        let pool = AckPool::new(2);

        let state = pool.acquire();
        DispatchGuard::new(&state).finish();
        pool.release(state);
        assert_eq!(pool.idle(), 1);

        let state = pool.acquire();
        assert_eq!(pool.idle(), 0);
        let guard = DispatchGuard::new(&state);
        let token = AckToken::issue(&state);
        guard.finish();
        pool.release(Arc::clone(&state));
        assert_eq!(pool.idle(), 0, "token still references the state");

        token.ack();
        pool.release(state);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn reset_rearms_counters() {
        let pool = AckPool::new(1);
        let state = pool.acquire();
        let guard = DispatchGuard::new(&state);
        AckToken::issue(&state).ack();
        guard.finish();
        pool.release(state);

        let state = pool.acquire();
        assert!(!state.is_settled());
        assert!(!state.was_dispatched());
        assert_eq!(state.receipt(), Receipt::default());
    }

    #[test]
    fn disabled_pool_keeps_nothing() {
        let pool = AckPool::new(0);
        let state = pool.acquire();
        DispatchGuard::new(&state).finish();
        pool.release(state);
        assert_eq!(pool.idle(), 0);
    }
}
