//! # Bus: broadcast channel for lifecycle events.
//!
//! The owner loop, synchronous senders and subscriber workers publish here; the
//! subscriber listener and every [`Group::events`](crate::Group::events) receiver read.
//!
//! ```text
//! owner loop ─────┐
//! send waiters ───┼──► Bus (tokio broadcast ring) ──► listener ──► SubscriberSet
//! subscriber set ─┘                                └─► Group::events() receivers
//! ```
//!
//! Publishing never waits. A receiver that falls behind by more than the ring capacity
//! gets `Lagged(n)` and resumes with the oldest retained event. Nothing is stored for
//! receivers that subscribe later.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publishing handle for lifecycle events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring keeps the last `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev`; dropped silently when nobody is subscribed.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
