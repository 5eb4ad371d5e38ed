//! # Member registry - owner-loop membership table and fan-out.
//!
//! The registry is owned exclusively by the group's owner loop, so it needs no lock.
//!
//! ## Architecture
//! ```text
//! owner loop ──► Registry
//!                  ├─► insert(slot)     → MemberJoined
//!                  ├─► remove(id)       → cancel member token → MemberLeft
//!                  ├─► drain()          → cancel every token (group shutdown)
//!                  └─► fan_out(env)     → for slot in insertion order:
//!                                            try_send ─ full ─► wait for room (bounded by
//!                                            delivery_timeout, if set; aborted on removal)
//!                                            ─ timeout ─► DeliveryDropped
//! ```
//!
//! ## Rules
//! - Slots keep **insertion order**; fan-out visits them in that order
//! - Identity is the [`MemberId`]; a second insert with the same id is rejected
//! - One envelope is fully fanned out before the next command is processed
//! - The shared member count mirrors `slots.len()` after every mutation

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TrySendError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::group::{Envelope, Shared};
use crate::events::{Event, EventKind};
use crate::message::{Message, MemberId, ack::AckToken};

/// Owner-side handle of one member.
pub(crate) struct Slot<V> {
    pub(crate) id: MemberId,
    /// Inbound queue of the member actor.
    pub(crate) inbound: mpsc::Sender<Message<V>>,
    /// Cancelling it stops the member actor and ends the consumer's stream.
    pub(crate) token: CancellationToken,
}

/// Insertion-ordered set of live members.
pub(crate) struct Registry<V> {
    slots: Vec<Slot<V>>,
    shared: Arc<Shared>,
}

impl<V: Clone + Send + 'static> Registry<V> {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            slots: Vec::new(),
            shared,
        }
    }

    /// Returns member ids in delivery order.
    pub(crate) fn ids(&self) -> Vec<MemberId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    /// Adds a member; returns `false` if the id is already registered.
    pub(crate) fn insert(&mut self, slot: Slot<V>) -> bool {
        if self.slots.iter().any(|s| s.id == slot.id) {
            return false;
        }
        let id = slot.id;
        self.slots.push(slot);
        self.sync_count();

        debug!(member = %id, members = self.slots.len(), "member joined");
        self.shared.bus.publish(
            Event::new(EventKind::MemberJoined)
                .with_member(id)
                .with_recipients(self.slots.len()),
        );
        true
    }

    /// Removes a member by identity and stops its actor; returns `false` if absent.
    pub(crate) fn remove(&mut self, id: MemberId) -> bool {
        let Some(idx) = self.slots.iter().position(|s| s.id == id) else {
            return false;
        };
        let slot = self.slots.remove(idx);
        slot.token.cancel();
        self.sync_count();

        debug!(member = %id, members = self.slots.len(), "member left");
        self.shared.bus.publish(
            Event::new(EventKind::MemberLeft)
                .with_member(id)
                .with_recipients(self.slots.len()),
        );
        true
    }

    /// Removes every member (in insertion order); returns how many were removed.
    pub(crate) fn drain(&mut self) -> usize {
        let slots = std::mem::take(&mut self.slots);
        self.sync_count();

        for slot in &slots {
            slot.token.cancel();
            self.shared.bus.publish(
                Event::new(EventKind::MemberLeft)
                    .with_member(slot.id)
                    .with_recipients(0),
            );
        }
        slots.len()
    }

    /// Delivers one envelope to every member; returns the number of successful deliveries.
    ///
    /// Synchronous envelopes get one ack token per recipient. The sender's own copy
    /// carries no token: its actor discards it without acknowledging.
    pub(crate) async fn fan_out(&self, env: Envelope<V>) -> usize {
        let Envelope {
            data,
            sender,
            guard,
        } = env;
        let state = guard.as_ref().and_then(|g| g.state()).cloned();

        let mut delivered = 0;
        for slot in &self.slots {
            let token = match &state {
                Some(state) if sender != Some(slot.id) => Some(AckToken::issue(state)),
                _ => None,
            };
            if self.deliver(slot, Message::new(data.clone(), sender, token)).await {
                delivered += 1;
            }
        }

        if let Some(guard) = guard {
            guard.finish();
        }
        trace!(delivered, members = self.slots.len(), "envelope fanned out");
        delivered
    }

    async fn deliver(&self, slot: &Slot<V>, msg: Message<V>) -> bool {
        let msg = match slot.inbound.try_send(msg) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => {
                trace!(member = %slot.id, "member queue closed; delivery skipped");
                return false;
            }
            Err(TrySendError::Full(msg)) => msg,
        };

        let limit = self.shared.cfg.delivery_timeout;
        let outcome = tokio::select! {
            biased;
            _ = slot.token.cancelled() => None,
            res = wait_for_room(&slot.inbound, msg, limit) => Some(res),
        };
        match outcome {
            None => {
                trace!(member = %slot.id, "member removed while queue full; delivery abandoned");
                false
            }
            Some(Ok(())) => true,
            Some(Err(SendTimeoutError::Closed(_))) => false,
            Some(Err(SendTimeoutError::Timeout(_))) => {
                self.report_dropped(slot.id, limit.unwrap_or_default());
                false
            }
        }
    }

    fn report_dropped(&self, id: MemberId, timeout: Duration) {
        warn!(member = %id, "member queue full; delivery dropped");
        self.shared.bus.publish(
            Event::new(EventKind::DeliveryDropped)
                .with_member(id)
                .with_timeout(timeout)
                .with_reason("full"),
        );
    }

    fn sync_count(&self) {
        self.shared.members.store(self.slots.len(), Ordering::Release);
    }
}

/// Waits for room in a full queue; `None` waits as long as it takes, zero never waits.
async fn wait_for_room<T>(
    tx: &mpsc::Sender<T>,
    msg: T,
    limit: Option<Duration>,
) -> Result<(), SendTimeoutError<T>> {
    match limit {
        None => tx
            .send(msg)
            .await
            .map_err(|err| SendTimeoutError::Closed(err.0)),
        Some(limit) if limit.is_zero() => Err(SendTimeoutError::Timeout(msg)),
        Some(limit) => tx.send_timeout(msg, limit).await,
    }
}
