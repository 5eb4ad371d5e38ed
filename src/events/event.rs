//! # Lifecycle events emitted by groups and subscriber workers.
//!
//! [`EventKind`] groups what can happen to a group:
//! - **Membership events**: members joining and leaving a group
//! - **Delivery events**: deliveries dropped for one member, synchronous sends abandoned
//! - **Subscriber events**: overflow/panic inside [`SubscriberSet`](crate::SubscriberSet) workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, member identity,
//! recipient counts and reasons.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter. Subscribers run on separate workers, so
//! sort by `seq` when events from several of them are merged.
//!
//! ## Example
//! ```rust
//! use broadcaster::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DeliveryDropped)
//!     .with_reason("full")
//!     .with_recipients(3);
//!
//! assert_eq!(ev.kind, EventKind::DeliveryDropped);
//! assert_eq!(ev.reason.as_deref(), Some("full"));
//! assert_eq!(ev.recipients, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::message::MemberId;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Membership events ===
    /// A member was registered by the owner loop.
    ///
    /// Sets:
    /// - `member`: member identity
    /// - `recipients`: member count after the join
    MemberJoined,

    /// A member was removed (explicit leave, `once`, consumer dropped, or group close).
    ///
    /// Sets:
    /// - `member`: member identity
    /// - `recipients`: member count after the removal
    MemberLeft,

    // === Delivery events ===
    /// One member did not get a broadcast value (queue full past the delivery timeout).
    ///
    /// Sets:
    /// - `member`: member identity
    /// - `timeout_ms`: configured delivery timeout (ms)
    /// - `reason`: `"full"`
    DeliveryDropped,

    /// A synchronous send stopped waiting (cancelled or timed out).
    ///
    /// Sets:
    /// - `member`: sending member, if the send went through one
    /// - `recipients`: recipients still outstanding when the wait ended
    /// - `reason`: `"group_send_canceled"` or `"group_send_timeout"`
    SendAbandoned,

    /// The group shut down; every remaining member was force-removed.
    ///
    /// Sets:
    /// - `recipients`: members removed during shutdown
    GroupClosed,

    // --- subscriber workers ---
    /// A subscriber's handler panicked; the worker keeps running.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic payload, when it is a string
    SubscriberPanicked,

    /// A subscriber missed an event because its queue was full or its worker was gone.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: `"subscriber=<name> reason=full"` or `... reason=closed`
    SubscriberOverflow,
}

/// Lifecycle event with optional metadata.
///
/// Only `seq`, `at` and `kind` are always present; see each [`EventKind`] variant for
/// the optional fields it fills in.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide emission order.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Member the event refers to, if applicable.
    pub member: Option<MemberId>,
    /// Member or recipient count, depending on the kind.
    pub recipients: Option<u32>,
    /// Delivery timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (overflow details, panic message, ...).
    pub reason: Option<Arc<str>>,
    /// Subscriber name for subscriber events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Stamps a new event of `kind` with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            member: None,
            recipients: None,
            timeout_ms: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches a member identity.
    #[inline]
    pub fn with_member(mut self, member: MemberId) -> Self {
        self.member = Some(member);
        self
    }

    /// Attaches a member/recipient count (saturated to `u32::MAX`).
    #[inline]
    pub fn with_recipients(mut self, n: usize) -> Self {
        self.recipients = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a timeout in whole milliseconds (saturated to `u32::MAX`).
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a short reason label.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Notice for a subscriber that missed an event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Notice for a subscriber whose handler panicked.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::MemberJoined);
        let b = Event::new(EventKind::MemberLeft);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_is_clamped_to_u32() {
        let ev = Event::new(EventKind::DeliveryDropped).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn subscriber_helpers_fill_name() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.subscriber, Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));

        let ev = Event::subscriber_panicked("audit", "boom".into());
        assert!(ev.is_subscriber_panic());
    }
}
