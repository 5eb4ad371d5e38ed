//! # LogWriter: lifecycle events to `tracing`
//!
//! A minimal subscriber that forwards incoming [`Event`]s to the `tracing` facade under
//! the `broadcaster::events` target. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO broadcaster::events: member joined member=member-3 members=3
//! WARN broadcaster::events: delivery dropped member=member-2 timeout_ms=1000 reason=full
//! INFO broadcaster::events: member left member=member-3 members=2
//! INFO broadcaster::events: group closed removed=2
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;
use tracing::{info, warn};

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let member = e.member.map(|m| m.to_string()).unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::MemberJoined => {
                info!(target: "broadcaster::events", %member, members = ?e.recipients, "member joined");
            }
            EventKind::MemberLeft => {
                info!(target: "broadcaster::events", %member, members = ?e.recipients, "member left");
            }
            EventKind::DeliveryDropped => {
                warn!(target: "broadcaster::events", %member, timeout_ms = ?e.timeout_ms, reason, "delivery dropped");
            }
            EventKind::SendAbandoned => {
                warn!(target: "broadcaster::events", outstanding = ?e.recipients, reason, "send abandoned");
            }
            EventKind::GroupClosed => {
                info!(target: "broadcaster::events", removed = ?e.recipients, "group closed");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "broadcaster::events", subscriber = ?e.subscriber, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(
                    target: "broadcaster::events",
                    subscriber = e.subscriber.unwrap_or("unknown"),
                    reason,
                    "subscriber panicked"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
