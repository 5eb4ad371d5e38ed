//! # Subscribe: pluggable consumers of group lifecycle events.
//!
//! Implement [`Subscribe`] to count churn, export metrics or write an audit trail. Hand
//! the implementations to [`GroupBuilder::with_subscribers`](crate::GroupBuilder::with_subscribers);
//! each one gets its own bounded queue and worker inside a
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! A handler may await I/O freely. It only ever delays its own queue; once that queue
//! is full the subscriber misses events (reported as `SubscriberOverflow`).
//!
//! ## Example
//! ```rust
//! use broadcaster::{Event, EventKind, Subscribe};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct Churn(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Churn {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::MemberJoined | EventKind::MemberLeft) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "churn" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Receiver of group lifecycle events.
///
/// Runs on the subscriber's own worker task; blocking calls there still stall a runtime
/// thread, so keep handlers async.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic notices.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
