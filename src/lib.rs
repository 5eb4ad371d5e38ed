//! # broadcaster
//!
//! **broadcaster** is an in-process broadcast group for tokio.
//!
//! A [`Group`] fans every value out to a dynamic set of [`Member`]s. Values can be sent
//! fire-and-forget ([`Group::send_async`]) or synchronously ([`Group::send`]), in which
//! case the sender waits until every recipient acknowledged (or released) its copy.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producers                    Group (owner loop)                      consumers
//! ┌────────────┐            ┌───────────────────────────┐
//! │ send_async ├──┐         │ Registry (insertion order)│   ┌─────────────┐   ┌────────┐
//! └────────────┘  │ command │  ├─ member 1 ─────────────┼──►│ MemberActor ├──►│ recv() │
//! ┌────────────┐  ├─ queue ►│  ├─ member 2 ─────────────┼──►│ MemberActor ├──►│ recv() │
//! │ send       ├──┘         │  └─ member N ─────────────┼──►│ MemberActor ├──►│ recv() │
//! └─────┬──────┘            └─────────────┬─────────────┘   └─────────────┘   └───┬────┘
//!       │                                 │ lifecycle events                       │
//!       │                                 ▼                                        │
//!       │                           Bus ──► SubscriberSet                          │
//!       └────────────── waits on the shared ack handle ◄──────── msg.ack() ────────┘
//! ```
//!
//! ### Delivery
//! ```text
//! owner loop, per envelope, per member (insertion order):
//!   try_send ──► full ──► wait for room ──► (only with delivery_timeout set) timeout ──► DeliveryDropped
//!
//! member actor, per envelope:
//!   ├─ sender == self   ─► discard (no echo)
//!   ├─ filter rejects   ─► ack + discard
//!   ├─ forward          ─► outbound queue ─► consumer acks when done
//!   └─ once && forwarded ─► leave the group, end-of-stream
//! ```
//!
//! ## Guarantees
//! - Every member observes values in the order their commands were enqueued.
//! - A synchronous send counts exactly the members present when it is dispatched; copies
//!   lost to a leave, a full queue or a dropped consumer are credited as released.
//! - Reading past end-of-stream and acknowledging twice are reported errors
//!   ([`MemberError`]); sending on a closed group returns [`GroupError::Closed`].
//! - No ordering across concurrent senders, no persistence, no replay to late joiners.
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                  |
//! |-------------------|----------------------------------------------------------|-------------------------------------|
//! | **Broadcast**     | Fan-out hub with sync/async sends and cancellation.      | [`Group`], [`Receipt`]              |
//! | **Membership**    | Join/leave, filters, one-shot members.                   | [`Member`], [`MemberId`]            |
//! | **Envelopes**     | Payload, sender identity, acknowledgment.                | [`Message`]                         |
//! | **Observability** | Lifecycle events and pluggable subscribers.              | [`Event`], [`Subscribe`]            |
//! | **Errors**        | Typed errors for group and consumer misuse.              | [`GroupError`], [`MemberError`]     |
//! | **Configuration** | Queue sizes, delivery timeout, pooling.                  | [`GroupConfig`]                     |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use broadcaster::{Group, GroupError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let group = Group::<u64>::new();
//!     let mut worker = group.join().await?;
//!
//!     let consumer = tokio::spawn(async move {
//!         while let Ok(Some(mut msg)) = worker.recv().await {
//!             println!("got {}", msg.data());
//!             msg.ack()?;
//!         }
//!         Ok::<_, broadcaster::MemberError>(())
//!     });
//!
//!     let receipt = group.send_timeout(1, Duration::from_secs(1)).await?;
//!     assert_eq!(receipt.acked, 1);
//!
//!     group.close();
//!     consumer.await??;
//!     assert_eq!(group.send_async(2).await, Err(GroupError::Closed));
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod message;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Group, GroupBuilder, GroupConfig, Member};
pub use error::{GroupError, MemberError};
pub use events::{Bus, Event, EventKind};
pub use message::{MemberId, Message, Receipt};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a built-in subscriber that logs events through `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
