//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the group owner loop (joins, leaves, dropped deliveries, close)
//!   and synchronous senders (abandoned waits), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by
//!   [`GroupBuilder::build`](crate::GroupBuilder::build), and any receiver obtained from
//!   [`Group::events`](crate::Group::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
