//! # Event subscribers for broadcast groups.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out used
//! to observe group lifecycle events published on the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   owner loop ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                       │
//!                                                        ┌──────────────┼──────────┐
//!                                                        ▼              ▼          ▼
//!                                                    LogWriter       Metrics     Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
