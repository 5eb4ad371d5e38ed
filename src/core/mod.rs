//! Group core: owner loop, membership and per-member actors.
//!
//! The public API from this module is [`Group`], [`GroupBuilder`], [`GroupConfig`]
//! and [`Member`].
//!
//! Internal modules:
//! - [`group`]: group handle, command queue and the owner loop;
//! - [`registry`]: insertion-ordered membership table and fan-out;
//! - [`member`]: consumer-side member handle;
//! - [`actor`]: per-member dispatch loop (echo, filter, once);
//! - [`config`]: group settings.

mod actor;
mod config;
mod group;
mod member;
mod registry;

pub use config::GroupConfig;
pub use group::{Group, GroupBuilder};
pub use member::Member;
