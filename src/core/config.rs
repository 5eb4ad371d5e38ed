//! # Group configuration.
//!
//! Provides [`GroupConfig`] centralized settings for a broadcast group.
//!
//! ## Sentinel values
//! - `delivery_timeout = None` → wait for room in a full member queue (lossless, default)
//! - `delivery_timeout = Some(0s)` → a full member queue drops the delivery immediately
//! - `ack_pool_capacity = 0` → acknowledgment handles are never pooled

use std::time::Duration;

/// Configuration for a broadcast group.
///
/// ## Field semantics
/// - `command_capacity`: owner-loop command queue size (min 1)
/// - `member_capacity`: per-member inbound queue size (min 1)
/// - `outbound_capacity`: member → consumer queue size (min 1; 1 is close to a rendezvous)
/// - `delivery_timeout`: how long the owner loop waits on one full member queue (`None` = no limit)
/// - `bus_capacity`: lifecycle event bus ring buffer size (min 1)
/// - `ack_pool_capacity`: idle acknowledgment handles retained for reuse
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct GroupConfig {
    /// Capacity of the owner-loop command queue.
    ///
    /// Join, leave and publish calls wait for room when it is full.
    pub command_capacity: usize,

    /// Capacity of each member's inbound queue (owner loop → member actor).
    pub member_capacity: usize,

    /// Capacity of each member's outbound queue (member actor → consumer).
    pub outbound_capacity: usize,

    /// Maximum time the owner loop waits for room in one member's inbound queue.
    ///
    /// - `None` = wait until the member makes room, leaves, or the group closes;
    ///   nothing is ever dropped, but a stalled member stalls the fan-out
    /// - `Some(Duration::ZERO)` = never wait; a full queue drops that member's copy
    /// - `Some(d)` = wait up to `d`, then drop that member's copy
    ///
    /// A dropped copy of a synchronous send is credited to the sender as released.
    pub delivery_timeout: Option<Duration>,

    /// Capacity of the lifecycle event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum number of idle acknowledgment handles kept for reuse (`0` = no pooling).
    pub ack_pool_capacity: usize,
}

impl GroupConfig {
    /// Returns the command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }

    /// Returns the member inbound queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn member_capacity_clamped(&self) -> usize {
        self.member_capacity.max(1)
    }

    /// Returns the member outbound queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn outbound_capacity_clamped(&self) -> usize {
        self.outbound_capacity.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns `true` if deliveries to a full member queue may be dropped.
    #[inline]
    pub fn is_lossy(&self) -> bool {
        self.delivery_timeout.is_some()
    }
}

impl Default for GroupConfig {
    /// Default configuration:
    ///
    /// - `command_capacity = 1024`
    /// - `member_capacity = 64`
    /// - `outbound_capacity = 1`
    /// - `delivery_timeout = None` (lossless)
    /// - `bus_capacity = 1024`
    /// - `ack_pool_capacity = 64`
    fn default() -> Self {
        Self {
            command_capacity: 1024,
            member_capacity: 64,
            outbound_capacity: 1,
            delivery_timeout: None,
            bus_capacity: 1024,
            ack_pool_capacity: 64,
        }
    }
}
