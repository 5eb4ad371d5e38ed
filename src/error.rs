//! Error types used by broadcast groups and their members.
//!
//! This module defines two error enums:
//!
//! - [`GroupError`]: errors returned by [`Group`](crate::Group) operations
//!   (and by the sending helpers on [`Member`](crate::Member)).
//! - [`MemberError`]: usage errors on the consumer side of a member
//!   (reading past end-of-stream, acknowledging twice).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Shutdown of a group or a member is never reported as an error to consumers:
//! it surfaces as end-of-stream from [`Member::recv`](crate::Member::recv).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by group operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupError {
    /// The group was closed; its owner loop no longer accepts commands.
    #[error("group closed")]
    Closed,

    /// An external cancellation token fired before every recipient settled.
    ///
    /// The broadcast may already be in flight.
    #[error("send cancelled before all acknowledgments arrived")]
    Canceled,

    /// The deadline elapsed before every recipient settled.
    ///
    /// The broadcast may already be in flight.
    #[error("send timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

impl GroupError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use broadcaster::GroupError;
    /// use std::time::Duration;
    ///
    /// let err = GroupError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "group_send_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GroupError::Closed => "group_closed",
            GroupError::Canceled => "group_send_canceled",
            GroupError::Timeout { .. } => "group_send_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            GroupError::Closed => "group closed".to_string(),
            GroupError::Canceled => "send cancelled".to_string(),
            GroupError::Timeout { timeout } => format!("send timeout: {timeout:?}"),
        }
    }
}

/// # Usage errors on the consumer side of a member.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberError {
    /// End-of-stream was already reported; the member cannot yield more messages.
    #[error("member drained: end-of-stream already observed")]
    Drained,

    /// The member's stream ended (reported once by `try_recv`).
    #[error("member closed")]
    Closed,

    /// The message was already acknowledged by this recipient.
    #[error("message already acknowledged")]
    AlreadyAcked,
}

impl MemberError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use broadcaster::MemberError;
    ///
    /// assert_eq!(MemberError::AlreadyAcked.as_label(), "member_already_acked");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MemberError::Drained => "member_drained",
            MemberError::Closed => "member_closed",
            MemberError::AlreadyAcked => "member_already_acked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            MemberError::Drained => "recv after end-of-stream".to_string(),
            MemberError::Closed => "member closed".to_string(),
            MemberError::AlreadyAcked => "double acknowledgment".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(GroupError::Closed.as_label(), "group_closed");
        assert_eq!(GroupError::Canceled.as_label(), "group_send_canceled");
        assert_eq!(MemberError::Drained.as_label(), "member_drained");
        assert_eq!(MemberError::Closed.as_label(), "member_closed");
    }

    #[test]
    fn timeout_message_carries_duration() {
        let err = GroupError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.as_message(), "send timeout: 250ms");
        assert_eq!(err.to_string(), "send timed out after 250ms");
    }
}
