//! Envelopes delivered to members.
//!
//! ## Contents
//! - [`Message`] one recipient's copy of a broadcast value
//! - [`MemberId`] stable identity of a member (echo suppression, leave by identity)
//! - [`Receipt`] outcome of a synchronous send
//!
//! Acknowledgment plumbing (`AckState`, `AckToken`, `AckPool`) lives in [`ack`] and is
//! internal to the crate.

pub(crate) mod ack;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MemberError;
use ack::AckToken;

pub use ack::Receipt;

/// Global counter for member identities.
static MEMBER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of a member, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(u64);

impl MemberId {
    pub(crate) fn next() -> Self {
        Self(MEMBER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric identity.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

#[derive(Debug)]
enum Ack {
    /// Fire-and-forget envelope.
    None,
    Pending(AckToken),
    Done,
}

/// One recipient's copy of a broadcast value.
///
/// Envelopes produced by [`Group::send`](crate::Group::send) carry an acknowledgment
/// obligation: call [`Message::ack`] once processing is finished. Dropping an
/// envelope without acknowledging it releases the obligation, so the sender is never
/// left waiting on a message nobody holds anymore.
///
/// ## Example
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use broadcaster::Group;
///
/// let group = Group::<u32>::new();
/// let mut member = group.join().await?;
///
/// group.send_async(7).await?;
/// let mut msg = member.recv().await?.expect("group is open");
/// assert_eq!(*msg.data(), 7);
/// assert!(!msg.requires_ack());
/// msg.ack()?; // no-op for fire-and-forget envelopes
/// # group.close();
/// # Ok(())
/// # }
/// ```
pub struct Message<V> {
    sender: Option<MemberId>,
    data: V,
    ack: Ack,
}

impl<V> Message<V> {
    pub(crate) fn new(data: V, sender: Option<MemberId>, token: Option<AckToken>) -> Self {
        let ack = match token {
            Some(token) => Ack::Pending(token),
            None => Ack::None,
        };
        Self { sender, data, ack }
    }

    /// Returns the payload.
    #[inline]
    pub fn data(&self) -> &V {
        &self.data
    }

    /// Consumes the envelope and returns the payload.
    ///
    /// A pending acknowledgment is released, not acknowledged.
    #[inline]
    pub fn into_data(self) -> V {
        self.data
    }

    /// Returns the member that broadcast this value, if it was sent through a member.
    #[inline]
    pub fn sender(&self) -> Option<MemberId> {
        self.sender
    }

    /// Returns `true` if the sender is still waiting for this copy to be acknowledged.
    #[inline]
    pub fn requires_ack(&self) -> bool {
        matches!(self.ack, Ack::Pending(_))
    }

    /// Acknowledges the envelope.
    ///
    /// - fire-and-forget envelope: no-op
    /// - pending: credits the waiting sender exactly once
    ///
    /// # Errors
    /// [`MemberError::AlreadyAcked`] if this copy was already acknowledged.
    pub fn ack(&mut self) -> Result<(), MemberError> {
        match std::mem::replace(&mut self.ack, Ack::Done) {
            Ack::None => {
                self.ack = Ack::None;
                Ok(())
            }
            Ack::Pending(token) => {
                token.ack();
                Ok(())
            }
            Ack::Done => Err(MemberError::AlreadyAcked),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Message<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("sender", &self.sender)
            .field("data", &self.data)
            .field("requires_ack", &self.requires_ack())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ack::{AckState, DispatchGuard};
    use super::*;
    use std::sync::Arc;

    #[test]
    fn member_ids_are_unique() {
        let a = MemberId::next();
        let b = MemberId::next();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), format!("member-{}", a.as_u64()));
    }

    #[test]
    fn async_ack_is_a_repeatable_noop() {
        let mut msg = Message::new("hello", None, None);
        assert!(!msg.requires_ack());
        assert_eq!(msg.ack(), Ok(()));
        assert_eq!(msg.ack(), Ok(()));
    }

    #[tokio::test]
    async fn double_ack_is_reported() {
        let state = Arc::new(AckState::new());
        let guard = DispatchGuard::new(&state);
        let mut msg = Message::new(1u8, None, Some(AckToken::issue(&state)));
        guard.finish();

        assert!(msg.requires_ack());
        assert_eq!(msg.ack(), Ok(()));
        assert_eq!(msg.ack(), Err(MemberError::AlreadyAcked));

        state.settled().await;
        assert_eq!(state.receipt().acked, 1);
        assert_eq!(state.receipt().released, 0);
    }

    #[tokio::test]
    async fn into_data_releases_pending_ack() {
        let state = Arc::new(AckState::new());
        let guard = DispatchGuard::new(&state);
        let msg = Message::new(String::from("x"), None, Some(AckToken::issue(&state)));
        guard.finish();

        assert_eq!(msg.into_data(), "x");
        state.settled().await;
        assert_eq!(state.receipt().released, 1);
    }
}
