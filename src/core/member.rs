//! # Member: one subscriber's handle into a group.
//!
//! A [`Member`] is owned by the consumer. It reads envelopes forwarded by its
//! [`MemberActor`](super::actor::MemberActor) and tunes the actor through a `watch`
//! channel (filter, once).
//!
//! ## Stream contract
//! ```text
//! recv() ──► Ok(Some(msg))   … as long as the member is in the group
//!        ──► Ok(None)        exactly once, at end-of-stream
//!        ──► Err(Drained)    on every call after that
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::group::{Deadline, WeakGroup};
use crate::error::{GroupError, MemberError};
use crate::message::{MemberId, Message, Receipt};

/// Predicate deciding whether an envelope is forwarded to the consumer.
pub(crate) type Filter<V> = Arc<dyn Fn(&Message<V>) -> bool + Send + Sync>;

/// Actor settings written by the consumer, read by the actor per envelope.
pub(crate) struct Settings<V> {
    pub(crate) filter: Option<Filter<V>>,
    pub(crate) once: bool,
}

impl<V> Default for Settings<V> {
    fn default() -> Self {
        Self {
            filter: None,
            once: false,
        }
    }
}

/// One subscriber's handle into a [`Group`](crate::Group).
///
/// Created by [`Group::join`](crate::Group::join). Dropping the handle removes the
/// member from its group.
///
/// ## Example
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use broadcaster::Group;
///
/// let group = Group::<u32>::new();
/// let mut evens = group.join().await?;
/// evens.with_filter(|msg| msg.data() % 2 == 0);
///
/// for v in 1..=4 {
///     group.send_async(v).await?;
/// }
/// assert_eq!(*evens.recv().await?.unwrap().data(), 2);
/// assert_eq!(*evens.recv().await?.unwrap().data(), 4);
/// # group.close();
/// # Ok(())
/// # }
/// ```
pub struct Member<V> {
    id: MemberId,
    outbound: mpsc::Receiver<Message<V>>,
    settings: watch::Sender<Settings<V>>,
    group: WeakGroup<V>,
    drained: bool,
}

impl<V> Member<V> {
    pub(crate) fn new(
        id: MemberId,
        outbound: mpsc::Receiver<Message<V>>,
        settings: watch::Sender<Settings<V>>,
        group: WeakGroup<V>,
    ) -> Self {
        Self {
            id,
            outbound,
            settings,
            group,
            drained: false,
        }
    }

    /// Returns this member's identity.
    #[inline]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Waits for the next forwarded envelope.
    ///
    /// Returns `Ok(None)` once, when the member left the group (explicitly, via
    /// [`Member::set_once`], or because the group closed) and every already forwarded
    /// envelope was read.
    ///
    /// # Errors
    /// [`MemberError::Drained`] if end-of-stream was already returned.
    pub async fn recv(&mut self) -> Result<Option<Message<V>>, MemberError> {
        if self.drained {
            return Err(MemberError::Drained);
        }
        match self.outbound.recv().await {
            Some(msg) => Ok(Some(msg)),
            None => {
                self.drained = true;
                Ok(None)
            }
        }
    }

    /// Returns the next forwarded envelope if one is ready.
    ///
    /// `Ok(None)` means nothing is ready yet.
    ///
    /// # Errors
    /// - [`MemberError::Closed`] the first time end-of-stream is observed
    /// - [`MemberError::Drained`] afterwards
    pub fn try_recv(&mut self) -> Result<Option<Message<V>>, MemberError> {
        if self.drained {
            return Err(MemberError::Drained);
        }
        match self.outbound.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.drained = true;
                Err(MemberError::Closed)
            }
        }
    }

    /// Sets or replaces the filter.
    ///
    /// Envelopes rejected by `filter` are acknowledged automatically and never reach
    /// [`Member::recv`]. Applies to envelopes the actor has not inspected yet.
    pub fn with_filter<F>(&self, filter: F)
    where
        F: Fn(&Message<V>) -> bool + Send + Sync + 'static,
    {
        self.settings
            .send_modify(|s| s.filter = Some(Arc::new(filter)));
    }

    /// Removes the filter; every envelope is forwarded again.
    pub fn clear_filter(&self) {
        self.settings.send_modify(|s| s.filter = None);
    }

    /// Leaves the group automatically after the first forwarded envelope.
    ///
    /// Envelopes rejected by the filter do not count.
    pub fn set_once(&self) {
        self.settings.send_modify(|s| s.once = true);
    }
}

impl<V: Clone + Send + Sync + 'static> Member<V> {
    /// Leaves the group; a no-op if the member already left or the group is gone.
    pub async fn close(&self) {
        if let Some(group) = self.group.upgrade() {
            let _ = group.leave_id(self.id).await;
        }
    }

    /// Broadcasts `value` to the group on behalf of this member, without waiting.
    ///
    /// This member does not receive its own value.
    ///
    /// # Errors
    /// [`GroupError::Closed`] if the group was closed or dropped.
    pub async fn send_async(&self, value: V) -> Result<(), GroupError> {
        let group = self.group.upgrade().ok_or(GroupError::Closed)?;
        group.publish_async(value, Some(self.id)).await
    }

    /// Broadcasts `value` on behalf of this member and waits for the other members.
    ///
    /// This member does not receive its own value and is not counted as a recipient.
    ///
    /// # Errors
    /// [`GroupError::Closed`] if the group was closed or dropped.
    pub async fn send(&self, value: V) -> Result<Receipt, GroupError> {
        let group = self.group.upgrade().ok_or(GroupError::Closed)?;
        group.publish_sync(value, Some(self.id), Deadline::Never).await
    }
}

impl<V> Drop for Member<V> {
    fn drop(&mut self) {
        if !self.drained {
            self.group.request_leave(self.id);
        }
    }
}

impl<V> fmt::Debug for Member<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("drained", &self.drained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Group, GroupError, MemberError};
    use std::time::Duration;

    #[tokio::test]
    async fn filtered_messages_are_auto_acked() {
        let group = Group::<u32>::new();
        let mut evens = group.join().await.expect("join");
        evens.with_filter(|msg| msg.data() % 2 == 0);

        let odd = group.send(3).await.expect("send odd");
        assert_eq!(odd.acked, 1, "rejected copy is acknowledged by the filter");
        assert!(evens.try_recv().expect("open").is_none());

        let (receipt, msg) = tokio::join!(group.send(4), async {
            let mut msg = evens.recv().await.expect("open").expect("message");
            msg.ack().expect("ack");
            msg
        });
        assert_eq!(*msg.data(), 4);
        assert!(receipt.expect("send").is_complete());

        evens.clear_filter();
        group.send_async(5).await.expect("send");
        assert_eq!(*evens.recv().await.expect("open").expect("message").data(), 5);
        group.close();
    }

    #[tokio::test]
    async fn once_yields_exactly_one_message() {
        let group = Group::<u32>::new();
        let mut once = group.join().await.expect("join");
        once.set_once();
        once.with_filter(|msg| *msg.data() > 10);

        for v in [1, 20, 30] {
            group.send_async(v).await.expect("send");
        }

        assert_eq!(*once.recv().await.expect("open").expect("message").data(), 20);
        assert!(once.recv().await.expect("end-of-stream").is_none());
        assert_eq!(once.recv().await.unwrap_err(), MemberError::Drained);

        // The actor removed itself from the group.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !group.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("member left");
        group.close();
    }

    #[tokio::test]
    async fn member_never_receives_its_own_echo() {
        let group = Group::<&'static str>::new();
        let mut alice = group.join().await.expect("join");
        let mut bob = group.join().await.expect("join");

        let (receipt, _) = tokio::join!(alice.send("hi"), async {
            let mut msg = bob.recv().await.expect("open").expect("message");
            assert_eq!(msg.sender(), Some(alice.id()));
            msg.ack().expect("ack");
        });
        let receipt = receipt.expect("send");
        assert_eq!(receipt.recipients, 1);
        assert!(receipt.is_complete());

        bob.send_async("yo").await.expect("send");
        assert_eq!(*alice.recv().await.expect("open").expect("message").data(), "yo");
        assert!(bob.try_recv().expect("open").is_none());
        group.close();
    }

    #[tokio::test]
    async fn dropped_member_leaves_the_group() {
        let group = Group::<u32>::new();
        let member = group.join().await.expect("join");
        let keep = group.join().await.expect("join");
        drop(member);

        assert_eq!(group.members().await.expect("snapshot"), vec![keep.id()]);
        group.close();
    }

    #[tokio::test]
    async fn try_recv_reports_end_of_stream_once() {
        let group = Group::<u32>::new();
        let mut member = group.join().await.expect("join");
        member.close().await;
        member.close().await;

        let eos = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match member.try_recv() {
                    Ok(None) => tokio::task::yield_now().await,
                    other => return other,
                }
            }
        })
        .await
        .expect("stream ended");
        assert_eq!(eos.unwrap_err(), MemberError::Closed);
        assert_eq!(member.try_recv().unwrap_err(), MemberError::Drained);
        group.close();
    }

    #[tokio::test]
    async fn close_leaves_and_ends_the_stream() {
        let group = Group::<String>::new();
        let mut member = group.join().await.expect("join");
        let other = group.join().await.expect("join");

        member.close().await;
        assert_eq!(group.members().await.expect("snapshot"), vec![other.id()]);
        assert!(member.recv().await.expect("end-of-stream").is_none());

        group.close();
        group.closed().await;
        other.close().await;
    }

    #[tokio::test]
    async fn member_send_after_group_drop_is_closed() {
        let group = Group::<u32>::new();
        let member = group.join().await.expect("join");
        drop(group);
        assert_eq!(member.send_async(1).await, Err(GroupError::Closed));
    }
}
