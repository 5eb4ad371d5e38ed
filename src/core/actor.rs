//! # MemberActor: per-member dispatch loop.
//!
//! Sits between the owner loop and the consumer of one [`Member`](crate::Member).
//!
//! ## Architecture
//! ```text
//! owner loop ──► [inbound] ──► MemberActor::run()
//!
//! loop {
//!   ├─► token cancelled          → exit (removed by the group)
//!   ├─► recv envelope
//!   │     ├─► sender == self     → discard (no echo)
//!   │     ├─► filter rejects     → ack, discard
//!   │     └─► forward            → [outbound] ──► Member::recv
//!   │                               (waits for room, aborts on cancellation)
//!   └─► once && forwarded        → exit, ask the group to remove us
//! }
//!
//! On exit: inbound and outbound are dropped; queued envelopes release their acks and
//! the consumer observes end-of-stream after reading what was already forwarded.
//! ```

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::group::WeakGroup;
use super::member::Settings;
use crate::message::{MemberId, Message};

/// Why the actor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// The group removed the member (leave or close).
    Removed,
    /// `once` member forwarded its envelope.
    Once,
    /// The consumer dropped its [`Member`](crate::Member).
    ConsumerGone,
}

impl Exit {
    fn as_str(self) -> &'static str {
        match self {
            Exit::Removed => "removed",
            Exit::Once => "once",
            Exit::ConsumerGone => "consumer_gone",
        }
    }
}

/// Outcome of handling one envelope.
enum Step {
    Continue,
    Exit(Exit),
}

/// Dispatch loop of one member.
pub(crate) struct MemberActor<V> {
    id: MemberId,
    inbound: mpsc::Receiver<Message<V>>,
    outbound: mpsc::Sender<Message<V>>,
    settings: watch::Receiver<Settings<V>>,
    group: WeakGroup<V>,
}

impl<V: Clone + Send + Sync + 'static> MemberActor<V> {
    pub(crate) fn new(
        id: MemberId,
        inbound: mpsc::Receiver<Message<V>>,
        outbound: mpsc::Sender<Message<V>>,
        settings: watch::Receiver<Settings<V>>,
        group: WeakGroup<V>,
    ) -> Self {
        Self {
            id,
            inbound,
            outbound,
            settings,
            group,
        }
    }

    /// Runs until the member is removed, self-closes via `once`, or its consumer is gone.
    pub(crate) async fn run(self, token: CancellationToken) {
        let MemberActor {
            id,
            mut inbound,
            outbound,
            settings,
            group,
        } = self;

        let exit = loop {
            let msg = tokio::select! {
                biased;
                _ = token.cancelled() => break Exit::Removed,
                msg = inbound.recv() => match msg {
                    Some(msg) => msg,
                    None => break Exit::Removed,
                },
            };

            match dispatch(id, msg, &outbound, &settings, &token).await {
                Step::Continue => {}
                Step::Exit(exit) => break exit,
            }
        };

        drop(inbound);
        drop(outbound);
        debug!(member = %id, reason = exit.as_str(), "member actor stopped");

        if exit != Exit::Removed {
            if let Some(group) = group.upgrade() {
                let _ = group.leave_id(id).await;
            }
        }
    }
}

async fn dispatch<V>(
    id: MemberId,
    mut msg: Message<V>,
    outbound: &mpsc::Sender<Message<V>>,
    settings: &watch::Receiver<Settings<V>>,
    token: &CancellationToken,
) -> Step {
    if msg.sender() == Some(id) {
        trace!(member = %id, "echo discarded");
        return Step::Continue;
    }

    let (filter, once) = {
        let s = settings.borrow();
        (s.filter.clone(), s.once)
    };
    if let Some(filter) = filter {
        if !filter(&msg) {
            let _ = msg.ack();
            trace!(member = %id, "envelope filtered out");
            return Step::Continue;
        }
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => return Step::Exit(Exit::Removed),
        res = outbound.send(msg) => {
            if res.is_err() {
                return Step::Exit(Exit::ConsumerGone);
            }
        }
    }

    if once {
        Step::Exit(Exit::Once)
    } else {
        Step::Continue
    }
}
