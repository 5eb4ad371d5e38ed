//! # SubscriberSet: per-subscriber queues fed from the group's bus.
//!
//! The group's listener task hands every lifecycle event to [`SubscriberSet::emit`]. Each
//! subscriber owns a bounded queue drained by its own worker, so a slow audit sink never
//! delays the owner loop or its neighbours.
//!
//! ```text
//! listener ──► emit(ev) ──try_send──► [queue "log"]   ──► worker ──► LogWriter::on_event
//!                       ──try_send──► [queue "churn"] ──► worker ──► Churn::on_event
//!                          │ full / closed                  │ panic
//!                          ▼                                ▼
//!                   SubscriberOverflow               SubscriberPanicked
//!                   (back onto the bus)              (back onto the bus)
//! ```
//!
//! Events reach one subscriber in emission order. Different subscribers progress
//! independently. Overflow notices are never re-reported when they overflow themselves.
//!
//! Panics are caught behind `AssertUnwindSafe`: a subscriber that panics while holding a
//! lock of its own may leave that state poisoned.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

/// Sending side of one subscriber's queue.
struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Bounded, panic-isolated fan-out of lifecycle events to [`Subscribe`] implementations.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; overflow and panic notices go to `bus`.
    ///
    /// A declared queue capacity of `0` is raised to 1.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    queue,
                };
                (lane, tokio::spawn(run_worker(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Returns `true` if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Queues a copy of `event` for every subscriber.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues a shared event for every subscriber without waiting.
    ///
    /// A subscriber whose queue is full (or whose worker is gone) misses the event and a
    /// `SubscriberOverflow` notice is published, unless the event is itself such a notice.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let notice = event.is_subscriber_overflow();
        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !notice {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to finish what was already queued.
    pub async fn shutdown(self) {
        let Self { lanes, workers, .. } = self;
        drop(lanes);
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            tracing::warn!(subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
