//! # Custom Subscriber Example
//!
//! Shows how to plug event subscribers into a group to track membership churn and
//! dropped deliveries, next to the built-in `LogWriter`.
//!
//! The example counts:
//! - Members joined
//! - Members left
//! - Deliveries dropped for a slow member
//!
//! ## Run
//! ```bash
//! cargo run --example subscriber --features logging
//! ```

use std::{
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use broadcaster::{Event, EventKind, Group, GroupConfig, LogWriter, Subscribe};

struct ChurnSubscriber {
    joined: AtomicU64,
    left: AtomicU64,
    dropped: AtomicU64,
}

impl ChurnSubscriber {
    fn new() -> Self {
        Self {
            joined: AtomicU64::new(0),
            left: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
    fn print_stats(&self) {
        println!();
        println!("Churn:");
        println!(" ├─► Joined:  {}", self.joined.load(Ordering::Relaxed));
        println!(" ├─► Left:    {}", self.left.load(Ordering::Relaxed));
        println!(" └─► Dropped: {}", self.dropped.load(Ordering::Relaxed));
    }
}

#[async_trait::async_trait]
impl Subscribe for ChurnSubscriber {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::MemberJoined => {
                self.joined.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::MemberLeft => {
                self.left.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::DeliveryDropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
    fn name(&self) -> &'static str {
        "churn"
    }
    fn queue_capacity(&self) -> usize {
        256
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,broadcaster=debug".into()),
        )
        .init();

    let churn = Arc::new(ChurnSubscriber::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter), churn.clone()];

    // Tiny queues and an explicit delivery timeout so the idle member drops values.
    let cfg = GroupConfig {
        member_capacity: 1,
        outbound_capacity: 1,
        delivery_timeout: Some(Duration::from_millis(10)),
        ..GroupConfig::default()
    };
    let group = Group::<u32>::builder(cfg).with_subscribers(subs).build();

    let mut reader = group.join().await?;
    let idle = group.join().await?;

    let consumer = tokio::spawn(async move {
        let mut seen = 0;
        while let Ok(Some(msg)) = reader.recv().await {
            seen += *msg.data();
        }
        seen
    });

    for v in 1..=5 {
        group.send_async(v).await?;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    drop(idle);
    group.close();
    group.closed().await;

    let sum = consumer.await?;
    println!("reader saw sum={sum}");

    // Let subscriber workers drain their queues.
    tokio::time::sleep(Duration::from_millis(50)).await;
    churn.print_stats();
    Ok(())
}
