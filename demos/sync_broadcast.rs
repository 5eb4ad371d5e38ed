//! # Synchronous Broadcast Example
//!
//! Three workers join a group. A coordinator broadcasts jobs with `send`, which waits
//! until every worker acknowledged the job, then finishes with a bounded `send_timeout`
//! while one worker holds its copy.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example sync_broadcast
//! ```

use std::time::Duration;

use broadcaster::{Group, GroupError, Member};
use tracing::info;

async fn worker(name: &'static str, mut member: Member<String>, hold_last: bool) {
    while let Ok(Some(mut msg)) = member.recv().await {
        let job = msg.data().clone();
        if hold_last && job == "shutdown" {
            info!(worker = name, "holding the last job without acknowledging");
            tokio::time::sleep(Duration::from_millis(300)).await;
            continue;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        info!(worker = name, %job, "processed");
        if let Err(err) = msg.ack() {
            info!(worker = name, error = %err, "ack failed");
        }
    }
    info!(worker = name, "stream ended");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let group = Group::<String>::new();
    let mut workers = Vec::new();
    for (name, hold) in [("alpha", false), ("beta", false), ("gamma", true)] {
        let member = group.join().await?;
        workers.push(tokio::spawn(worker(name, member, hold)));
    }

    for job in ["build", "test", "package"] {
        let receipt = group.send(job.to_string()).await?;
        info!(
            job,
            recipients = receipt.recipients,
            acked = receipt.acked,
            "job acknowledged by every worker"
        );
    }

    match group
        .send_timeout("shutdown".to_string(), Duration::from_millis(100))
        .await
    {
        Ok(receipt) => info!(acked = receipt.acked, "shutdown acknowledged"),
        Err(GroupError::Timeout { timeout }) => {
            info!(?timeout, "shutdown not acknowledged in time; closing anyway")
        }
        Err(err) => return Err(err.into()),
    }

    group.close();
    for w in workers {
        w.await?;
    }
    Ok(())
}
