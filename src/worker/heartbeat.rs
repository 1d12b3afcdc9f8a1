//! Periodic registration with the coordinator.

use anyhow::{Result, bail};
use std::time::Duration;
use tokio::task::JoinHandle;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn send_ping(
    client: &reqwest::Client,
    coordinator: &str,
    id: &str,
    port: u16,
) -> Result<()> {
    let port = port.to_string();
    let response = client
        .get(format!("http://{}/ping", coordinator))
        .query(&[("id", id), ("port", port.as_str())])
        .timeout(PING_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("coordinator answered {}", response.status());
    }
    Ok(())
}

/// Pings the coordinator every `interval` until the task is aborted.
/// Failures are logged and retried at the next tick.
pub fn spawn_heartbeat(
    client: reqwest::Client,
    coordinator: String,
    id: String,
    port: u16,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match send_ping(&client, &coordinator, &id, port).await {
                Ok(()) => tracing::trace!("Heartbeat sent to {}", coordinator),
                Err(e) => tracing::warn!("Heartbeat to {} failed: {}", coordinator, e),
            }
        }
    })
}
