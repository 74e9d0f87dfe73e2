//! Genesis liveness polling.
//!
//! A network counts as live once its genesis peer reports at least one
//! block. Until then, a zero count and an unreachable endpoint mean the same
//! thing: not ready yet, retry.

use crate::error::{Error, Result};
use crate::network::Network;
use std::time::Duration;
use tracing::info;

/// Interval between liveness attempts.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request timeout for a single status probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the block-count status endpoint on a peer's API address.
const STATUS_BLOCKS_PATH: &str = "/status/blocks";

/// Poll the genesis peer's status endpoint until it reports a block.
///
/// # Errors
///
/// Returns [`Error::GenesisTimeout`] after `max_attempts` attempts without
/// an observed block. The caller owns the subsequent cleanup.
pub async fn await_genesis(network: &Network, max_attempts: u32) -> Result<()> {
    wait_for_blocks(&network.genesis_peer().api_addr(), max_attempts).await
}

async fn wait_for_blocks(api_addr: &str, max_attempts: u32) -> Result<()> {
    let url = format!("http://{api_addr}{STATUS_BLOCKS_PATH}");
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .unwrap_or_default();

    for attempt in 1..=max_attempts {
        info!("Waiting for genesis block to be created... Attempt {attempt}/{max_attempts}");
        match probe(&client, &url).await {
            Ok(count) if count >= 1 => {
                info!("Genesis block created. Block count: {count}");
                return Ok(());
            }
            Ok(_) => info!("No blocks yet. Sleeping 1 second..."),
            Err(e) => info!("Error connecting to genesis peer: {e}. Sleeping 1 second..."),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    Err(Error::GenesisTimeout {
        attempts: max_attempts,
    })
}

async fn probe(client: &reqwest::Client, url: &str) -> std::result::Result<u64, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let body = response.text().await.map_err(|e| e.to_string())?;
    body.trim()
        .parse::<u64>()
        .map_err(|e| format!("unexpected block count {body:?}: {e}"))
}
