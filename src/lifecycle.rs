//! Top-level setup and cleanup of a test network.
//!
//! [`setup`] drives staging, launch and the liveness wait in order and hands
//! back either a live network or an error after tearing everything down it
//! started. [`cleanup`] is the only component with teardown authority.

use crate::error::{Error, Result};
use crate::keygen::KeygenTool;
use crate::launcher;
use crate::liveness;
use crate::network::{copy_or_build_binary, Network, NetworkOptions};
use crate::peer::NODE_BIN;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Client CLI binary staged next to the network for higher-level test suites.
pub const CLIENT_BIN: &str = "ledgerd-client";

/// Key-generation utility binary, staged and then invoked per peer.
pub const KEYGEN_BIN: &str = "ledgerd-keygen";

/// Client config sources relative to the project root.
const CLIENT_CONFIG_DIR: &str = "configs/client";

/// Fixture consumed by metadata-oriented client tests.
const METADATA_FIXTURE: &str = r#"{"comment":{"String": "Hello Meta!"}}"#;

/// Liveness attempt budget for a fresh network.
const GENESIS_WAIT_ATTEMPTS: u32 = 20;

/// Create, launch and await a test network.
///
/// Stages the client CLI, the metadata fixture, the client config and the
/// keygen utility into the output directory, then composes the network,
/// launches every peer (genesis first) and polls for the genesis block.
///
/// # Errors
///
/// Any staging failure aborts before a single process is launched. A
/// liveness timeout tears the whole network down again before the
/// [`Error::GenesisTimeout`] reaches the caller; there is no partial
/// success.
pub async fn setup(options: NetworkOptions) -> Result<Network> {
    info!(
        "Starting test network with {} peers in `{}`...",
        options.peer_count,
        options.out_dir.display()
    );
    tokio::fs::create_dir_all(&options.out_dir).await?;

    copy_or_build_binary(
        CLIENT_BIN,
        &options.root_dir,
        &options.out_dir,
        options.build_policy,
    )
    .await?;
    tokio::fs::write(options.out_dir.join("metadata.json"), METADATA_FIXTURE).await?;
    stage_client_config(&options.root_dir, &options.out_dir).await?;
    copy_or_build_binary(
        KEYGEN_BIN,
        &options.root_dir,
        &options.out_dir,
        options.build_policy,
    )
    .await?;

    let keygen = KeygenTool::new(options.out_dir.join(KEYGEN_BIN));
    let network = Network::build(options, &keygen).await?;
    launcher::launch(&network)?;

    if let Err(e) = liveness::await_genesis(&network, GENESIS_WAIT_ATTEMPTS).await {
        // A failed bootstrap must not leave orphaned peers behind.
        if let Err(cleanup_err) = cleanup(network.out_dir()).await {
            warn!("Cleanup after a failed bootstrap also failed: {cleanup_err}");
        }
        return Err(e);
    }

    Ok(network)
}

/// Tear down a network: kill its peer processes, then remove its directory.
///
/// Process termination matches by the peer binary's name rather than by
/// tracked pids, since peers are detached and typically outlive the
/// orchestrator invocation that spawned them. A second network sharing the
/// same binary name on this host will be terminated too.
///
/// # Errors
///
/// Returns [`Error::DirectoryMissing`] if `out_dir` does not exist. The
/// kill step has already run at that point.
pub async fn cleanup(out_dir: &Path) -> Result<()> {
    kill_peers();

    if !out_dir.exists() {
        return Err(Error::DirectoryMissing {
            path: out_dir.to_path_buf(),
        });
    }
    info!("Cleaning up test directory `{}`...", out_dir.display());
    tokio::fs::remove_dir_all(out_dir).await?;
    Ok(())
}

fn kill_peers() {
    info!("Killing peer processes...");
    match Command::new("pkill").args(["-9", NODE_BIN]).status() {
        Ok(status) if status.success() => {}
        Ok(_) => info!("No running peer processes matched `{NODE_BIN}`"),
        Err(e) => warn!("Failed to run pkill: {e}"),
    }
}

async fn stage_client_config(root_dir: &Path, out_dir: &Path) -> Result<()> {
    let source = root_dir.join(CLIENT_CONFIG_DIR).join("config.json");
    match tokio::fs::copy(&source, out_dir.join("config.json")).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ConfigMissing {
            path: source,
            expected_dir: root_dir.join(CLIENT_CONFIG_DIR),
        }),
        Err(e) => Err(e.into()),
    }
}
