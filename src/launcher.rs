//! Detached launch of a staged network's peer processes.

use crate::error::Result;
use crate::network::{Network, GENESIS_FILE};
use crate::peer::{PeerDescriptor, NODE_BIN};
use std::collections::BTreeMap;
use std::fs::File;
use std::process::{Child, Command, Stdio};
use tracing::info;

// =============================================================================
// Per-Peer Environment Keys
// =============================================================================

const ENV_BLOCK_STORE_PATH: &str = "LEDGERD_BLOCK_STORE_PATH";
const ENV_SNAPSHOT_PATH: &str = "LEDGERD_SNAPSHOT_PATH";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
const ENV_DIAGNOSTICS_ADDR: &str = "LEDGERD_DIAGNOSTICS_ADDR";
const ENV_PUBLIC_KEY: &str = "LEDGERD_PUBLIC_KEY";
const ENV_PRIVATE_KEY: &str = "LEDGERD_PRIVATE_KEY";
const ENV_FORCE_SOFT_FORK: &str = "LEDGERD_DEBUG_FORCE_SOFT_FORK";
const ENV_P2P_ADDR: &str = "LEDGERD_P2P_ADDR";
const ENV_API_ADDR: &str = "LEDGERD_API_ADDR";
const ENV_GENESIS_PRIVATE_KEY: &str = "LEDGERD_GENESIS_PRIVATE_KEY";
const ENV_GENESIS_FILE: &str = "LEDGERD_GENESIS_FILE";

/// Flag instructing the genesis peer to submit the genesis block.
const SUBMIT_GENESIS_FLAG: &str = "--submit-genesis";

/// A launched peer process.
///
/// The handle is informational. Peers are spawned detached and outlive the
/// orchestrator; their log file descriptors belong to the OS from the moment
/// of spawn and are never closed here. Teardown goes through
/// [`crate::lifecycle::cleanup`], which matches processes by name.
#[derive(Debug)]
pub struct RunningPeer {
    name: String,
    child: Child,
}

impl RunningPeer {
    /// Name of the peer this process runs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

/// Launch every peer of a staged network, genesis peer first.
///
/// Only peer 0 receives the submit-genesis flag and the genesis-only
/// environment entries.
///
/// # Errors
///
/// Returns an I/O error if a log file cannot be created or a process fails
/// to spawn. The peer binary itself is guaranteed present by the composer.
pub fn launch(network: &Network) -> Result<Vec<RunningPeer>> {
    let mut running = Vec::with_capacity(network.peers().len());
    for peer in network.peers() {
        running.push(launch_peer(network, peer, peer.index() == 0)?);
    }
    Ok(running)
}

fn launch_peer(network: &Network, peer: &PeerDescriptor, submit_genesis: bool) -> Result<RunningPeer> {
    info!("Running peer {}...", peer.name());

    std::fs::create_dir_all(peer.storage_dir())?;

    // Handed to the child at spawn; nothing here ever closes them.
    let stdout = File::create(peer.stdout_path())?;
    let stderr = File::create(peer.stderr_path())?;

    let env = peer_env(network.shared_env(), peer, submit_genesis);

    let mut command = Command::new(network.peers_dir().join(NODE_BIN));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.arg0(peer.name());
    }
    if submit_genesis {
        command.arg(SUBMIT_GENESIS_FLAG);
    }

    let child = command
        .env_clear()
        .envs(&env)
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()?;

    info!("Peer {} is running with pid {}", peer.name(), child.id());
    Ok(RunningPeer {
        name: peer.name().to_string(),
        child,
    })
}

/// The peer's full environment: node-specific entries merged over the shared
/// base map. Node-specific keys win on conflict; the base is never mutated.
fn peer_env(
    shared_env: &BTreeMap<String, String>,
    peer: &PeerDescriptor,
    submit_genesis: bool,
) -> BTreeMap<String, String> {
    let mut env = shared_env.clone();
    env.insert(
        ENV_BLOCK_STORE_PATH.to_string(),
        peer.storage_dir().display().to_string(),
    );
    env.insert(
        ENV_SNAPSHOT_PATH.to_string(),
        peer.storage_dir().display().to_string(),
    );
    env.insert(ENV_LOG_LEVEL.to_string(), "INFO".to_string());
    env.insert(ENV_LOG_FORMAT.to_string(), "\"pretty\"".to_string());
    env.insert(ENV_DIAGNOSTICS_ADDR.to_string(), peer.diagnostics_addr());
    env.insert(ENV_PUBLIC_KEY.to_string(), peer.public_key().to_string());
    env.insert(
        ENV_PRIVATE_KEY.to_string(),
        peer.key_pair().private_key_json(),
    );
    env.insert(ENV_FORCE_SOFT_FORK.to_string(), "false".to_string());
    env.insert(ENV_P2P_ADDR.to_string(), peer.p2p_addr());
    env.insert(ENV_API_ADDR.to_string(), peer.api_addr());

    if submit_genesis {
        env.insert(
            ENV_GENESIS_PRIVATE_KEY.to_string(),
            peer.key_pair().private_key_json(),
        );
        env.insert(
            ENV_GENESIS_FILE.to_string(),
            peer.peer_dir().join(GENESIS_FILE).display().to_string(),
        );
    }

    env
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::keygen::KeyPair;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;

    fn test_peer(index: usize, dir: PathBuf) -> PeerDescriptor {
        let key_pair = KeyPair {
            public_key: format!("ed0120peer{index}"),
            private_key: serde_json::json!({"payload": format!("secret{index}")}),
        };
        PeerDescriptor::for_tests(index, IpAddr::V4(Ipv4Addr::LOCALHOST), dir, key_pair)
    }

    #[test]
    fn node_specific_keys_win_over_the_shared_base() {
        let mut shared = BTreeMap::new();
        shared.insert("LOG_LEVEL".to_string(), "TRACE".to_string());
        shared.insert("SHARED_ONLY".to_string(), "kept".to_string());

        let peer = test_peer(1, PathBuf::from("/tmp/peers/ledgerd1"));
        let env = peer_env(&shared, &peer, false);

        assert_eq!(env["LOG_LEVEL"], "INFO");
        assert_eq!(env["SHARED_ONLY"], "kept");
        assert_eq!(env["LEDGERD_P2P_ADDR"], "127.0.0.1:1338");
        assert_eq!(env["LEDGERD_API_ADDR"], "127.0.0.1:8081");
        // Merging must not leak node entries back into the shared map.
        assert!(!shared.contains_key("LEDGERD_P2P_ADDR"));
    }

    #[test]
    fn genesis_entries_are_confined_to_the_genesis_peer() {
        let shared = BTreeMap::new();

        let genesis = test_peer(0, PathBuf::from("/tmp/peers/ledgerd0"));
        let env = peer_env(&shared, &genesis, true);
        assert_eq!(env["LEDGERD_GENESIS_PRIVATE_KEY"], r#"{"payload":"secret0"}"#);
        assert_eq!(
            env["LEDGERD_GENESIS_FILE"],
            "/tmp/peers/ledgerd0/genesis.json"
        );

        let regular = test_peer(1, PathBuf::from("/tmp/peers/ledgerd1"));
        let env = peer_env(&shared, &regular, false);
        assert!(!env.contains_key("LEDGERD_GENESIS_PRIVATE_KEY"));
        assert!(!env.contains_key("LEDGERD_GENESIS_FILE"));
    }

    #[cfg(unix)]
    #[test]
    fn launch_redirects_streams_and_flags_the_genesis_peer() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let peers_dir = dir.path().join("peers");
        let peer0_dir = peers_dir.join("ledgerd0");
        let peer1_dir = peers_dir.join("ledgerd1");
        std::fs::create_dir_all(&peer0_dir).unwrap();
        std::fs::create_dir_all(&peer1_dir).unwrap();

        // Stand-in peer binary that records its arguments and exits. A
        // shebang script drops the argv[0] override, so only the arguments
        // are asserted on.
        let binary = peers_dir.join(NODE_BIN);
        std::fs::write(&binary, "#!/bin/sh\necho \"args:$@\"\n").unwrap();
        let mut perms = std::fs::metadata(&binary).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&binary, perms).unwrap();

        let peers = vec![test_peer(0, peer0_dir.clone()), test_peer(1, peer1_dir.clone())];
        let network = Network::from_parts(
            dir.path().to_path_buf(),
            peers_dir,
            peers,
            BTreeMap::new(),
        );

        let mut running = launch(&network).unwrap();
        assert_eq!(running.len(), 2);
        for peer in &mut running {
            peer.child.wait().unwrap();
        }

        assert_eq!(running[0].name(), "ledgerd0");
        assert_eq!(running[1].name(), "ledgerd1");

        let stdout0 = std::fs::read_to_string(peer0_dir.join(".stdout")).unwrap();
        assert!(stdout0.contains(SUBMIT_GENESIS_FLAG));

        let stdout1 = std::fs::read_to_string(peer1_dir.join(".stdout")).unwrap();
        assert!(stdout1.starts_with("args:"));
        assert!(!stdout1.contains(SUBMIT_GENESIS_FLAG));

        assert!(peer0_dir.join(".stderr").exists());
        assert!(peer0_dir.join("storage").is_dir());
    }
}
