//! Network composition: provisioning peers and staging shared artifacts.
//!
//! [`Network::build`] is pure staging. It generates identities, lays out the
//! filesystem and composes the shared environment, but starts no processes;
//! launching is a separate step in [`crate::launcher`].

use crate::error::{Error, Result};
use crate::keygen::KeygenTool;
use crate::peer::{PeerDescriptor, PeerRecord, NODE_BIN};
use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

// =============================================================================
// Staged Artifacts
// =============================================================================

/// Chain identifier shared by every peer of a test network.
pub const CHAIN_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Shared peer config file, copied to the peers directory.
pub(crate) const SHARED_CONFIG_FILE: &str = "config.json";

/// Genesis definition, staged into the genesis peer's directory only.
pub(crate) const GENESIS_FILE: &str = "genesis.json";

/// Executor artifact referenced by the genesis definition.
pub(crate) const EXECUTOR_FILE: &str = "executor.wasm";

/// Peer config sources relative to the project root.
const PEER_CONFIG_DIR: &str = "configs/peer";

/// Debug build output relative to the project root.
const DEBUG_BUILD_DIR: &str = "target/debug";

// =============================================================================
// Shared Environment Keys
// =============================================================================

const ENV_CHAIN_ID: &str = "LEDGERD_CHAIN_ID";
const ENV_CONFIG: &str = "LEDGERD_CONFIG";
const ENV_GENESIS_PUBLIC_KEY: &str = "LEDGERD_GENESIS_PUBLIC_KEY";
const ENV_TRUSTED_PEERS: &str = "LEDGERD_TRUSTED_PEERS";

/// What to do when a required binary is missing from the project root.
///
/// The decision is injected by the caller so the composer itself never
/// blocks on a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPolicy {
    /// Ask on stdin, accepting `y`/`yes`/empty or `n`/`no`.
    #[default]
    Prompt,
    /// Run `cargo build --bin <name>` without asking.
    Build,
    /// Fail with [`Error::MissingBinary`].
    Abort,
}

impl BuildPolicy {
    fn should_build(self, name: &str) -> bool {
        match self {
            Self::Build => true,
            Self::Abort => false,
            Self::Prompt => prompt_for_build(name),
        }
    }
}

fn prompt_for_build(name: &str) -> bool {
    loop {
        println!("Build it by running `cargo build --bin {name}`? (Y/n)");
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "" => return true,
            "n" | "no" => return false,
            _ => error!("Please answer with either `y[es]` or `n[o]`"),
        }
    }
}

/// Copy `name` from the project's debug build into `target_dir`, building it
/// first according to `policy` when it is absent.
///
/// # Errors
///
/// Returns [`Error::MissingBinary`] if the binary is absent and the policy
/// declines to build it, or if the build itself fails.
pub async fn copy_or_build_binary(
    name: &str,
    root_dir: &Path,
    target_dir: &Path,
    policy: BuildPolicy,
) -> Result<()> {
    let source = root_dir.join(DEBUG_BUILD_DIR).join(name);
    if !source.exists() {
        error!(
            "The binary `{name}` wasn't found in `{}`",
            root_dir.display()
        );
        if !policy.should_build(name) {
            return Err(Error::MissingBinary {
                name: name.to_string(),
                root_dir: root_dir.to_path_buf(),
            });
        }
        build_binary(name, root_dir)?;
    }
    tokio::fs::copy(&source, target_dir.join(name)).await?;
    Ok(())
}

fn build_binary(name: &str, root_dir: &Path) -> Result<()> {
    info!("Building `{name}`...");
    let status = Command::new("cargo")
        .args(["build", "--bin", name])
        .current_dir(root_dir)
        .status()?;
    if !status.success() {
        return Err(Error::MissingBinary {
            name: name.to_string(),
            root_dir: root_dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Copy a required config file, mapping a missing source to
/// [`Error::ConfigMissing`] naming the directory to populate.
async fn stage_config(source: &Path, dest: &Path) -> Result<()> {
    match tokio::fs::copy(source, dest).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ConfigMissing {
            path: source.to_path_buf(),
            expected_dir: source
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Caller-facing knobs for composing a network.
#[derive(Debug, Clone)]
pub struct NetworkOptions {
    /// Number of peers to bootstrap. Must be at least 1.
    pub peer_count: usize,
    /// Directory that receives binaries, config and per-peer state.
    pub out_dir: PathBuf,
    /// Ledger project root used to locate binaries and config files.
    pub root_dir: PathBuf,
    /// Host address for every peer endpoint and the discovery list.
    pub host: IpAddr,
    /// Derive each peer's key from its name, keeping keys stable across
    /// invocations.
    pub peer_name_as_seed: bool,
    /// What to do when a required binary is missing.
    pub build_policy: BuildPolicy,
    /// Extra environment entries shared by every peer.
    pub extra_env: Vec<(String, String)>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            peer_count: 4,
            out_dir: PathBuf::from("./test"),
            root_dir: PathBuf::from("."),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            peer_name_as_seed: false,
            build_policy: BuildPolicy::default(),
            extra_env: Vec::new(),
        }
    }
}

/// A fully staged network of bootstrapped peers, ready to launch.
///
/// Everything in here is written once by [`Network::build`] and treated as
/// immutable afterwards; peer processes never mutate shared state.
#[derive(Debug)]
pub struct Network {
    out_dir: PathBuf,
    peers_dir: PathBuf,
    peers: Vec<PeerDescriptor>,
    shared_env: BTreeMap<String, String>,
}

impl Network {
    /// Provision peers and stage every shared artifact.
    ///
    /// Steps: allocate descriptors with index-derived ports and a fresh
    /// identity each, copy the shared peer config next to them, stage the
    /// genesis definition and executor artifact into peer 0's directory
    /// only, stage the `ledgerd` binary, then compose the discovery list
    /// and the shared environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty network,
    /// [`Error::ExternalTool`] if key generation fails,
    /// [`Error::ConfigMissing`] if a required config source is absent, and
    /// [`Error::MissingBinary`] if the peer binary cannot be staged.
    pub async fn build(options: NetworkOptions, keygen: &KeygenTool) -> Result<Self> {
        if options.peer_count == 0 {
            return Err(Error::Config("at least one peer is required".to_string()));
        }

        info!("Setting up a {}-peer test network...", options.peer_count);
        let peers_dir = options.out_dir.join("peers");
        tokio::fs::create_dir_all(&peers_dir).await?;

        let mut peers = Vec::with_capacity(options.peer_count);
        for index in 0..options.peer_count {
            let peer = PeerDescriptor::provision(
                index,
                options.host,
                &peers_dir,
                keygen,
                options.peer_name_as_seed,
            )
            .await?;
            peers.push(peer);
        }

        let config_dir = options.root_dir.join(PEER_CONFIG_DIR);
        stage_config(
            &config_dir.join(SHARED_CONFIG_FILE),
            &peers_dir.join(SHARED_CONFIG_FILE),
        )
        .await?;

        // Genesis artifacts exist on exactly one peer.
        let genesis_dir = peers[0].peer_dir();
        stage_config(&config_dir.join(GENESIS_FILE), &genesis_dir.join(GENESIS_FILE)).await?;
        stage_config(
            &config_dir.join(EXECUTOR_FILE),
            &genesis_dir.join(EXECUTOR_FILE),
        )
        .await?;

        copy_or_build_binary(NODE_BIN, &options.root_dir, &peers_dir, options.build_policy)
            .await?;

        info!("Generating trusted peers...");
        let records: Vec<PeerRecord> = peers.iter().map(PeerDescriptor::record).collect();
        let trusted_peers = serde_json::to_string(&records)?;

        let mut shared_env: BTreeMap<String, String> = std::env::vars().collect();
        shared_env.insert(ENV_CHAIN_ID.to_string(), CHAIN_ID.to_string());
        shared_env.insert(
            ENV_CONFIG.to_string(),
            peers_dir.join(SHARED_CONFIG_FILE).display().to_string(),
        );
        shared_env.insert(
            ENV_GENESIS_PUBLIC_KEY.to_string(),
            peers[0].public_key().to_string(),
        );
        shared_env.insert(ENV_TRUSTED_PEERS.to_string(), trusted_peers);
        shared_env.extend(options.extra_env.iter().cloned());

        Ok(Self {
            out_dir: options.out_dir,
            peers_dir,
            peers,
            shared_env,
        })
    }

    /// All peers, in launch order.
    #[must_use]
    pub fn peers(&self) -> &[PeerDescriptor] {
        &self.peers
    }

    /// The genesis peer (index 0).
    #[must_use]
    pub fn genesis_peer(&self) -> &PeerDescriptor {
        &self.peers[0]
    }

    /// The discovery list, recomputed from the descriptors.
    #[must_use]
    pub fn records(&self) -> Vec<PeerRecord> {
        self.peers.iter().map(PeerDescriptor::record).collect()
    }

    /// The immutable base environment shared by every peer process.
    #[must_use]
    pub fn shared_env(&self) -> &BTreeMap<String, String> {
        &self.shared_env
    }

    /// The directory holding the staged peer binary and per-peer state.
    #[must_use]
    pub fn peers_dir(&self) -> &Path {
        &self.peers_dir
    }

    /// The network's root output directory.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Assemble a network from pre-built parts (for tests).
    #[cfg(test)]
    pub(crate) fn from_parts(
        out_dir: PathBuf,
        peers_dir: PathBuf,
        peers: Vec<PeerDescriptor>,
        shared_env: BTreeMap<String, String>,
    ) -> Self {
        Self {
            out_dir,
            peers_dir,
            peers,
            shared_env,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_the_conventional_layout() {
        let options = NetworkOptions::default();
        assert_eq!(options.peer_count, 4);
        assert_eq!(options.out_dir, PathBuf::from("./test"));
        assert_eq!(options.root_dir, PathBuf::from("."));
        assert_eq!(options.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(options.build_policy, BuildPolicy::Prompt);
    }

    #[tokio::test]
    async fn empty_network_is_rejected() {
        let options = NetworkOptions {
            peer_count: 0,
            ..NetworkOptions::default()
        };
        let keygen = KeygenTool::new(PathBuf::from("/nonexistent/ledgerd-keygen"));
        let err = Network::build(options, &keygen).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn abort_policy_reports_a_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_or_build_binary("ledgerd", dir.path(), dir.path(), BuildPolicy::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingBinary { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn present_binary_is_copied_without_consulting_the_policy() {
        let root = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let debug_dir = root.path().join(DEBUG_BUILD_DIR);
        std::fs::create_dir_all(&debug_dir).unwrap();
        std::fs::write(debug_dir.join("ledgerd"), b"#!/bin/sh\n").unwrap();

        copy_or_build_binary("ledgerd", root.path(), target.path(), BuildPolicy::Abort)
            .await
            .unwrap();
        assert!(target.path().join("ledgerd").exists());
    }

    #[tokio::test]
    async fn missing_config_source_names_the_expected_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("configs/peer/config.json");
        let err = stage_config(&source, &dir.path().join("config.json"))
            .await
            .unwrap_err();
        match err {
            Error::ConfigMissing { expected_dir, .. } => {
                assert_eq!(expected_dir, dir.path().join("configs/peer"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
