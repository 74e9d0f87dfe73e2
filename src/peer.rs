//! Per-peer descriptors and their public projection into the discovery list.

use crate::error::{Error, Result};
use crate::keygen::{KeyPair, KeygenTool};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Port Allocation
// =============================================================================
//
// Every endpoint port is a fixed base offset by the peer index, so the full
// address layout of a network is a pure function of its peer count.

/// First P2P port; peer `i` listens on `BASE_P2P_PORT + i`.
pub const BASE_P2P_PORT: u16 = 1337;

/// First API port; peer `i` serves its status endpoint on `BASE_API_PORT + i`.
pub const BASE_API_PORT: u16 = 8080;

/// First diagnostics console port, offset by peer index.
pub const BASE_DIAGNOSTICS_PORT: u16 = 5555;

/// Name of the peer daemon binary. Peer names and the teardown match
/// pattern both derive from it.
pub const NODE_BIN: &str = "ledgerd";

/// Subdirectory of a peer's working directory holding its block store.
pub(crate) const STORAGE_DIR: &str = "storage";

fn offset_port(base: u16, index: usize) -> Result<u16> {
    u16::try_from(index)
        .ok()
        .and_then(|i| base.checked_add(i))
        .ok_or_else(|| Error::Config(format!("peer index {index} overflows the port range")))
}

/// A peer's entry in the network-wide discovery list: the address and public
/// key every other peer needs to find and authenticate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRecord {
    /// `host:p2p_port` of the peer.
    pub address: String,
    /// The peer's public key.
    pub public_key: String,
}

/// A single provisioned peer. Index 0 is the genesis node; the rest are
/// regular peers. Immutable once provisioned.
#[derive(Debug)]
pub struct PeerDescriptor {
    index: usize,
    name: String,
    host: IpAddr,
    p2p_port: u16,
    api_port: u16,
    diagnostics_port: u16,
    peer_dir: PathBuf,
    key_pair: KeyPair,
}

impl PeerDescriptor {
    /// Allocate ports, generate an identity and create the peer's working
    /// directory under `peers_dir`.
    ///
    /// With `name_as_seed` the key is derived from the peer name, keeping
    /// key material stable across repeated invocations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] if key generation fails,
    /// [`Error::Config`] if the index overflows the port range, or an I/O
    /// error if the working directory cannot be created.
    pub async fn provision(
        index: usize,
        host: IpAddr,
        peers_dir: &Path,
        keygen: &KeygenTool,
        name_as_seed: bool,
    ) -> Result<Self> {
        let name = format!("{NODE_BIN}{index}");
        let p2p_port = offset_port(BASE_P2P_PORT, index)?;
        let api_port = offset_port(BASE_API_PORT, index)?;
        let diagnostics_port = offset_port(BASE_DIAGNOSTICS_PORT, index)?;

        info!("Peer {name} generating key pair...");
        let seed = name_as_seed.then_some(name.as_str());
        let key_pair = keygen.generate(seed)?;

        let peer_dir = peers_dir.join(&name);
        tokio::fs::create_dir_all(peer_dir.join(STORAGE_DIR)).await?;

        info!("Peer {name} initialized");
        Ok(Self {
            index,
            name,
            host,
            p2p_port,
            api_port,
            diagnostics_port,
            peer_dir,
            key_pair,
        })
    }

    /// The peer's 0-based index within the network.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The peer's name, derived from its index.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The peer's public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.key_pair.public_key
    }

    /// The peer's keypair.
    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The peer's working directory.
    #[must_use]
    pub fn peer_dir(&self) -> &Path {
        &self.peer_dir
    }

    /// The peer's block store directory.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        self.peer_dir.join(STORAGE_DIR)
    }

    /// File receiving the peer process's standard output.
    #[must_use]
    pub fn stdout_path(&self) -> PathBuf {
        self.peer_dir.join(".stdout")
    }

    /// File receiving the peer process's standard error.
    #[must_use]
    pub fn stderr_path(&self) -> PathBuf {
        self.peer_dir.join(".stderr")
    }

    /// `host:port` the peer's P2P transport binds to.
    #[must_use]
    pub fn p2p_addr(&self) -> String {
        format!("{}:{}", self.host, self.p2p_port)
    }

    /// `host:port` the peer's API (and status endpoint) binds to.
    #[must_use]
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }

    /// `host:port` of the peer's diagnostics console.
    #[must_use]
    pub fn diagnostics_addr(&self) -> String {
        format!("{}:{}", self.host, self.diagnostics_port)
    }

    /// The peer's projection into the discovery list.
    #[must_use]
    pub fn record(&self) -> PeerRecord {
        PeerRecord {
            address: self.p2p_addr(),
            public_key: self.key_pair.public_key.clone(),
        }
    }

    /// Build a descriptor without touching the filesystem or the keygen
    /// utility (for tests).
    #[cfg(test)]
    pub(crate) fn for_tests(
        index: usize,
        host: IpAddr,
        peer_dir: PathBuf,
        key_pair: KeyPair,
    ) -> Self {
        Self {
            index,
            name: format!("{NODE_BIN}{index}"),
            host,
            p2p_port: offset_port(BASE_P2P_PORT, index).expect("test index in port range"),
            api_port: offset_port(BASE_API_PORT, index).expect("test index in port range"),
            diagnostics_port: offset_port(BASE_DIAGNOSTICS_PORT, index)
                .expect("test index in port range"),
            peer_dir,
            key_pair,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_key(suffix: &str) -> KeyPair {
        KeyPair {
            public_key: format!("ed0120{suffix}"),
            private_key: serde_json::json!({"digest_function": "ed25519", "payload": suffix}),
        }
    }

    #[test]
    fn ports_are_a_pure_function_of_the_index() {
        for index in 0..5 {
            let offset = u16::try_from(index).unwrap();
            assert_eq!(offset_port(BASE_P2P_PORT, index).unwrap(), 1337 + offset);
            assert_eq!(offset_port(BASE_API_PORT, index).unwrap(), 8080 + offset);
            assert_eq!(
                offset_port(BASE_DIAGNOSTICS_PORT, index).unwrap(),
                5555 + offset
            );
        }
    }

    #[test]
    fn ports_are_injective_across_indices() {
        let ports: Vec<u16> = (0..100)
            .map(|i| offset_port(BASE_P2P_PORT, i).unwrap())
            .collect();
        let mut deduped = ports.clone();
        deduped.dedup();
        assert_eq!(ports, deduped);
    }

    #[test]
    fn overflowing_index_is_rejected() {
        let err = offset_port(BASE_API_PORT, usize::from(u16::MAX)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn name_and_addresses_derive_from_the_index() {
        let peer = PeerDescriptor::for_tests(
            3,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            PathBuf::from("/tmp/peers/ledgerd3"),
            test_key("3"),
        );
        assert_eq!(peer.name(), "ledgerd3");
        assert_eq!(peer.p2p_addr(), "127.0.0.1:1340");
        assert_eq!(peer.api_addr(), "127.0.0.1:8083");
        assert_eq!(peer.diagnostics_addr(), "127.0.0.1:5558");
    }

    #[test]
    fn record_serializes_address_then_public_key() {
        let peer = PeerDescriptor::for_tests(
            0,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            PathBuf::from("/tmp/peers/ledgerd0"),
            test_key("0"),
        );
        let json = serde_json::to_string(&peer.record()).unwrap();
        assert_eq!(
            json,
            r#"{"address":"127.0.0.1:1337","public_key":"ed01200"}"#
        );
    }
}
