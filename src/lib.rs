//! # ledgerd-testnet
//!
//! Bootstraps and tears down a bare-metal test network of `ledgerd` peers,
//! so higher-level test suites can exercise the ledger against a real
//! running cluster instead of mocks.
//!
//! ## Architecture
//!
//! Setup is a strict pipeline, each stage failing fatally on its own:
//! - [`keygen`] invokes the external key-generation utility per peer
//! - [`peer`] describes one peer: identity, ports, filesystem paths
//! - [`network`] provisions all peers and stages shared artifacts, without
//!   starting anything
//! - [`launcher`] spawns the peer processes detached, genesis node first
//! - [`liveness`] polls the genesis peer's status endpoint until the
//!   network has produced its first block
//! - [`lifecycle`] ties the stages together and owns teardown
//!
//! Launched peers are deliberately detached: the orchestrator can exit
//! while the network keeps running, and a later `cleanup` invocation tears
//! it down by process name.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledgerd_testnet::{lifecycle, NetworkOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let network = lifecycle::setup(NetworkOptions::default()).await?;
//!     println!("genesis peer at {}", network.genesis_peer().api_addr());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keygen;
pub mod launcher;
pub mod lifecycle;
pub mod liveness;
pub mod network;
pub mod peer;

pub use error::{Error, Result};
pub use keygen::{KeyPair, KeygenTool};
pub use launcher::{launch, RunningPeer};
pub use lifecycle::{cleanup, setup, CLIENT_BIN, KEYGEN_BIN};
pub use liveness::await_genesis;
pub use network::{copy_or_build_binary, BuildPolicy, Network, NetworkOptions, CHAIN_ID};
pub use peer::{
    PeerDescriptor, PeerRecord, BASE_API_PORT, BASE_DIAGNOSTICS_PORT, BASE_P2P_PORT, NODE_BIN,
};
